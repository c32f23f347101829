//! Tally Core - transactional transfer engine for a double-entry ledger
//!
//! This crate follows a hexagonal layout:
//!
//! - **domain**: ledger entities (Account, Entry, Transfer, User, VerifyEmail)
//! - **ports**: the store contract (`Queries`) and the transaction executor (`Store`)
//! - **services**: transfers, account lifecycle, email verification, status
//! - **adapters**: the DuckDB store

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::Arc;

use adapters::duckdb::DuckDbRepository;
use config::Config;
use services::*;

// Re-export commonly used types at crate root
pub use domain::result::{Error, ErrorKind, OperationResult, Result};
pub use domain::{
    Account, Currency, Entry, Transfer, TransferParams, TransferResult, User, VerifyEmail,
    VerifyEmailResult,
};
pub use ports::{CancelToken, Queries, Store};
pub use services::{EntryPoint, LogEvent, LoggingService};

/// Main context for tally operations
///
/// Holds the configuration, the ledger store and every service built on it.
pub struct TallyContext {
    pub config: Config,
    pub repository: Arc<DuckDbRepository>,
    pub account_service: AccountService,
    pub transfer_service: TransferService,
    pub verification_service: VerificationService,
    pub status_service: StatusService,
}

impl TallyContext {
    /// Open the ledger in `tally_dir`, creating the schema if needed
    pub fn new(tally_dir: &Path) -> anyhow::Result<Self> {
        let config = Config::load(tally_dir)?;
        let repository = Arc::new(DuckDbRepository::new(&config.db_path(tally_dir))?);
        repository.ensure_schema()?;
        Ok(Self::with_repository(config, repository))
    }

    /// Build the services over an already opened store
    pub fn with_repository(config: Config, repository: Arc<DuckDbRepository>) -> Self {
        Self {
            account_service: AccountService::new(Arc::clone(&repository)),
            transfer_service: TransferService::new(Arc::clone(&repository)),
            verification_service: VerificationService::new(
                Arc::clone(&repository),
                config.verify_email_ttl_minutes,
            ),
            status_service: StatusService::new(Arc::clone(&repository)),
            config,
            repository,
        }
    }
}
