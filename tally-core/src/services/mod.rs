//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod account;
pub mod logging;
pub mod migration;
#[cfg(test)]
mod probe;
mod status;
pub mod transfer;
pub mod verification;

pub use account::{AccountService, AdjustmentResult};
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use status::{CurrencyTotal, LedgerStatus, StatusService};
pub use transfer::{add_money, ordered_pair, transfer_tx, TransferService};
pub use verification::{verify_email_tx, VerificationService};
