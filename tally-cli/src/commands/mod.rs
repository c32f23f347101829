//! CLI command implementations

pub mod account;
pub mod entry;
pub mod logs;
pub mod status;
pub mod transfer;
pub mod user;
pub mod verify;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tally_core::{EntryPoint, LogEvent, LoggingService, TallyContext};

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let tally_dir = get_tally_dir().ok()?;
    std::fs::create_dir_all(&tally_dir).ok()?;
    LoggingService::new(&tally_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        if let Err(e) = l.log(event) {
            tracing::debug!(error = %e, "event log write failed");
        }
    }
}

/// Get the tally directory from `TALLY_DIR` or default to `~/.tally`
pub fn get_tally_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TALLY_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".tally"))
        .context("Could not find home directory; set TALLY_DIR")
}

/// Open the ledger, creating the tally directory on first use
pub fn get_context() -> Result<TallyContext> {
    let tally_dir = get_tally_dir()?;

    std::fs::create_dir_all(&tally_dir)
        .with_context(|| format!("Failed to create tally directory: {:?}", tally_dir))?;

    TallyContext::new(&tally_dir).context("Failed to open the ledger")
}

/// Page size from `--limit`, falling back to the configured default
pub fn page_size(ctx: &TallyContext, limit: Option<i64>) -> i64 {
    limit.unwrap_or(ctx.config.default_page_size)
}
