//! Event log - privacy-safe record of ledger operations in logs.duckdb
//!
//! Only event names, command names, operation ids and error kinds are stored.
//! Owners, balances and amounts never reach this database.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use chrono::Utc;
use duckdb::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::domain::result::Error;
use crate::log_migrations::LOG_MIGRATIONS;
use crate::services::MigrationService;

/// Counter for generating unique IDs within the same millisecond
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Timestamp in the low 48 bits, per-millisecond counter in the high 16
fn generate_id() -> u64 {
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    ((now_ms() as u64) << 16) | counter
}

/// Current unix timestamp in milliseconds
fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn detect_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "unknown"
    }
}

/// Which front end recorded an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPoint {
    Cli,
    Library,
}

impl EntryPoint {
    fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Cli => "cli",
            EntryPoint::Library => "library",
        }
    }
}

/// A log event to be recorded
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl LogEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            ..Self::default()
        }
    }

    /// Set the CLI command that produced the event
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Correlate with the `operation_id` of a tracing span
    pub fn with_operation_id(mut self, operation_id: impl Into<String>) -> Self {
        self.operation_id = Some(operation_id.into());
        self
    }

    /// Record a core error: its kind and message
    pub fn with_error(mut self, error: &Error) -> Self {
        self.error_kind = Some(error.kind().as_str().to_string());
        self.error_message = Some(error.to_string());
        self
    }

    /// Record an error that did not come from the core library
    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// A log entry as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: i64,
    pub entry_point: String,
    pub app_version: String,
    pub platform: String,
    pub event: String,
    pub command: Option<String>,
    pub operation_id: Option<String>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
}

const LOG_COLUMNS: &str = "id, timestamp, entry_point, app_version, platform, \
                           event, command, operation_id, error_kind, error_message";

fn row_to_entry(row: &Row<'_>) -> duckdb::Result<LogEntry> {
    Ok(LogEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        entry_point: row.get(2)?,
        app_version: row.get(3)?,
        platform: row.get(4)?,
        event: row.get(5)?,
        command: row.get(6)?,
        operation_id: row.get(7)?,
        error_kind: row.get(8)?,
        error_message: row.get(9)?,
    })
}

/// Writes and queries the event log
pub struct LoggingService {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    entry_point: EntryPoint,
    app_version: String,
    platform: &'static str,
}

impl LoggingService {
    /// Open or create logs.duckdb in `tally_dir` and run its migrations
    pub fn new(
        tally_dir: &Path,
        entry_point: EntryPoint,
        app_version: impl Into<String>,
    ) -> Result<Self> {
        let db_path = tally_dir.join("logs.duckdb");
        let conn = Connection::open(&db_path)?;
        MigrationService::with_migrations(&conn, LOG_MIGRATIONS).run_pending()?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            entry_point,
            app_version: app_version.into(),
            platform: detect_platform(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an event; entry point, version and platform are filled in
    pub fn log(&self, event: LogEvent) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            &format!(
                "INSERT INTO sys_logs ({LOG_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            duckdb::params![
                generate_id(),
                now_ms(),
                self.entry_point.as_str(),
                &self.app_version,
                self.platform,
                &event.event,
                &event.command,
                &event.operation_id,
                &event.error_kind,
                &event.error_message,
            ],
        )?;
        Ok(())
    }

    /// Most recent entries first
    pub fn get_recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {LOG_COLUMNS} FROM sys_logs ORDER BY timestamp DESC, id DESC LIMIT ?"
        ))?;
        let entries = stmt
            .query_map([limit as i64], row_to_entry)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Most recent entries that carry an error
    pub fn get_errors(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {LOG_COLUMNS} FROM sys_logs WHERE error_message IS NOT NULL \
             ORDER BY timestamp DESC, id DESC LIMIT ?"
        ))?;
        let entries = stmt
            .query_map([limit as i64], row_to_entry)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Number of errors per error kind
    pub fn error_counts(&self) -> Result<Vec<(String, u64)>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT COALESCE(error_kind, 'other'), COUNT(*) FROM sys_logs
             WHERE error_message IS NOT NULL
             GROUP BY 1 ORDER BY 2 DESC, 1",
        )?;
        let counts = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?)))?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(counts)
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.lock();
        let count: u64 = conn.query_row("SELECT COUNT(*) FROM sys_logs", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete entries older than `timestamp_ms` (unix ms)
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let conn = self.lock();
        let deleted = conn.execute("DELETE FROM sys_logs WHERE timestamp < ?", [timestamp_ms])?;
        Ok(deleted as u64)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}
