//! DuckDB ledger store
//!
//! DuckDB allows a single writer per database. The repository owns one
//! connection; a transaction holds it from BEGIN until COMMIT/ROLLBACK, so
//! write transactions are serialized here and never observe each other's
//! partial state.

mod queries;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result as AnyResult};
use duckdb::Connection;
use tracing::{debug, error, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Currency, Entry, Transfer, User, VerifyEmail};
use crate::ports::{
    AddAccountBalanceParams, CancelToken, CreateAccountParams, CreateEntryParams,
    CreateTransferParams, CreateUserParams, CreateVerifyEmailParams, ListAccountsParams,
    ListByAccountParams, Queries, Store, UpdateUserParams, UpdateVerifyEmailParams,
};
use crate::services::{MigrationResult, MigrationService};

pub use queries::DuckDbQueries;
use queries::db_err;

/// Maximum number of retries when the database file is locked by another process
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("could not set lock on file")
}

/// Row counts across the ledger tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerCounts {
    pub accounts: i64,
    pub entries: i64,
    pub transfers: i64,
}

/// DuckDB implementation of [`Queries`] and [`Store`]
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl DuckDbRepository {
    /// Open (or create) the ledger database at `db_path`.
    ///
    /// Retries with exponential backoff while another process holds the
    /// database file lock.
    pub fn new(db_path: &Path) -> AnyResult<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: Some(db_path.to_path_buf()),
                    });
                }
                Err(e) if is_retryable_error(&e.to_string()) && attempt < MAX_RETRIES - 1 => {
                    let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                    warn!(
                        attempt = attempt + 1,
                        max = MAX_RETRIES,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "database busy, retrying"
                    );
                    thread::sleep(delay);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("Failed to open database after {} retries", MAX_RETRIES)))
    }

    /// In-memory ledger, mostly for tests
    pub fn open_in_memory() -> AnyResult<Self> {
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory_with_flags(config)?),
            db_path: None,
        })
    }

    fn try_open_connection(db_path: &Path) -> AnyResult<Connection> {
        // Extension autoloading stays off: the ledger needs no extensions.
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    /// Run pending migrations and report what was applied
    pub fn run_migrations(&self) -> AnyResult<MigrationResult> {
        let conn = self.lock();
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure the database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> AnyResult<()> {
        let result = self.run_migrations()?;
        if !result.applied.is_empty() {
            debug!(applied = ?result.applied, "migrations applied");
        }
        Ok(())
    }

    /// Path of the database file, `None` when in memory
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Row counts of accounts, entries and transfers
    pub fn ledger_counts(&self) -> Result<LedgerCounts> {
        let conn = self.lock();
        conn.query_row(
            "SELECT (SELECT COUNT(*) FROM accounts),
                    (SELECT COUNT(*) FROM entries),
                    (SELECT COUNT(*) FROM transfers)",
            [],
            |row| {
                Ok(LedgerCounts {
                    accounts: row.get(0)?,
                    entries: row.get(1)?,
                    transfers: row.get(2)?,
                })
            },
        )
        .map_err(db_err)
    }

    /// Sum of account balances per currency
    pub fn balance_totals(&self) -> Result<BTreeMap<Currency, i64>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT currency, CAST(SUM(balance) AS BIGINT) FROM accounts
                 GROUP BY currency ORDER BY currency",
            )
            .map_err(db_err)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, Currency>(0)?, row.get::<_, i64>(1)?)))
            .map_err(db_err)?;
        rows.collect::<duckdb::Result<BTreeMap<_, _>>>()
            .map_err(db_err)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A unit of work that panics poisons the mutex, but its transaction
        // guard has already rolled back during unwinding.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one statement outside any explicit transaction
    fn autocommit<T>(&self, f: impl FnOnce(&DuckDbQueries<'_>) -> Result<T>) -> Result<T> {
        let conn = self.lock();
        f(&DuckDbQueries::new(&conn, None))
    }
}

impl Store for DuckDbRepository {
    fn execute_with<T, F>(&self, cancel: &CancelToken, unit: F) -> Result<T>
    where
        F: FnOnce(&dyn Queries) -> Result<T>,
    {
        cancel.check()?;

        let mut conn = self.lock();
        let tx = conn
            .transaction()
            .map_err(|e| Error::aborted(format!("failed to begin transaction: {e}")))?;
        debug!("transaction started");

        // A token cancelled after the last statement still prevents the commit.
        let outcome = unit(&DuckDbQueries::new(&tx, Some(cancel)))
            .and_then(|value| cancel.check().map(|()| value));

        match outcome {
            Ok(value) => {
                tx.commit()
                    .map_err(|e| Error::aborted(format!("commit failed: {e}")))?;
                debug!("transaction committed");
                Ok(value)
            }
            Err(err) => match tx.rollback() {
                Ok(()) => {
                    warn!(error = %err, kind = err.kind().as_str(), "transaction rolled back");
                    Err(err)
                }
                Err(rollback) => {
                    error!(error = %err, rollback_error = %rollback, "rollback failed");
                    Err(Error::RollbackFailed {
                        original: Box::new(err),
                        rollback: rollback.to_string(),
                    })
                }
            },
        }
    }
}

impl Queries for DuckDbRepository {
    fn create_account(&self, params: &CreateAccountParams) -> Result<Account> {
        self.autocommit(|q| q.create_account(params))
    }

    fn get_account(&self, id: i64) -> Result<Account> {
        self.autocommit(|q| q.get_account(id))
    }

    fn get_account_for_update(&self, id: i64) -> Result<Account> {
        self.autocommit(|q| q.get_account_for_update(id))
    }

    fn add_account_balance(&self, params: &AddAccountBalanceParams) -> Result<Account> {
        self.autocommit(|q| q.add_account_balance(params))
    }

    fn list_accounts(&self, params: &ListAccountsParams) -> Result<Vec<Account>> {
        self.autocommit(|q| q.list_accounts(params))
    }

    fn delete_account(&self, id: i64) -> Result<()> {
        self.autocommit(|q| q.delete_account(id))
    }

    fn create_entry(&self, params: &CreateEntryParams) -> Result<Entry> {
        self.autocommit(|q| q.create_entry(params))
    }

    fn get_entry(&self, id: i64) -> Result<Entry> {
        self.autocommit(|q| q.get_entry(id))
    }

    fn list_entries(&self, params: &ListByAccountParams) -> Result<Vec<Entry>> {
        self.autocommit(|q| q.list_entries(params))
    }

    fn create_transfer(&self, params: &CreateTransferParams) -> Result<Transfer> {
        self.autocommit(|q| q.create_transfer(params))
    }

    fn get_transfer(&self, id: i64) -> Result<Transfer> {
        self.autocommit(|q| q.get_transfer(id))
    }

    fn list_transfers(&self, params: &ListByAccountParams) -> Result<Vec<Transfer>> {
        self.autocommit(|q| q.list_transfers(params))
    }

    fn create_user(&self, params: &CreateUserParams) -> Result<User> {
        self.autocommit(|q| q.create_user(params))
    }

    fn get_user(&self, username: &str) -> Result<User> {
        self.autocommit(|q| q.get_user(username))
    }

    fn update_user(&self, params: &UpdateUserParams) -> Result<User> {
        self.autocommit(|q| q.update_user(params))
    }

    fn create_verify_email(&self, params: &CreateVerifyEmailParams) -> Result<VerifyEmail> {
        self.autocommit(|q| q.create_verify_email(params))
    }

    fn get_verify_email(&self, id: i64) -> Result<VerifyEmail> {
        self.autocommit(|q| q.get_verify_email(id))
    }

    fn update_verify_email(&self, params: &UpdateVerifyEmailParams) -> Result<VerifyEmail> {
        self.autocommit(|q| q.update_verify_email(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> DuckDbRepository {
        let repo = DuckDbRepository::open_in_memory().unwrap();
        repo.ensure_schema().unwrap();
        repo
    }

    fn open_account(q: &dyn Queries, balance: i64) -> Account {
        q.create_account(&CreateAccountParams {
            owner: "alice".to_string(),
            balance,
            currency: Currency::Usd,
        })
        .unwrap()
    }

    #[test]
    fn test_account_ids_are_monotonic() {
        let repo = repo();
        let first = open_account(&repo, 10);
        let second = open_account(&repo, 20);
        assert!(second.id > first.id);
    }

    #[test]
    fn test_add_account_balance_returns_updated_row() {
        let repo = repo();
        let account = open_account(&repo, 100);

        let updated = repo
            .add_account_balance(&AddAccountBalanceParams { id: account.id, amount: -30 })
            .unwrap();
        assert_eq!(updated.balance, 70);
        assert_eq!(updated.id, account.id);
        assert_eq!(updated.created_at, account.created_at);
    }

    #[test]
    fn test_add_balance_on_missing_account_is_not_found() {
        let repo = repo();
        let err = repo
            .add_account_balance(&AddAccountBalanceParams { id: 999, amount: 5 })
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_execute_commits_on_ok() {
        let repo = repo();
        let account = repo.execute(|q| Ok(open_account(q, 5))).unwrap();
        assert_eq!(repo.get_account(account.id).unwrap(), account);
    }

    #[test]
    fn test_execute_rolls_back_on_err() {
        let repo = repo();
        let err = repo
            .execute(|q| {
                open_account(q, 5);
                q.get_transfer(12345)
            })
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(repo.ledger_counts().unwrap().accounts, 0);
    }

    #[test]
    fn test_cancelled_scope_is_not_committed() {
        let repo = repo();
        let cancel = CancelToken::new();

        let err = repo
            .execute_with(&cancel, |q| {
                let account = open_account(q, 5);
                cancel.cancel();
                Ok(account)
            })
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(repo.ledger_counts().unwrap().accounts, 0);
    }

    #[test]
    fn test_statements_after_cancel_fail() {
        let repo = repo();
        let cancel = CancelToken::new();

        let err = repo
            .execute_with(&cancel, |q| {
                cancel.cancel();
                q.create_entry(&CreateEntryParams { account_id: 1, amount: 5 })
            })
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(repo.ledger_counts().unwrap().entries, 0);
    }

    #[test]
    fn test_duplicate_username_is_constraint_violation() {
        let repo = repo();
        let params = CreateUserParams {
            username: "alice".to_string(),
            full_name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
        };
        repo.create_user(&params).unwrap();

        let err = repo.create_user(&params).unwrap_err();
        assert!(matches!(err, Error::ConstraintViolation(_)), "{err}");
    }

    #[test]
    fn test_balance_totals_group_by_currency() {
        let repo = repo();
        open_account(&repo, 100);
        open_account(&repo, 50);
        repo.create_account(&CreateAccountParams {
            owner: "bob".to_string(),
            balance: 7,
            currency: Currency::Eur,
        })
        .unwrap();

        let totals = repo.balance_totals().unwrap();
        assert_eq!(totals.get(&Currency::Usd), Some(&150));
        assert_eq!(totals.get(&Currency::Eur), Some(&7));
        assert_eq!(totals.get(&Currency::Uah), None);
    }
}
