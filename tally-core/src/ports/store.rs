//! Store port - ledger persistence and transaction scoping

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Duration;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Currency, Entry, Transfer, User, VerifyEmail};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAccountParams {
    pub owner: String,
    pub balance: i64,
    pub currency: Currency,
}

/// Additive balance update: `balance += amount`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddAccountBalanceParams {
    pub id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListAccountsParams {
    pub owner: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateEntryParams {
    pub account_id: i64,
    pub amount: i64,
}

/// Entries of one account, or transfers touching one account on either side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListByAccountParams {
    pub account_id: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateTransferParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateUserParams {
    pub username: String,
    pub full_name: String,
    pub email: String,
}

/// Partial user update; `None` keeps the stored value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateUserParams {
    pub username: String,
    pub full_name: Option<String>,
    pub is_email_verified: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateVerifyEmailParams {
    pub username: String,
    pub email: String,
    pub secret_code: String,
    pub ttl: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateVerifyEmailParams {
    pub id: i64,
    pub is_used: bool,
}

/// Validate pagination bounds shared by every list operation
pub fn check_page(limit: i64, offset: i64) -> Result<()> {
    if limit < 1 {
        return Err(Error::constraint(format!("limit must be at least 1, got {limit}")));
    }
    if offset < 0 {
        return Err(Error::constraint(format!("offset cannot be negative, got {offset}")));
    }
    Ok(())
}

/// Ledger store operations
///
/// Every method runs against the handle it is called on: a transaction scope
/// handed to a unit of work by [`Store::execute`], or the store itself, in
/// which case each call commits on its own. All `get_*` methods fail with
/// [`Error::NotFound`] when the row does not exist.
pub trait Queries {
    // === Accounts ===

    fn create_account(&self, params: &CreateAccountParams) -> Result<Account>;

    fn get_account(&self, id: i64) -> Result<Account>;

    /// Read an account and hold it against concurrent writers until the
    /// enclosing transaction ends
    fn get_account_for_update(&self, id: i64) -> Result<Account>;

    /// Apply `balance += amount` and return the updated row in one statement
    fn add_account_balance(&self, params: &AddAccountBalanceParams) -> Result<Account>;

    /// Accounts ordered by id, optionally filtered by owner
    fn list_accounts(&self, params: &ListAccountsParams) -> Result<Vec<Account>>;

    fn delete_account(&self, id: i64) -> Result<()>;

    // === Entries ===

    fn create_entry(&self, params: &CreateEntryParams) -> Result<Entry>;

    fn get_entry(&self, id: i64) -> Result<Entry>;

    fn list_entries(&self, params: &ListByAccountParams) -> Result<Vec<Entry>>;

    // === Transfers ===

    fn create_transfer(&self, params: &CreateTransferParams) -> Result<Transfer>;

    fn get_transfer(&self, id: i64) -> Result<Transfer>;

    fn list_transfers(&self, params: &ListByAccountParams) -> Result<Vec<Transfer>>;

    // === Users ===

    fn create_user(&self, params: &CreateUserParams) -> Result<User>;

    fn get_user(&self, username: &str) -> Result<User>;

    fn update_user(&self, params: &UpdateUserParams) -> Result<User>;

    // === Email verification ===

    fn create_verify_email(&self, params: &CreateVerifyEmailParams) -> Result<VerifyEmail>;

    fn get_verify_email(&self, id: i64) -> Result<VerifyEmail>;

    fn update_verify_email(&self, params: &UpdateVerifyEmailParams) -> Result<VerifyEmail>;
}

/// Cooperative cancellation flag shared between a caller and a unit of work
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Fail with [`Error::Cancelled`] once cancelled
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Transaction-scoping store
///
/// `execute` begins a transaction, hands the unit of work a [`Queries`]
/// handle bound to it, and commits if the unit returns `Ok`. On `Err` the
/// transaction is rolled back and the unit's error is returned, wrapped in
/// [`Error::RollbackFailed`] if the rollback itself fails. The store never
/// retries.
pub trait Store: Queries + Send + Sync {
    fn execute_with<T, F>(&self, cancel: &CancelToken, unit: F) -> Result<T>
    where
        F: FnOnce(&dyn Queries) -> Result<T>;

    fn execute<T, F>(&self, unit: F) -> Result<T>
    where
        F: FnOnce(&dyn Queries) -> Result<T>,
    {
        self.execute_with(&CancelToken::new(), unit)
    }
}
