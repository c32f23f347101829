//! Test probe around a transaction's `Queries` handle

use std::cell::RefCell;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, Entry, Transfer, User, VerifyEmail};
use crate::ports::{
    AddAccountBalanceParams, CreateAccountParams, CreateEntryParams, CreateTransferParams,
    CreateUserParams, CreateVerifyEmailParams, ListAccountsParams, ListByAccountParams, Queries,
    UpdateUserParams, UpdateVerifyEmailParams,
};

/// Delegates every call, records the call sequence, and fails the chosen
/// method with a storage error instead of running it.
pub(crate) struct Probe<'a> {
    inner: &'a dyn Queries,
    fail_on: Option<&'static str>,
    calls: RefCell<Vec<String>>,
}

impl<'a> Probe<'a> {
    pub(crate) fn new(inner: &'a dyn Queries) -> Self {
        Self {
            inner,
            fail_on: None,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn failing(inner: &'a dyn Queries, method: &'static str) -> Self {
        Self {
            fail_on: Some(method),
            ..Self::new(inner)
        }
    }

    /// Calls made so far, e.g. `["create_transfer", "add_account_balance:2"]`
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    fn step(&self, method: &'static str, detail: Option<i64>) -> Result<()> {
        let call = match detail {
            Some(id) => format!("{method}:{id}"),
            None => method.to_string(),
        };
        self.calls.borrow_mut().push(call);
        if self.fail_on == Some(method) {
            return Err(Error::database(format!("injected failure in {method}")));
        }
        Ok(())
    }
}

impl Queries for Probe<'_> {
    fn create_account(&self, params: &CreateAccountParams) -> Result<Account> {
        self.step("create_account", None)?;
        self.inner.create_account(params)
    }

    fn get_account(&self, id: i64) -> Result<Account> {
        self.step("get_account", Some(id))?;
        self.inner.get_account(id)
    }

    fn get_account_for_update(&self, id: i64) -> Result<Account> {
        self.step("get_account_for_update", Some(id))?;
        self.inner.get_account_for_update(id)
    }

    fn add_account_balance(&self, params: &AddAccountBalanceParams) -> Result<Account> {
        self.step("add_account_balance", Some(params.id))?;
        self.inner.add_account_balance(params)
    }

    fn list_accounts(&self, params: &ListAccountsParams) -> Result<Vec<Account>> {
        self.step("list_accounts", None)?;
        self.inner.list_accounts(params)
    }

    fn delete_account(&self, id: i64) -> Result<()> {
        self.step("delete_account", Some(id))?;
        self.inner.delete_account(id)
    }

    fn create_entry(&self, params: &CreateEntryParams) -> Result<Entry> {
        self.step("create_entry", Some(params.account_id))?;
        self.inner.create_entry(params)
    }

    fn get_entry(&self, id: i64) -> Result<Entry> {
        self.step("get_entry", Some(id))?;
        self.inner.get_entry(id)
    }

    fn list_entries(&self, params: &ListByAccountParams) -> Result<Vec<Entry>> {
        self.step("list_entries", Some(params.account_id))?;
        self.inner.list_entries(params)
    }

    fn create_transfer(&self, params: &CreateTransferParams) -> Result<Transfer> {
        self.step("create_transfer", None)?;
        self.inner.create_transfer(params)
    }

    fn get_transfer(&self, id: i64) -> Result<Transfer> {
        self.step("get_transfer", Some(id))?;
        self.inner.get_transfer(id)
    }

    fn list_transfers(&self, params: &ListByAccountParams) -> Result<Vec<Transfer>> {
        self.step("list_transfers", Some(params.account_id))?;
        self.inner.list_transfers(params)
    }

    fn create_user(&self, params: &CreateUserParams) -> Result<User> {
        self.step("create_user", None)?;
        self.inner.create_user(params)
    }

    fn get_user(&self, username: &str) -> Result<User> {
        self.step("get_user", None)?;
        self.inner.get_user(username)
    }

    fn update_user(&self, params: &UpdateUserParams) -> Result<User> {
        self.step("update_user", None)?;
        self.inner.update_user(params)
    }

    fn create_verify_email(&self, params: &CreateVerifyEmailParams) -> Result<VerifyEmail> {
        self.step("create_verify_email", None)?;
        self.inner.create_verify_email(params)
    }

    fn get_verify_email(&self, id: i64) -> Result<VerifyEmail> {
        self.step("get_verify_email", Some(id))?;
        self.inner.get_verify_email(id)
    }

    fn update_verify_email(&self, params: &UpdateVerifyEmailParams) -> Result<VerifyEmail> {
        self.step("update_verify_email", Some(params.id))?;
        self.inner.update_verify_email(params)
    }
}
