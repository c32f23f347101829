//! Account service - opening, listing, closing and adjusting accounts

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{Account, Currency, Entry};
use crate::ports::{
    check_page, AddAccountBalanceParams, CreateAccountParams, CreateEntryParams,
    ListAccountsParams, ListByAccountParams, Store,
};

/// Outcome of an administrative balance adjustment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentResult {
    pub entry: Entry,
    pub account: Account,
}

pub struct AccountService<S: Store = DuckDbRepository> {
    store: Arc<S>,
}

impl<S: Store> AccountService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Open an account; `currency` is a code such as `usd` or `EUR`
    pub fn create_account(&self, owner: &str, balance: i64, currency: &str) -> Result<Account> {
        let owner = owner.trim();
        if owner.is_empty() {
            return Err(Error::constraint("owner cannot be empty"));
        }
        let currency: Currency = currency.parse()?;

        let account = self.store.create_account(&CreateAccountParams {
            owner: owner.to_string(),
            balance,
            currency,
        })?;
        info!(account_id = account.id, %currency, "account opened");
        Ok(account)
    }

    pub fn get_account(&self, id: i64) -> Result<Account> {
        self.store.get_account(id)
    }

    pub fn list_accounts(&self, owner: Option<&str>, limit: i64, offset: i64) -> Result<Vec<Account>> {
        check_page(limit, offset)?;
        self.store.list_accounts(&ListAccountsParams {
            owner: owner.map(str::to_string),
            limit,
            offset,
        })
    }

    /// Delete an account that no entry references
    pub fn delete_account(&self, id: i64) -> Result<()> {
        self.store.execute(|q| {
            q.get_account_for_update(id)?;
            let referenced = q.list_entries(&ListByAccountParams {
                account_id: id,
                limit: 1,
                offset: 0,
            })?;
            if !referenced.is_empty() {
                return Err(Error::constraint(format!(
                    "account {id} has entries and cannot be deleted"
                )));
            }
            q.delete_account(id)
        })?;
        info!(account_id = id, "account closed");
        Ok(())
    }

    /// Credit (positive) or debit (negative) one account outside a transfer.
    ///
    /// Records one entry and applies the same amount through the additive
    /// update, in one transaction.
    pub fn adjust_balance(&self, id: i64, amount: i64) -> Result<AdjustmentResult> {
        if amount == 0 {
            return Err(Error::constraint("adjustment amount cannot be zero"));
        }

        let result = self.store.execute(|q| {
            q.get_account_for_update(id)?;
            let entry = q.create_entry(&CreateEntryParams {
                account_id: id,
                amount,
            })?;
            let account = q.add_account_balance(&AddAccountBalanceParams { id, amount })?;
            Ok(AdjustmentResult { entry, account })
        })?;
        info!(account_id = id, entry_id = result.entry.id, "balance adjusted");
        Ok(result)
    }
}
