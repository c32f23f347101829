//! Transfer domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::result::{Error, Result};
use super::{Account, Entry};

/// A logical movement of funds from one account to another.
///
/// A committed transfer always has exactly two entries: `-amount` on the
/// source account and `+amount` on the destination account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: i64,
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

/// Input of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParams {
    pub from_account_id: i64,
    pub to_account_id: i64,
    pub amount: i64,
}

impl TransferParams {
    pub fn new(from_account_id: i64, to_account_id: i64, amount: i64) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }

    /// Check `amount > 0` and `from != to`
    pub fn validate(&self) -> Result<()> {
        if self.amount <= 0 {
            return Err(Error::constraint(format!(
                "transfer amount must be positive, got {}",
                self.amount
            )));
        }
        if self.from_account_id == self.to_account_id {
            return Err(Error::constraint(format!(
                "cannot transfer from account {} to itself",
                self.from_account_id
            )));
        }
        Ok(())
    }
}

/// Everything a committed transfer produced, with post-transfer account snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_entry: Entry,
    pub to_entry: Entry,
    pub from_account: Account,
    pub to_account: Account,
}
