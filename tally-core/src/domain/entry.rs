//! Entry domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One signed movement of funds against exactly one account.
///
/// Negative amounts are debits, positive amounts are credits. Entries are
/// append-only: nothing updates or deletes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub account_id: i64,
    pub amount: i64,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    pub fn is_debit(&self) -> bool {
        self.amount < 0
    }
}
