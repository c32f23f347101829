//! Status service - ledger totals

use std::sync::Arc;

use serde::Serialize;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::Result;
use crate::domain::Currency;

pub struct StatusService {
    repository: Arc<DuckDbRepository>,
}

impl StatusService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// Row counts and the balance sum of every currency in use
    pub fn get_status(&self) -> Result<LedgerStatus> {
        let counts = self.repository.ledger_counts()?;
        let totals = self.repository.balance_totals()?;

        Ok(LedgerStatus {
            total_accounts: counts.accounts,
            total_entries: counts.entries,
            total_transfers: counts.transfers,
            balances: totals
                .into_iter()
                .map(|(currency, total)| CurrencyTotal { currency, total })
                .collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerStatus {
    pub total_accounts: i64,
    pub total_entries: i64,
    pub total_transfers: i64,
    pub balances: Vec<CurrencyTotal>,
}

impl LedgerStatus {
    pub fn total_for(&self, currency: Currency) -> i64 {
        self.balances
            .iter()
            .find(|b| b.currency == currency)
            .map_or(0, |b| b.total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrencyTotal {
    pub currency: Currency,
    pub total: i64,
}
