//! Transfer service - atomic transfers between two accounts
//!
//! A transfer is one unit of work: the transfer row, a debit entry, a credit
//! entry and two additive balance updates. Balance updates always touch the
//! lower account id first, whatever the direction of the transfer, so two
//! transfers over the same pair acquire row locks in the same order and
//! wait for each other instead of deadlocking.

use std::sync::Arc;

use tracing::{info, info_span, warn};

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::Result;
use crate::domain::{Account, Entry, Transfer, TransferParams, TransferResult};
use crate::ports::{
    check_page, AddAccountBalanceParams, CancelToken, CreateEntryParams, CreateTransferParams,
    ListByAccountParams, Queries, Store,
};

/// Lock order of two account ids: ascending
pub fn ordered_pair(a: i64, b: i64) -> (i64, i64) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Apply two balance deltas in lock order.
///
/// Returns the updated accounts in argument order, not update order. Every
/// workflow that changes more than one balance goes through here.
pub fn add_money(
    q: &dyn Queries,
    (id1, amount1): (i64, i64),
    (id2, amount2): (i64, i64),
) -> Result<(Account, Account)> {
    let add = |id, amount| q.add_account_balance(&AddAccountBalanceParams { id, amount });

    if ordered_pair(id1, id2).0 == id1 {
        let account1 = add(id1, amount1)?;
        let account2 = add(id2, amount2)?;
        Ok((account1, account2))
    } else {
        let account2 = add(id2, amount2)?;
        let account1 = add(id1, amount1)?;
        Ok((account1, account2))
    }
}

/// The transfer unit of work, run against an open transaction
pub fn transfer_tx(q: &dyn Queries, params: &TransferParams) -> Result<TransferResult> {
    params.validate()?;
    let TransferParams {
        from_account_id,
        to_account_id,
        amount,
    } = *params;

    let transfer = q.create_transfer(&CreateTransferParams {
        from_account_id,
        to_account_id,
        amount,
    })?;
    let from_entry = q.create_entry(&CreateEntryParams {
        account_id: from_account_id,
        amount: -amount,
    })?;
    let to_entry = q.create_entry(&CreateEntryParams {
        account_id: to_account_id,
        amount,
    })?;

    let (from_account, to_account) =
        add_money(q, (from_account_id, -amount), (to_account_id, amount))?;

    Ok(TransferResult {
        transfer,
        from_entry,
        to_entry,
        from_account,
        to_account,
    })
}

/// Transfer orchestrator and read access to transfers and entries
pub struct TransferService<S: Store = DuckDbRepository> {
    store: Arc<S>,
}

impl<S: Store> TransferService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Move `amount` from one account to another in a single transaction
    pub fn transfer_funds(&self, from_account_id: i64, to_account_id: i64, amount: i64) -> Result<TransferResult> {
        self.transfer_funds_with(
            &CancelToken::new(),
            TransferParams::new(from_account_id, to_account_id, amount),
        )
    }

    /// Same as [`transfer_funds`](Self::transfer_funds), aborted without
    /// commit once `cancel` fires.
    ///
    /// Not deduplicated: calling again after a failure creates a new transfer.
    pub fn transfer_funds_with(&self, cancel: &CancelToken, params: TransferParams) -> Result<TransferResult> {
        let span = info_span!(
            "transfer",
            from = params.from_account_id,
            to = params.to_account_id
        );
        let _enter = span.enter();

        let result = self
            .store
            .execute_with(cancel, |q| transfer_tx(q, &params));

        match &result {
            Ok(r) => info!(transfer_id = r.transfer.id, "transfer committed"),
            Err(e) => warn!(kind = e.kind().as_str(), error = %e, "transfer failed"),
        }
        result
    }

    pub fn get_transfer(&self, id: i64) -> Result<Transfer> {
        self.store.get_transfer(id)
    }

    /// Transfers where the account is on either side, ordered by id
    pub fn list_transfers(&self, account_id: i64, limit: i64, offset: i64) -> Result<Vec<Transfer>> {
        check_page(limit, offset)?;
        self.store.get_account(account_id)?;
        self.store.list_transfers(&ListByAccountParams {
            account_id,
            limit,
            offset,
        })
    }

    pub fn get_entry(&self, id: i64) -> Result<Entry> {
        self.store.get_entry(id)
    }

    pub fn list_entries(&self, account_id: i64, limit: i64, offset: i64) -> Result<Vec<Entry>> {
        check_page(limit, offset)?;
        self.store.get_account(account_id)?;
        self.store.list_entries(&ListByAccountParams {
            account_id,
            limit,
            offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::{Error, ErrorKind};
    use crate::domain::Currency;
    use crate::ports::CreateAccountParams;
    use crate::services::probe::Probe;

    fn setup() -> (Arc<DuckDbRepository>, TransferService) {
        let repo = Arc::new(DuckDbRepository::open_in_memory().unwrap());
        repo.ensure_schema().unwrap();
        let service = TransferService::new(Arc::clone(&repo));
        (repo, service)
    }

    fn open(repo: &DuckDbRepository, balance: i64) -> Account {
        repo.create_account(&CreateAccountParams {
            owner: "owner".to_string(),
            balance,
            currency: Currency::Usd,
        })
        .unwrap()
    }

    #[test]
    fn test_ordered_pair() {
        assert_eq!(ordered_pair(1, 2), (1, 2));
        assert_eq!(ordered_pair(9, 3), (3, 9));
        assert_eq!(ordered_pair(5, 5), (5, 5));
    }

    #[test]
    fn test_transfer_moves_money() {
        let (repo, service) = setup();
        let a = open(&repo, 100);
        let b = open(&repo, 50);

        let result = service.transfer_funds(a.id, b.id, 30).unwrap();

        assert_eq!(result.transfer.from_account_id, a.id);
        assert_eq!(result.transfer.to_account_id, b.id);
        assert_eq!(result.transfer.amount, 30);
        assert_eq!(result.from_entry.account_id, a.id);
        assert_eq!(result.from_entry.amount, -30);
        assert_eq!(result.to_entry.account_id, b.id);
        assert_eq!(result.to_entry.amount, 30);
        assert_eq!(result.from_account.balance, 70);
        assert_eq!(result.to_account.balance, 80);

        assert_eq!(repo.get_account(a.id).unwrap(), result.from_account);
        assert_eq!(repo.get_account(b.id).unwrap(), result.to_account);
    }

    #[test]
    fn test_balances_update_in_ascending_id_order() {
        let (repo, _) = setup();
        let low = open(&repo, 100);
        let high = open(&repo, 100);

        for (from, to) in [(low.id, high.id), (high.id, low.id)] {
            let calls = repo
                .execute(|q| {
                    let probe = Probe::new(q);
                    transfer_tx(&probe, &TransferParams::new(from, to, 10))?;
                    Ok(probe.calls())
                })
                .unwrap();

            let updates: Vec<_> = calls
                .iter()
                .filter(|c| c.starts_with("add_account_balance"))
                .cloned()
                .collect();
            assert_eq!(
                updates,
                vec![
                    format!("add_account_balance:{}", low.id),
                    format!("add_account_balance:{}", high.id),
                ]
            );
        }
    }

    #[test]
    fn test_results_follow_direction_not_lock_order() {
        let (repo, service) = setup();
        let low = open(&repo, 100);
        let high = open(&repo, 100);

        let result = service.transfer_funds(high.id, low.id, 25).unwrap();
        assert_eq!(result.from_account.id, high.id);
        assert_eq!(result.from_account.balance, 75);
        assert_eq!(result.to_account.id, low.id);
        assert_eq!(result.to_account.balance, 125);
    }

    #[test]
    fn test_failure_before_balance_update_leaves_nothing() {
        let (repo, _) = setup();
        let a = open(&repo, 100);
        let b = open(&repo, 100);

        let err = repo
            .execute(|q| {
                let probe = Probe::failing(q, "add_account_balance");
                transfer_tx(&probe, &TransferParams::new(a.id, b.id, 10))
            })
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransactionAborted);

        let counts = repo.ledger_counts().unwrap();
        assert_eq!(counts.transfers, 0);
        assert_eq!(counts.entries, 0);
        assert_eq!(repo.get_account(a.id).unwrap().balance, 100);
        assert_eq!(repo.get_account(b.id).unwrap().balance, 100);
    }

    #[test]
    fn test_missing_destination_rolls_back_source_debit() {
        let (repo, service) = setup();
        let a = open(&repo, 100);

        let err = service.transfer_funds(a.id, a.id + 100, 10).unwrap_err();
        assert!(err.is_not_found());

        assert_eq!(repo.get_account(a.id).unwrap().balance, 100);
        assert_eq!(repo.ledger_counts().unwrap().transfers, 0);
    }

    #[test]
    fn test_invalid_params_rejected_before_any_write() {
        let (repo, service) = setup();
        let a = open(&repo, 100);
        let b = open(&repo, 100);

        for (from, to, amount) in [(a.id, b.id, 0), (a.id, b.id, -1), (a.id, a.id, 10)] {
            let err = service.transfer_funds(from, to, amount).unwrap_err();
            assert!(matches!(err, Error::ConstraintViolation(_)), "{err}");
        }
        assert_eq!(repo.ledger_counts().unwrap().transfers, 0);
    }

    #[test]
    fn test_cancelled_transfer_is_not_committed() {
        let (repo, service) = setup();
        let a = open(&repo, 100);
        let b = open(&repo, 100);

        let cancel = CancelToken::new();
        cancel.cancel();
        let err = service
            .transfer_funds_with(&cancel, TransferParams::new(a.id, b.id, 10))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TransactionAborted);
        assert_eq!(repo.get_account(a.id).unwrap().balance, 100);
    }

    #[test]
    fn test_list_transfers_includes_both_sides() {
        let (repo, service) = setup();
        let a = open(&repo, 100);
        let b = open(&repo, 100);
        let c = open(&repo, 100);

        service.transfer_funds(a.id, b.id, 1).unwrap();
        service.transfer_funds(c.id, a.id, 2).unwrap();
        service.transfer_funds(b.id, c.id, 3).unwrap();

        let listed = service.list_transfers(a.id, 10, 0).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].id < listed[1].id);

        let page = service.list_transfers(a.id, 1, 1).unwrap();
        assert_eq!(page, vec![listed[1].clone()]);

        assert_eq!(service.list_entries(a.id, 10, 0).unwrap().len(), 2);
        assert!(service.list_entries(a.id, 0, 0).is_err());
        assert!(service.list_entries(999, 10, 0).unwrap_err().is_not_found());
    }
}
