//! Concurrent transfer tests
//!
//! Many threads share one ledger and run transfers against overlapping
//! accounts at the same time. Every transfer must commit, balances must add
//! up, and opposite-direction transfers over one pair must never deadlock.
//!
//! Run with: cargo test --test concurrent_transfer_test -- --nocapture

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use tempfile::TempDir;

use tally_core::{Account, Result, TallyContext, TransferResult};

fn create_context(temp_dir: &TempDir) -> Arc<TallyContext> {
    Arc::new(TallyContext::new(temp_dir.path()).unwrap())
}

fn open(ctx: &TallyContext, balance: i64) -> Account {
    ctx.account_service
        .create_account("concurrent", balance, "USD")
        .unwrap()
}

/// Start one thread per `(from, to)` pair, release them together, and
/// collect every result.
fn run_concurrently(
    ctx: &Arc<TallyContext>,
    pairs: Vec<(i64, i64)>,
    amount: i64,
) -> Vec<Result<TransferResult>> {
    let barrier = Arc::new(Barrier::new(pairs.len()));

    let handles: Vec<_> = pairs
        .into_iter()
        .map(|(from, to)| {
            let ctx = Arc::clone(ctx);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                ctx.transfer_service.transfer_funds(from, to, amount)
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|h| h.join().expect("transfer thread panicked"))
        .collect()
}

/// N transfers A -> B: each caller observes a distinct cumulative debit
#[test]
fn test_concurrent_fan_out() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_context(&temp_dir);
    let account1 = open(&ctx, 1000);
    let account2 = open(&ctx, 1000);

    let n = 5;
    let amount = 10;
    let results = run_concurrently(&ctx, vec![(account1.id, account2.id); n], amount);

    let mut seen = HashSet::new();
    for result in results {
        let result = result.unwrap();

        assert_eq!(result.transfer.from_account_id, account1.id);
        assert_eq!(result.transfer.to_account_id, account2.id);
        assert_eq!(result.transfer.amount, amount);
        assert_eq!(result.from_entry.amount, -amount);
        assert_eq!(result.to_entry.amount, amount);

        let diff1 = account1.balance - result.from_account.balance;
        let diff2 = result.to_account.balance - account2.balance;
        assert_eq!(diff1, diff2);
        assert!(diff1 > 0);
        assert_eq!(diff1 % amount, 0);

        let k = diff1 / amount;
        assert!((1..=n as i64).contains(&k), "unexpected delta {diff1}");
        assert!(seen.insert(k), "delta {diff1} observed twice");
    }
    assert_eq!(seen.len(), n);

    let updated1 = ctx.account_service.get_account(account1.id).unwrap();
    let updated2 = ctx.account_service.get_account(account2.id).unwrap();
    assert_eq!(updated1.balance, account1.balance - n as i64 * amount);
    assert_eq!(updated2.balance, account2.balance + n as i64 * amount);

    let counts = ctx.repository.ledger_counts().unwrap();
    assert_eq!(counts.transfers, n as i64);
    assert_eq!(counts.entries, 2 * n as i64);
}

/// Half A -> B, half B -> A: all commit and the net movement is zero
#[test]
fn test_opposite_directions_do_not_deadlock() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_context(&temp_dir);
    let account1 = open(&ctx, 1000);
    let account2 = open(&ctx, 1000);

    let n = 10;
    let pairs = (0..n)
        .map(|i| {
            if i % 2 == 1 {
                (account2.id, account1.id)
            } else {
                (account1.id, account2.id)
            }
        })
        .collect();

    for result in run_concurrently(&ctx, pairs, 10) {
        result.unwrap();
    }

    let updated1 = ctx.account_service.get_account(account1.id).unwrap();
    let updated2 = ctx.account_service.get_account(account2.id).unwrap();
    assert_eq!(updated1.balance, account1.balance);
    assert_eq!(updated2.balance, account2.balance);
    assert_eq!(ctx.repository.ledger_counts().unwrap().transfers, n);
}

/// Transfers over disjoint pairs and a shared hub all land
#[test]
fn test_mixed_pairs_conserve_total() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = create_context(&temp_dir);
    let accounts: Vec<_> = (0..4).map(|_| open(&ctx, 500)).collect();
    let total_before: i64 = accounts.iter().map(|a| a.balance).sum();

    let ids: Vec<_> = accounts.iter().map(|a| a.id).collect();
    let pairs = vec![
        (ids[0], ids[1]),
        (ids[2], ids[3]),
        (ids[1], ids[0]),
        (ids[3], ids[2]),
        (ids[0], ids[3]),
        (ids[3], ids[0]),
        (ids[1], ids[2]),
        (ids[2], ids[1]),
    ];
    let count = pairs.len() as i64;

    for result in run_concurrently(&ctx, pairs, 7) {
        result.unwrap();
    }

    let total_after: i64 = ids
        .iter()
        .map(|id| ctx.account_service.get_account(*id).unwrap().balance)
        .sum();
    assert_eq!(total_after, total_before);

    // Every account sent and received the same number of transfers.
    for id in &ids {
        assert_eq!(ctx.account_service.get_account(*id).unwrap().balance, 500);
    }

    let status = ctx.status_service.get_status().unwrap();
    assert_eq!(status.total_transfers, count);
    assert_eq!(status.total_entries, 2 * count);
}
