//! Concurrency properties of the ledger and the settlement listener.

mod common;

use std::sync::Arc;

use common::{checkout_completed, TestHarness};
use fractiverse_core::{LedgerError, UserId};
use fractiverse_service::Ledger;
use fractiverse_store::{MemoryStore, Store};
use futures::future::join_all;

async fn funded_ledger(balance: i64) -> (Ledger, UserId) {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let ledger = Ledger::new(store);
    let user_id = UserId::generate();
    ledger.create_user(user_id, "ada@example.com").await.unwrap();
    if balance > 0 {
        ledger.credit(user_id, balance, "evt_seed").await.unwrap();
    }
    (ledger, user_id)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn two_racing_debits_never_overdraw() {
    let (ledger, user) = funded_ledger(50).await;

    let a = tokio::spawn({
        let ledger = ledger.clone();
        async move { ledger.debit(user, 40, "chat message", None).await }
    });
    let b = tokio::spawn({
        let ledger = ledger.clone();
        async move { ledger.debit(user, 40, "chat message", None).await }
    });
    let results = [a.await.unwrap(), b.await.unwrap()];

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let refusals = results
        .iter()
        .filter(|r| matches!(r, Err(LedgerError::InsufficientBalance { .. })))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(refusals, 1);
    assert_eq!(ledger.get_balance(user).await.unwrap(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_racing_debits_spend_exactly_the_balance() {
    let (ledger, user) = funded_ledger(100).await;

    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.debit(user, 3, "tick", None).await })
        })
        .collect();
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    let successes = i64::try_from(results.iter().filter(|r| r.is_ok()).count()).unwrap();
    assert_eq!(successes, 33);
    let balance = ledger.get_balance(user).await.unwrap();
    assert_eq!(balance, 1);
    assert!(balance >= 0);

    let (entries, _) = ledger.list_transactions(user, 100, 0).await.unwrap();
    assert_eq!(entries.len(), 34); // seed purchase + 33 uses
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_credits_for_one_event_apply_once() {
    let (ledger, user) = funded_ledger(0).await;

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.credit(user, 100, "evt_1").await })
        })
        .collect();
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(Result::unwrap)
        .collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter(|r| r.is_err())
        .all(|r| matches!(r, Err(LedgerError::DuplicateEvent { .. }))));
    assert_eq!(ledger.get_balance(user).await.unwrap(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_redeliveries_are_all_acknowledged_and_credit_once() {
    let harness = TestHarness::new();
    harness.provision().await;
    let event = checkout_completed("evt_1", harness.user_id, 100);

    let responses = join_all((0..5).map(|_| harness.deliver(&event))).await;

    for response in responses {
        response.assert_status_ok();
    }
    assert_eq!(harness.balance().await, 100);
    assert_eq!(harness.transaction_count().await, 1);
}
