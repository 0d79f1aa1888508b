//! Ledger Scenario Tests
//!
//! Runs the core ledger scenarios against both store implementations.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rust_decimal_macros::dec;

use points_ledger::application::ports::{AccrualOraclePort, LedgerStore, OracleError};
use points_ledger::application::use_cases::{
    BalanceLedger, OrderLifecycleManager, ProcessOutcome, UploadOutcome,
};
use points_ledger::domain::order_lifecycle::{AccrualVerdict, OrderStatus};
use points_ledger::domain::shared::{OrderNumber, Points, UserId};
use points_ledger::error::ErrorCode;
use points_ledger::infrastructure::persistence::{InMemoryLedgerStore, TursoLedgerStore};

// =============================================================================
// Fixtures
// =============================================================================

/// Oracle that always returns the same verdict and counts calls.
struct FixedOracle {
    verdict: AccrualVerdict,
    calls: AtomicUsize,
}

impl FixedOracle {
    fn new(verdict: AccrualVerdict) -> Arc<Self> {
        Arc::new(Self {
            verdict,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl AccrualOraclePort for FixedOracle {
    async fn fetch_verdict(&self, _number: &OrderNumber) -> Result<AccrualVerdict, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(self.verdict)
    }
}

struct Ledger<S: LedgerStore + 'static> {
    store: Arc<S>,
    orders: Arc<OrderLifecycleManager<S, FixedOracle>>,
    balances: Arc<BalanceLedger<S>>,
}

fn ledger<S: LedgerStore + 'static>(store: Arc<S>, oracle: Arc<FixedOracle>) -> Ledger<S> {
    Ledger {
        orders: Arc::new(OrderLifecycleManager::new(Arc::clone(&store), oracle)),
        balances: Arc::new(BalanceLedger::new(Arc::clone(&store))),
        store,
    }
}

async fn turso_store() -> (tempfile::TempDir, Arc<TursoLedgerStore>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let store = TursoLedgerStore::open(path.to_str().unwrap()).await.unwrap();
    (dir, Arc::new(store))
}

fn number(n: &str) -> OrderNumber {
    OrderNumber::parse(n).unwrap()
}

// =============================================================================
// Scenarios
// =============================================================================

async fn upload_then_reconcile_credits_once<S: LedgerStore + 'static>(store: Arc<S>) {
    let oracle = FixedOracle::new(AccrualVerdict::Processed(Points::whole(500)));
    let ledger = ledger(store, Arc::clone(&oracle));
    let user = UserId::new("alice");
    ledger.balances.open_account(&user).await.unwrap();

    assert_eq!(
        ledger.orders.upload_order(&user, number("12345678903")).await.unwrap(),
        UploadOutcome::Accepted
    );

    let mut handles = Vec::new();
    for _ in 0..4 {
        let orders = Arc::clone(&ledger.orders);
        handles.push(tokio::spawn(async move {
            orders.process_order(&number("12345678903")).await
        }));
    }
    let mut finalized = 0;
    for handle in handles {
        if matches!(handle.await.unwrap().unwrap(), ProcessOutcome::Finalized { .. }) {
            finalized += 1;
        }
    }
    assert_eq!(finalized, 1);

    let again = ledger.orders.process_order(&number("12345678903")).await.unwrap();
    assert_eq!(again, ProcessOutcome::AlreadyFinal);

    let balance = ledger.balances.get_balance(&user).await.unwrap();
    assert_eq!(balance.current, Points::whole(500));
    assert_eq!(balance.withdrawn, Points::ZERO);

    let order = ledger
        .store
        .get_order_by_number(&number("12345678903"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status(), OrderStatus::Processed);
    assert_eq!(order.accrual(), Points::whole(500));
}

async fn concurrent_withdrawals_one_wins<S: LedgerStore + 'static>(store: Arc<S>) {
    let ledger = ledger(store, FixedOracle::new(AccrualVerdict::Unknown));
    let user = UserId::new("bob");
    ledger.balances.open_account(&user).await.unwrap();
    ledger.balances.credit(&user, Points::whole(500)).await.unwrap();

    let first = {
        let balances = Arc::clone(&ledger.balances);
        let user = user.clone();
        tokio::spawn(async move {
            balances
                .withdraw(&user, number("2377225624"), Points::whole(400))
                .await
        })
    };
    let second = {
        let balances = Arc::clone(&ledger.balances);
        let user = user.clone();
        tokio::spawn(async move {
            balances
                .withdraw(&user, number("9278923470"), Points::whole(400))
                .await
        })
    };

    let results = [first.await.unwrap(), second.await.unwrap()];
    let ok = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(e) if e.code() == ErrorCode::PaymentRequired))
        .count();
    assert_eq!((ok, refused), (1, 1));

    let balance = ledger.balances.get_balance(&user).await.unwrap();
    assert_eq!(balance.current, Points::whole(100));
    assert_eq!(balance.withdrawn, Points::whole(400));
    assert_eq!(ledger.balances.get_withdrawals(&user).await.unwrap().len(), 1);
}

async fn same_user_reupload_is_idempotent<S: LedgerStore + 'static>(store: Arc<S>) {
    let ledger = ledger(store, FixedOracle::new(AccrualVerdict::Unknown));
    let user = UserId::new("carol");
    ledger.balances.open_account(&user).await.unwrap();

    ledger.orders.upload_order(&user, number("79927398713")).await.unwrap();
    assert_eq!(
        ledger.orders.upload_order(&user, number("79927398713")).await.unwrap(),
        UploadOutcome::AlreadyUploaded
    );
    assert_eq!(ledger.orders.get_user_orders(&user).await.unwrap().len(), 1);
}

async fn other_user_upload_conflicts<S: LedgerStore + 'static>(store: Arc<S>) {
    let ledger = ledger(store, FixedOracle::new(AccrualVerdict::Unknown));
    let owner = UserId::new("dave");
    let other = UserId::new("erin");
    ledger.balances.open_account(&owner).await.unwrap();
    ledger.balances.open_account(&other).await.unwrap();

    ledger.orders.upload_order(&owner, number("49927398716")).await.unwrap();
    let err = ledger
        .orders
        .upload_order(&other, number("49927398716"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Conflict);

    let order = ledger
        .store
        .get_order_by_number(&number("49927398716"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.owner(), &owner);
    assert!(ledger.orders.get_user_orders(&other).await.unwrap().is_empty());
}

async fn terminal_status_never_changes<S: LedgerStore + 'static>(store: Arc<S>) {
    let user = UserId::new("frank");
    let invalid = ledger(Arc::clone(&store), FixedOracle::new(AccrualVerdict::Invalid));
    invalid.balances.open_account(&user).await.unwrap();
    invalid.orders.upload_order(&user, number("18")).await.unwrap();
    invalid.orders.process_order(&number("18")).await.unwrap();

    let processed_oracle = FixedOracle::new(AccrualVerdict::Processed(Points::whole(99)));
    let processed = ledger(Arc::clone(&store), Arc::clone(&processed_oracle));
    assert_eq!(
        processed.orders.process_order(&number("18")).await.unwrap(),
        ProcessOutcome::AlreadyFinal
    );
    assert_eq!(processed_oracle.calls.load(Ordering::SeqCst), 0);

    let order = store.get_order_by_number(&number("18")).await.unwrap().unwrap();
    assert_eq!(order.status(), OrderStatus::Invalid);
    assert_eq!(
        processed.balances.get_balance(&user).await.unwrap().current,
        Points::ZERO
    );
}

async fn fractional_amounts_are_exact<S: LedgerStore + 'static>(store: Arc<S>) {
    let ledger = ledger(store, FixedOracle::new(AccrualVerdict::Unknown));
    let user = UserId::new("grace");
    ledger.balances.open_account(&user).await.unwrap();
    for _ in 0..10 {
        ledger
            .balances
            .credit(&user, Points::new(dec!(0.1)))
            .await
            .unwrap();
    }
    ledger
        .balances
        .withdraw(&user, number("26"), Points::new(dec!(0.3)))
        .await
        .unwrap();

    let balance = ledger.balances.get_balance(&user).await.unwrap();
    assert_eq!(balance.current, Points::new(dec!(0.7)));
    assert_eq!(balance.withdrawn, Points::new(dec!(0.3)));
}

// =============================================================================
// In-memory store
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_memory_upload_then_reconcile_credits_once() {
    upload_then_reconcile_credits_once(Arc::new(InMemoryLedgerStore::new())).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn in_memory_concurrent_withdrawals_one_wins() {
    concurrent_withdrawals_one_wins(Arc::new(InMemoryLedgerStore::new())).await;
}

#[tokio::test]
async fn in_memory_same_user_reupload_is_idempotent() {
    same_user_reupload_is_idempotent(Arc::new(InMemoryLedgerStore::new())).await;
}

#[tokio::test]
async fn in_memory_other_user_upload_conflicts() {
    other_user_upload_conflicts(Arc::new(InMemoryLedgerStore::new())).await;
}

#[tokio::test]
async fn in_memory_terminal_status_never_changes() {
    terminal_status_never_changes(Arc::new(InMemoryLedgerStore::new())).await;
}

#[tokio::test]
async fn in_memory_fractional_amounts_are_exact() {
    fractional_amounts_are_exact(Arc::new(InMemoryLedgerStore::new())).await;
}

// =============================================================================
// Turso store
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn turso_upload_then_reconcile_credits_once() {
    let (_dir, store) = turso_store().await;
    upload_then_reconcile_credits_once(store).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn turso_concurrent_withdrawals_one_wins() {
    let (_dir, store) = turso_store().await;
    concurrent_withdrawals_one_wins(store).await;
}

#[tokio::test]
async fn turso_same_user_reupload_is_idempotent() {
    let (_dir, store) = turso_store().await;
    same_user_reupload_is_idempotent(store).await;
}

#[tokio::test]
async fn turso_other_user_upload_conflicts() {
    let (_dir, store) = turso_store().await;
    other_user_upload_conflicts(store).await;
}

#[tokio::test]
async fn turso_terminal_status_never_changes() {
    let (_dir, store) = turso_store().await;
    terminal_status_never_changes(store).await;
}

#[tokio::test]
async fn turso_fractional_amounts_are_exact() {
    let (_dir, store) = turso_store().await;
    fractional_amounts_are_exact(store).await;
}

#[tokio::test]
async fn turso_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");
    let path = path.to_str().unwrap();
    let user = UserId::new("heidi");

    {
        let store = Arc::new(TursoLedgerStore::open(path).await.unwrap());
        let ledger = ledger(store, FixedOracle::new(AccrualVerdict::Unknown));
        ledger.balances.open_account(&user).await.unwrap();
        ledger.balances.credit(&user, Points::whole(42)).await.unwrap();
        ledger.orders.upload_order(&user, number("34")).await.unwrap();
    }

    let store = Arc::new(TursoLedgerStore::open(path).await.unwrap());
    let ledger = ledger(store, FixedOracle::new(AccrualVerdict::Unknown));
    assert_eq!(
        ledger.balances.get_balance(&user).await.unwrap().current,
        Points::whole(42)
    );
    assert_eq!(ledger.orders.get_user_orders(&user).await.unwrap().len(), 1);
}
