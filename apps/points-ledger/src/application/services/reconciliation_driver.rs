//! Reconciliation Driver
//!
//! Periodically collects pending orders and reconciles them against the
//! accrual system through a bounded worker pool.
//!
//! Each cycle reads the next page of pending orders after a cursor and wraps
//! to the oldest once the scan runs off the end, so orders the accrual system
//! never settles cannot starve newer ones. A cycle waits at most one interval
//! for its workers; a straggler keeps its claim and pool slot and is tallied
//! by whichever later cycle sees it finish.
//!
//! An order number is never processed by two workers of the same driver at
//! once. Across processes, the store's guarded finalize keeps credits
//! exactly-once.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{AccrualOraclePort, LedgerStore, PendingOrderKey};
use crate::application::use_cases::{OrderLifecycleManager, ProcessOutcome};
use crate::domain::shared::OrderNumber;
use crate::error::LedgerError;
use crate::observability::metrics;

/// Scheduling knobs for the driver.
#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    /// Time between cycles, and the longest a cycle waits for its workers.
    pub interval: Duration,
    /// Orders reconciled concurrently.
    pub max_concurrency: usize,
    /// Pending orders fetched per cycle.
    pub batch_size: usize,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_concurrency: 4,
            batch_size: 100,
        }
    }
}

/// Tally of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Pending orders returned by the store.
    pub scanned: usize,
    /// Orders that reached a terminal status.
    pub finalized: usize,
    /// Orders the accrual system has not decided yet.
    pub pending: usize,
    /// Orders found terminal by the time a worker looked.
    pub already_final: usize,
    /// Orders skipped because another worker holds them.
    pub skipped_in_flight: usize,
    /// Orders whose reconciliation failed; retried by a later cycle.
    pub failed: usize,
    /// Longest back-off requested by the accrual system.
    pub retry_after: Option<Duration>,
}

impl CycleReport {
    fn tally(&mut self, joined: Result<WorkerResult, JoinError>) {
        match joined {
            Ok((_, Ok(outcome))) => match outcome {
                ProcessOutcome::Finalized { .. } => self.finalized += 1,
                ProcessOutcome::Pending => self.pending += 1,
                ProcessOutcome::AlreadyFinal => self.already_final += 1,
            },
            Ok((number, Err(e))) => {
                tracing::warn!(order_number = %number, error = %e, "Reconciliation failed, will retry");
                self.failed += 1;
                self.retry_after = self.retry_after.max(e.retry_after());
            }
            Err(e) => {
                tracing::error!(error = %e, "Reconciliation worker panicked");
                self.failed += 1;
            }
        }
    }
}

type InFlight = Arc<Mutex<HashSet<OrderNumber>>>;
type WorkerResult = (OrderNumber, Result<ProcessOutcome, LedgerError>);

/// Releases an order's in-flight slot on drop, including when the worker
/// panics or is aborted.
struct InFlightGuard {
    registry: InFlight,
    number: OrderNumber,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.number);
    }
}

/// Background scheduler for order reconciliation.
pub struct ReconciliationDriver<S, O>
where
    S: LedgerStore + 'static,
    O: AccrualOraclePort + 'static,
{
    store: Arc<S>,
    orders: Arc<OrderLifecycleManager<S, O>>,
    config: ReconciliationConfig,
    in_flight: InFlight,
    permits: Arc<Semaphore>,
    workers: tokio::sync::Mutex<JoinSet<WorkerResult>>,
    cursor: Mutex<Option<PendingOrderKey>>,
}

impl<S, O> ReconciliationDriver<S, O>
where
    S: LedgerStore + 'static,
    O: AccrualOraclePort + 'static,
{
    /// Create a driver. Zero concurrency or batch size is raised to one.
    pub fn new(
        store: Arc<S>,
        orders: Arc<OrderLifecycleManager<S, O>>,
        mut config: ReconciliationConfig,
    ) -> Self {
        config.max_concurrency = config.max_concurrency.max(1);
        config.batch_size = config.batch_size.max(1);
        Self {
            store,
            orders,
            permits: Arc::new(Semaphore::new(config.max_concurrency)),
            config,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            workers: tokio::sync::Mutex::new(JoinSet::new()),
            cursor: Mutex::new(None),
        }
    }

    /// Driver configuration.
    pub const fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    /// Number of orders currently being reconciled.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    fn claim(&self, number: &OrderNumber) -> Option<InFlightGuard> {
        let mut registry = self.in_flight.lock();
        if !registry.insert(number.clone()) {
            return None;
        }
        Some(InFlightGuard {
            registry: Arc::clone(&self.in_flight),
            number: number.clone(),
        })
    }

    async fn fetch_page(
        &self,
        after: Option<&PendingOrderKey>,
    ) -> Result<Vec<PendingOrderKey>, LedgerError> {
        self.store
            .find_pending_orders(after, self.config.batch_size)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to list pending orders");
                LedgerError::retryable("failed to list pending orders")
            })
    }

    /// Next page of the pending scan. A short page ends the pass, and the
    /// following call starts again from the oldest order.
    async fn next_batch(&self) -> Result<Vec<PendingOrderKey>, LedgerError> {
        let after = self.cursor.lock().clone();
        let mut batch = self.fetch_page(after.as_ref()).await?;
        if batch.is_empty() && after.is_some() {
            batch = self.fetch_page(None).await?;
        }

        *self.cursor.lock() = if batch.len() == self.config.batch_size {
            batch.last().cloned()
        } else {
            None
        };
        Ok(batch)
    }

    /// Run one reconciliation pass over the next page of pending orders.
    ///
    /// Per-order failures are counted, never returned. Only failing to list
    /// pending orders fails the cycle.
    pub async fn run_cycle(&self) -> Result<CycleReport, LedgerError> {
        let started = Instant::now();
        let mut workers = self.workers.lock().await;
        let mut report = CycleReport::default();

        while let Some(joined) = workers.try_join_next() {
            report.tally(joined);
        }

        let pending = self.next_batch().await?;
        report.scanned = pending.len();

        for PendingOrderKey { number, .. } in pending {
            let Some(guard) = self.claim(&number) else {
                tracing::debug!(order_number = %number, "Order already in flight, skipping");
                report.skipped_in_flight += 1;
                continue;
            };
            let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                break;
            };
            let orders = Arc::clone(&self.orders);
            workers.spawn(async move {
                let _permit = permit;
                let _guard = guard;
                let result = orders.process_order(&number).await;
                (number, result)
            });
        }

        let deadline = tokio::time::Instant::now() + self.config.interval;
        while let Ok(Some(joined)) = tokio::time::timeout_at(deadline, workers.join_next()).await {
            report.tally(joined);
        }
        if !workers.is_empty() {
            tracing::debug!(
                stragglers = workers.len(),
                "Leaving slow reconciliations to a later cycle"
            );
        }

        metrics::record_cycle(report.scanned, report.failed, started.elapsed());
        tracing::debug!(
            scanned = report.scanned,
            finalized = report.finalized,
            pending = report.pending,
            failed = report.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Reconciliation cycle complete"
        );

        Ok(report)
    }

    /// Run cycles until `shutdown` is cancelled, then abort any stragglers.
    ///
    /// A rate-limit hint from the accrual system delays the next cycle by the
    /// hinted duration.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval_ms = self.config.interval.as_millis() as u64,
            max_concurrency = self.config.max_concurrency,
            batch_size = self.config.batch_size,
            "Reconciliation driver started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                () = shutdown.cancelled() => break,
            }

            let pause = match self.run_cycle().await {
                Ok(report) => report.retry_after,
                Err(e) => {
                    tracing::warn!(error = %e, "Reconciliation cycle failed");
                    None
                }
            };

            if let Some(pause) = pause {
                tracing::info!(pause_ms = pause.as_millis() as u64, "Accrual system asked to back off");
                tokio::select! {
                    () = tokio::time::sleep(pause) => interval.reset(),
                    () = shutdown.cancelled() => break,
                }
            }
        }

        self.workers.lock().await.shutdown().await;
        tracing::info!("Reconciliation driver stopped");
    }

    /// Spawn [`Self::run`] on the runtime.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::application::ports::OracleError;
    use crate::application::use_cases::DEFAULT_ORACLE_TIMEOUT;
    use crate::domain::balance_ledger::Account;
    use crate::domain::order_lifecycle::{AccrualVerdict, LoyaltyOrder, OrderStatus};
    use crate::domain::shared::{Points, UserId};
    use crate::infrastructure::persistence::InMemoryLedgerStore;

    /// Scripted oracle that counts calls and tracks peak concurrency.
    #[derive(Default)]
    struct ScriptedOracle {
        verdicts: HashMap<String, Result<AccrualVerdict, OracleError>>,
        delay: Duration,
        slow: HashMap<String, Duration>,
        calls: Mutex<HashMap<String, usize>>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ScriptedOracle {
        fn with(mut self, number: &str, verdict: Result<AccrualVerdict, OracleError>) -> Self {
            self.verdicts.insert(number.to_string(), verdict);
            self
        }

        fn with_delay(mut self, number: &str, delay: Duration) -> Self {
            self.slow.insert(number.to_string(), delay);
            self
        }

        fn calls_for(&self, number: &str) -> usize {
            self.calls.lock().get(number).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl AccrualOraclePort for ScriptedOracle {
        async fn fetch_verdict(
            &self,
            number: &OrderNumber,
        ) -> Result<AccrualVerdict, OracleError> {
            *self.calls.lock().entry(number.to_string()).or_default() += 1;
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let delay = self.slow.get(number.as_str()).copied().unwrap_or(self.delay);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.verdicts
                .get(number.as_str())
                .cloned()
                .unwrap_or(Ok(AccrualVerdict::Processing))
        }
    }

    async fn seeded_store(numbers: &[&str]) -> Arc<InMemoryLedgerStore> {
        let store = Arc::new(InMemoryLedgerStore::new());
        store.create_user(&Account::open(UserId::new("u"))).await.unwrap();
        for n in numbers {
            store
                .create_order(&LoyaltyOrder::new(
                    OrderNumber::parse(n).unwrap(),
                    UserId::new("u"),
                ))
                .await
                .unwrap();
        }
        store
    }

    fn driver(
        store: &Arc<InMemoryLedgerStore>,
        oracle: ScriptedOracle,
        max_concurrency: usize,
    ) -> (
        ReconciliationDriver<InMemoryLedgerStore, ScriptedOracle>,
        Arc<ScriptedOracle>,
    ) {
        driver_with_batch(store, oracle, max_concurrency, 50)
    }

    fn driver_with_batch(
        store: &Arc<InMemoryLedgerStore>,
        oracle: ScriptedOracle,
        max_concurrency: usize,
        batch_size: usize,
    ) -> (
        ReconciliationDriver<InMemoryLedgerStore, ScriptedOracle>,
        Arc<ScriptedOracle>,
    ) {
        let oracle = Arc::new(oracle);
        let orders = Arc::new(OrderLifecycleManager::new(
            Arc::clone(store),
            Arc::clone(&oracle),
        ));
        let driver = ReconciliationDriver::new(
            Arc::clone(store),
            orders,
            ReconciliationConfig {
                interval: Duration::from_millis(100),
                max_concurrency,
                batch_size,
            },
        );
        (driver, oracle)
    }

    async fn balance(store: &InMemoryLedgerStore) -> Points {
        store.get_user(&UserId::new("u")).await.unwrap().unwrap().balance()
    }

    #[tokio::test]
    async fn finalizes_and_credits_once() {
        let store = seeded_store(&["18", "26"]).await;
        let oracle = ScriptedOracle::default()
            .with("18", Ok(AccrualVerdict::Processed(Points::whole(500))))
            .with("26", Ok(AccrualVerdict::Invalid));
        let (driver, oracle) = driver(&store, oracle, 2);

        let first = driver.run_cycle().await.unwrap();
        assert_eq!(first.scanned, 2);
        assert_eq!(first.finalized, 2);
        assert_eq!(balance(&store).await, Points::whole(500));

        let second = driver.run_cycle().await.unwrap();
        assert_eq!(second, CycleReport::default());
        assert_eq!(oracle.calls_for("18"), 1);
        assert_eq!(balance(&store).await, Points::whole(500));
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_batch() {
        let store = seeded_store(&["18", "26", "34"]).await;
        let oracle = ScriptedOracle::default()
            .with("18", Err(OracleError::Unavailable { status: 503 }))
            .with("26", Ok(AccrualVerdict::Processed(Points::whole(10))))
            .with("34", Ok(AccrualVerdict::Registered));
        let (driver, _oracle) = driver(&store, oracle, 1);

        let report = driver.run_cycle().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.finalized, 1);
        assert_eq!(report.pending, 1);
        assert_eq!(report.retry_after, None);

        let failed = store
            .get_order_by_number(&OrderNumber::parse("18").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(failed.status(), OrderStatus::New);
        let pending = store
            .get_order_by_number(&OrderNumber::parse("34").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pending.status(), OrderStatus::Processing);
        assert_eq!(balance(&store).await, Points::whole(10));
    }

    #[tokio::test]
    async fn rate_limit_hint_is_reported() {
        let store = seeded_store(&["18"]).await;
        let oracle = ScriptedOracle::default().with(
            "18",
            Err(OracleError::RateLimited {
                retry_after: Some(Duration::from_secs(60)),
            }),
        );
        let (driver, _oracle) = driver(&store, oracle, 1);

        let report = driver.run_cycle().await.unwrap();
        assert_eq!(report.failed, 1);
        assert_eq!(report.retry_after, Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn in_flight_orders_are_skipped() {
        let store = seeded_store(&["18", "26"]).await;
        let (driver, oracle) = driver(&store, ScriptedOracle::default(), 2);

        let held = driver.claim(&OrderNumber::parse("18").unwrap()).unwrap();
        let report = driver.run_cycle().await.unwrap();

        assert_eq!(report.skipped_in_flight, 1);
        assert_eq!(oracle.calls_for("18"), 0);
        assert_eq!(oracle.calls_for("26"), 1);
        assert_eq!(driver.in_flight_count(), 1);

        drop(held);
        assert_eq!(driver.in_flight_count(), 0);
        driver.run_cycle().await.unwrap();
        assert_eq!(oracle.calls_for("18"), 1);
    }

    #[tokio::test]
    async fn claim_is_exclusive() {
        let store = seeded_store(&[]).await;
        let (driver, _oracle) = driver(&store, ScriptedOracle::default(), 1);
        let number = OrderNumber::parse("18").unwrap();

        let first = driver.claim(&number);
        assert!(first.is_some());
        assert!(driver.claim(&number).is_none());
        drop(first);
        assert!(driver.claim(&number).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn worker_pool_is_bounded() {
        let numbers = ["18", "26", "34", "42", "59", "67"];
        let store = seeded_store(&numbers).await;
        let oracle = ScriptedOracle {
            delay: Duration::from_millis(50),
            ..ScriptedOracle::default()
        };
        let (driver, oracle) = driver(&store, oracle, 2);

        let report = driver.run_cycle().await.unwrap();
        assert_eq!(report.scanned, numbers.len());
        assert_eq!(report.pending, numbers.len());
        assert!(oracle.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(driver.in_flight_count(), 0);
    }

    async fn status_of(store: &InMemoryLedgerStore, number: &str) -> OrderStatus {
        store
            .get_order_by_number(&OrderNumber::parse(number).unwrap())
            .await
            .unwrap()
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn unsettled_orders_do_not_starve_newer_ones() {
        let store = seeded_store(&["18", "26", "34"]).await;
        let oracle = ScriptedOracle::default()
            .with("18", Ok(AccrualVerdict::Unknown))
            .with("26", Ok(AccrualVerdict::Unknown))
            .with("34", Ok(AccrualVerdict::Processed(Points::whole(500))));
        let (driver, oracle) = driver_with_batch(&store, oracle, 2, 2);

        let first = driver.run_cycle().await.unwrap();
        assert_eq!(first.scanned, 2);
        assert_eq!(status_of(&store, "34").await, OrderStatus::New);

        let second = driver.run_cycle().await.unwrap();
        assert_eq!(second.scanned, 1);
        assert_eq!(second.finalized, 1);
        assert_eq!(status_of(&store, "34").await, OrderStatus::Processed);
        assert_eq!(balance(&store).await, Points::whole(500));

        // The scan wraps and keeps revisiting the unsettled orders.
        let third = driver.run_cycle().await.unwrap();
        assert_eq!(third.scanned, 2);
        assert_eq!(oracle.calls_for("18"), 2);
        assert_eq!(oracle.calls_for("26"), 2);
        assert_eq!(oracle.calls_for("34"), 1);
        assert_eq!(status_of(&store, "18").await, OrderStatus::Processing);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_order_does_not_hold_back_others() {
        let store = seeded_store(&["18", "26", "34"]).await;
        let oracle = ScriptedOracle::default()
            .with("26", Ok(AccrualVerdict::Processed(Points::whole(500))))
            .with("34", Ok(AccrualVerdict::Processed(Points::whole(7))))
            .with_delay("18", Duration::from_secs(60));
        let (driver, oracle) = driver(&store, oracle, 2);

        let started = tokio::time::Instant::now();
        let first = driver.run_cycle().await.unwrap();
        assert!(started.elapsed() < DEFAULT_ORACLE_TIMEOUT);
        assert_eq!(first.finalized, 2);
        assert_eq!(balance(&store).await, Points::whole(507));
        assert_eq!(driver.in_flight_count(), 1);

        let second = driver.run_cycle().await.unwrap();
        assert_eq!(second.skipped_in_flight, 1);
        assert_eq!(oracle.calls_for("18"), 1);

        // Once the oracle timeout fires, a later cycle tallies the failure
        // and tries the order again.
        tokio::time::sleep(DEFAULT_ORACLE_TIMEOUT).await;
        let third = driver.run_cycle().await.unwrap();
        assert_eq!(third.failed, 1);
        assert_eq!(oracle.calls_for("18"), 2);
        assert_eq!(status_of(&store, "18").await, OrderStatus::New);
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_cancel() {
        let store = seeded_store(&["18"]).await;
        let oracle = ScriptedOracle::default()
            .with("18", Ok(AccrualVerdict::Processed(Points::whole(7))));
        let (driver, _oracle) = driver(&store, oracle, 1);
        let driver = Arc::new(driver);
        let shutdown = CancellationToken::new();

        let handle = Arc::clone(&driver).spawn(shutdown.clone());
        tokio::time::sleep(Duration::from_millis(250)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(balance(&store).await, Points::whole(7));
    }

    #[test]
    fn zero_limits_are_raised() {
        let store = Arc::new(InMemoryLedgerStore::new());
        let oracle = Arc::new(ScriptedOracle::default());
        let orders = Arc::new(OrderLifecycleManager::new(Arc::clone(&store), oracle));
        let driver = ReconciliationDriver::new(
            store,
            orders,
            ReconciliationConfig {
                interval: Duration::from_secs(1),
                max_concurrency: 0,
                batch_size: 0,
            },
        );
        assert_eq!(driver.config().max_concurrency, 1);
        assert_eq!(driver.config().batch_size, 1);
    }
}
