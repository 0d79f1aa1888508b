//! Order Lifecycle Use Case
//!
//! Accepts uploads, lists a user's orders and reconciles a single order
//! against the accrual system.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::store_failure;
use crate::application::ports::{AccrualOraclePort, LedgerStore, StoreError};
use crate::domain::order_lifecycle::{
    LoyaltyOrder, OrderStateMachine, OrderStatus, ReconcileStep,
};
use crate::domain::shared::{OrderNumber, Points, UserId};
use crate::error::LedgerError;
use crate::observability::metrics;

/// Default bound on a single accrual-system call.
pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a successful upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// New order stored.
    Accepted,
    /// Same user uploaded this number before; nothing written.
    AlreadyUploaded,
}

/// Result of a successful reconciliation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Order was already terminal; the accrual system was not consulted,
    /// or another worker finalized it first.
    AlreadyFinal,
    /// Accrual system has not decided yet; order is `Processing`.
    Pending,
    /// Order reached a terminal status and its accrual was credited.
    Finalized {
        /// Terminal status stored.
        status: OrderStatus,
        /// Points credited to the owner.
        accrual: Points,
    },
}

/// Use case owning the order accrual state machine.
pub struct OrderLifecycleManager<S, O>
where
    S: LedgerStore,
    O: AccrualOraclePort,
{
    store: Arc<S>,
    oracle: Arc<O>,
    oracle_timeout: Duration,
}

impl<S, O> OrderLifecycleManager<S, O>
where
    S: LedgerStore,
    O: AccrualOraclePort,
{
    /// Create a new manager with the default accrual timeout.
    pub fn new(store: Arc<S>, oracle: Arc<O>) -> Self {
        Self::with_timeout(store, oracle, DEFAULT_ORACLE_TIMEOUT)
    }

    /// Create a new manager with an explicit accrual timeout.
    pub const fn with_timeout(store: Arc<S>, oracle: Arc<O>, oracle_timeout: Duration) -> Self {
        Self {
            store,
            oracle,
            oracle_timeout,
        }
    }

    /// Register an order number for `user_id`.
    ///
    /// Re-uploading one's own number is an idempotent success; uploading a
    /// number someone else owns is a conflict.
    pub async fn upload_order(
        &self,
        user_id: &UserId,
        number: OrderNumber,
    ) -> Result<UploadOutcome, LedgerError> {
        if self
            .store
            .get_user(user_id)
            .await
            .map_err(|e| store_failure(&e, "load user"))?
            .is_none()
        {
            return Err(LedgerError::unauthorized(user_id.as_str()));
        }

        let existing = self
            .store
            .get_order_by_number(&number)
            .await
            .map_err(|e| store_failure(&e, "load order"))?;

        let outcome = match existing {
            Some(order) => ownership_outcome(&order, user_id),
            None => {
                let order = LoyaltyOrder::new(number.clone(), user_id.clone());
                match self.store.create_order(&order).await {
                    Ok(()) => {
                        tracing::info!(
                            order_number = %number,
                            user_id = %user_id,
                            "Order uploaded"
                        );
                        Ok(UploadOutcome::Accepted)
                    }
                    // Lost an insert race; the winner decides.
                    Err(StoreError::DuplicateOrder { .. }) => {
                        let winner = self
                            .store
                            .get_order_by_number(&number)
                            .await
                            .map_err(|e| store_failure(&e, "reload order"))?
                            .ok_or_else(|| LedgerError::internal("order vanished after insert"))?;
                        ownership_outcome(&winner, user_id)
                    }
                    Err(e) => Err(store_failure(&e, "create order")),
                }
            }
        };

        metrics::record_order_upload(match &outcome {
            Ok(UploadOutcome::Accepted) => "accepted",
            Ok(UploadOutcome::AlreadyUploaded) => "already_uploaded",
            Err(_) => "rejected",
        });
        outcome
    }

    /// A user's orders, newest upload first.
    pub async fn get_user_orders(&self, user_id: &UserId) -> Result<Vec<LoyaltyOrder>, LedgerError> {
        self.store
            .get_user_orders(user_id)
            .await
            .map_err(|e| store_failure(&e, "list orders"))
    }

    /// Reconcile one order against the accrual system.
    ///
    /// Terminal orders are left alone. Accrual-system failures leave the
    /// stored order untouched and come back as retryable internal errors.
    pub async fn process_order(&self, number: &OrderNumber) -> Result<ProcessOutcome, LedgerError> {
        let order = self
            .store
            .get_order_by_number(number)
            .await
            .map_err(|e| store_failure(&e, "load order"))?
            .ok_or_else(|| LedgerError::order_not_found(number.as_str()))?;

        if order.status().is_terminal() {
            metrics::record_reconciliation("already_final");
            return Ok(ProcessOutcome::AlreadyFinal);
        }

        let started = Instant::now();
        let verdict =
            match tokio::time::timeout(self.oracle_timeout, self.oracle.fetch_verdict(number)).await
            {
                Ok(Ok(verdict)) => {
                    metrics::record_oracle_call(started.elapsed(), "ok");
                    verdict
                }
                Ok(Err(e)) => {
                    metrics::record_oracle_call(started.elapsed(), "error");
                    tracing::warn!(order_number = %number, error = %e, "Accrual request failed");
                    return Err(LedgerError::retryable("accrual system unavailable")
                        .with_context("order_number", number.as_str())
                        .with_retry_after(e.retry_after()));
                }
                Err(_) => {
                    metrics::record_oracle_call(started.elapsed(), "timeout");
                    tracing::warn!(
                        order_number = %number,
                        timeout_ms = self.oracle_timeout.as_millis() as u64,
                        "Accrual request timed out"
                    );
                    return Err(LedgerError::retryable("accrual request timed out")
                        .with_context("order_number", number.as_str()));
                }
            };

        let step = OrderStateMachine::plan(order.status(), verdict).map_err(|e| {
            tracing::warn!(order_number = %number, error = %e, "Rejected accrual verdict");
            LedgerError::retryable("accrual system returned an unusable verdict")
                .with_context("order_number", number.as_str())
        })?;

        let outcome = match step {
            ReconcileStep::AlreadyFinal => ProcessOutcome::AlreadyFinal,
            ReconcileStep::Pending { from } => {
                if from == OrderStatus::Processing {
                    ProcessOutcome::Pending
                } else if self
                    .store
                    .update_order_status(number, OrderStatus::Processing, Points::ZERO)
                    .await
                    .map_err(|e| store_failure(&e, "mark processing"))?
                {
                    tracing::debug!(order_number = %number, "Order moved to PROCESSING");
                    ProcessOutcome::Pending
                } else {
                    ProcessOutcome::AlreadyFinal
                }
            }
            ReconcileStep::Finalize { status, accrual } => {
                let applied = self
                    .store
                    .finalize_order(number, status, accrual)
                    .await
                    .map_err(|e| store_failure(&e, "finalize order"))?;
                if applied {
                    tracing::info!(
                        order_number = %number,
                        user_id = %order.owner(),
                        status = %status,
                        accrual = %accrual,
                        "Order finalized"
                    );
                    ProcessOutcome::Finalized { status, accrual }
                } else {
                    ProcessOutcome::AlreadyFinal
                }
            }
        };

        metrics::record_reconciliation(match outcome {
            ProcessOutcome::AlreadyFinal => "already_final",
            ProcessOutcome::Pending => "pending",
            ProcessOutcome::Finalized {
                status: OrderStatus::Invalid,
                ..
            } => "invalid",
            ProcessOutcome::Finalized { .. } => "processed",
        });
        Ok(outcome)
    }
}

fn ownership_outcome(order: &LoyaltyOrder, user_id: &UserId) -> Result<UploadOutcome, LedgerError> {
    if order.is_owned_by(user_id) {
        Ok(UploadOutcome::AlreadyUploaded)
    } else {
        Err(LedgerError::conflict(order.number().as_str()))
    }
}
