//! Order State Machine Service
//!
//! Validates accrual lifecycle transitions and maps accrual verdicts onto them.

use crate::domain::order_lifecycle::errors::OrderError;
use crate::domain::order_lifecycle::value_objects::{AccrualVerdict, OrderStatus};
use crate::domain::shared::Points;

/// What reconciliation should do with an order after asking the accrual system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStep {
    /// The order is already terminal; leave it alone.
    AlreadyFinal,
    /// Still waiting upstream. The order should be (or stay) `Processing`.
    Pending {
        /// Status the order is moving out of.
        from: OrderStatus,
    },
    /// The order reaches a terminal status.
    Finalize {
        /// Terminal status to store.
        status: OrderStatus,
        /// Accrual to store and credit (zero for `Invalid`).
        accrual: Points,
    },
}

/// Order State Machine for the accrual lifecycle.
///
/// ```text
/// New --------> Processing   (registered / processing / unknown upstream)
/// Processing -> Processing   (still pending)
/// New/Processing -> Processed | Invalid   (final verdict)
/// ```
pub struct OrderStateMachine;

impl OrderStateMachine {
    /// Check if a state transition is valid.
    #[must_use]
    pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
        matches!(
            (from, to),
            (
                OrderStatus::New | OrderStatus::Processing,
                OrderStatus::Processing | OrderStatus::Processed | OrderStatus::Invalid
            )
        )
    }

    /// Validate a state transition.
    ///
    /// # Errors
    ///
    /// Returns error if the transition is invalid.
    pub fn validate_transition(from: OrderStatus, to: OrderStatus) -> Result<(), OrderError> {
        if Self::is_valid_transition(from, to) {
            Ok(())
        } else {
            Err(OrderError::InvalidStateTransition { from, to })
        }
    }

    /// Get all valid next states from a given state.
    #[must_use]
    pub fn valid_next_states(from: OrderStatus) -> Vec<OrderStatus> {
        match from {
            OrderStatus::New | OrderStatus::Processing => vec![
                OrderStatus::Processing,
                OrderStatus::Processed,
                OrderStatus::Invalid,
            ],
            // Terminal states
            OrderStatus::Processed | OrderStatus::Invalid => vec![],
        }
    }

    /// Decide how an accrual verdict moves an order in `current` status.
    ///
    /// # Errors
    ///
    /// Returns error if a processed verdict carries a negative accrual.
    pub fn plan(current: OrderStatus, verdict: AccrualVerdict) -> Result<ReconcileStep, OrderError> {
        if current.is_terminal() {
            return Ok(ReconcileStep::AlreadyFinal);
        }

        match verdict {
            AccrualVerdict::Unknown | AccrualVerdict::Registered | AccrualVerdict::Processing => {
                Ok(ReconcileStep::Pending { from: current })
            }
            AccrualVerdict::Processed(accrual) => {
                if accrual.is_negative() {
                    return Err(OrderError::NegativeAccrual {
                        amount: accrual.to_string(),
                    });
                }
                Ok(ReconcileStep::Finalize {
                    status: OrderStatus::Processed,
                    accrual,
                })
            }
            AccrualVerdict::Invalid => Ok(ReconcileStep::Finalize {
                status: OrderStatus::Invalid,
                accrual: Points::ZERO,
            }),
        }
    }
}
