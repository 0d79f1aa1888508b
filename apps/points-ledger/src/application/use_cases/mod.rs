//! Application Use Cases
//!
//! Use cases orchestrate domain logic to fulfill application requirements.

mod balance_ledger;
mod order_lifecycle;

pub use balance_ledger::BalanceLedger;
pub use order_lifecycle::{
    DEFAULT_ORACLE_TIMEOUT, OrderLifecycleManager, ProcessOutcome, UploadOutcome,
};

use crate::application::ports::StoreError;
use crate::error::LedgerError;

/// Log a store failure and hide its detail behind a retryable internal error.
fn store_failure(error: &StoreError, operation: &'static str) -> LedgerError {
    tracing::error!(operation, error = %error, "Ledger store failure");
    LedgerError::retryable(format!("ledger store failure during {operation}"))
}
