//! Accrual Oracle Port (Driven Port)
//!
//! Interface to the external accrual system that scores orders.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::order_lifecycle::AccrualVerdict;
use crate::domain::shared::OrderNumber;

/// Accrual system failures. All of them are transient from the ledger's view.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// No answer within the allowed time.
    #[error("Accrual request timed out after {after:?}")]
    Timeout {
        /// The elapsed budget.
        after: Duration,
    },

    /// The accrual system asked us to slow down.
    #[error("Rate limited by accrual system")]
    RateLimited {
        /// Suggested wait before the next request.
        retry_after: Option<Duration>,
    },

    /// Non-success HTTP status.
    #[error("Accrual system returned status {status}")]
    Unavailable {
        /// HTTP status code.
        status: u16,
    },

    /// Network-level failure.
    #[error("Accrual transport error: {message}")]
    Transport {
        /// Error details.
        message: String,
    },

    /// Response body could not be understood.
    #[error("Invalid accrual response: {message}")]
    InvalidResponse {
        /// Error details.
        message: String,
    },
}

impl OracleError {
    /// Suggested delay before talking to the accrual system again.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Port for querying the accrual system.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccrualOraclePort: Send + Sync {
    /// Ask for the current verdict on an order number.
    async fn fetch_verdict(&self, number: &OrderNumber) -> Result<AccrualVerdict, OracleError>;
}
