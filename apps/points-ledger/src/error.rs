//! Boundary errors for the points ledger.
//!
//! Use cases return [`LedgerError`]; the HTTP adapter turns it into a status
//! code and a small JSON body. Storage and accrual-system details stay in the
//! logs and never reach the response.
//!
//! # HTTP Status Codes
//!
//! | Code | Status | Usage |
//! |------|--------|-------|
//! | `INVALID_REQUEST` | 400 | Malformed body or bad amount |
//! | `UNAUTHORIZED` | 401 | Acting user unknown |
//! | `PAYMENT_REQUIRED` | 402 | Balance too low for withdrawal |
//! | `NOT_FOUND` | 404 | Order or account absent |
//! | `CONFLICT` | 409 | Order number owned by another user |
//! | `INVALID_ORDER_NUMBER` | 422 | Order number fails format/checksum |
//! | `INTERNAL_ERROR` | 500 | Storage or accrual-system failure |

use std::time::Duration;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes surfaced at the ledger boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Invalid request format or amount.
    InvalidRequest,
    /// Order number fails validation.
    InvalidOrderNumber,
    /// Acting user does not exist.
    Unauthorized,
    /// Insufficient balance.
    PaymentRequired,
    /// Entity absent.
    NotFound,
    /// Order number owned by another user.
    Conflict,
    /// Storage or accrual-system failure.
    Internal,
}

impl ErrorCode {
    /// HTTP status for this error.
    #[must_use]
    pub const fn http_status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest => StatusCode::BAD_REQUEST,
            Self::InvalidOrderNumber => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable reason string.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::InvalidOrderNumber => "INVALID_ORDER_NUMBER",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::PaymentRequired => "PAYMENT_REQUIRED",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// A ledger error with context.
#[derive(Debug, Error)]
pub struct LedgerError {
    /// Error code.
    code: ErrorCode,
    /// Human-readable message.
    message: String,
    /// Additional context (key-value pairs).
    context: Vec<(String, String)>,
    /// Whether the same call may succeed later without changes.
    retryable: bool,
    /// Upstream hint for when to try again.
    retry_after: Option<Duration>,
}

impl LedgerError {
    /// Create a new ledger error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: Vec::new(),
            retryable: false,
            retry_after: None,
        }
    }

    /// Add context to the error.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.push((key.into(), value.into()));
        self
    }

    /// Attach a retry hint.
    #[must_use]
    pub const fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }

    /// Get the error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Get the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the context.
    #[must_use]
    pub fn context(&self) -> &[(String, String)] {
        &self.context
    }

    /// Whether a later attempt may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Upstream-suggested delay before retrying.
    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Convert to an HTTP-compatible error response.
    ///
    /// Internal errors are reported with a fixed message.
    #[must_use]
    pub fn to_http_response(&self) -> HttpErrorResponse {
        let (message, details) = if self.code == ErrorCode::Internal {
            ("Internal server error".to_string(), Default::default())
        } else {
            (self.message.clone(), self.context.iter().cloned().collect())
        };
        HttpErrorResponse {
            code: self.code.reason().to_string(),
            message,
            details,
        }
    }
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code.reason(), self.message)
    }
}

/// HTTP-compatible error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpErrorResponse {
    /// Error code string.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Additional details.
    pub details: std::collections::HashMap<String, String>,
}

/// Convenience constructors for common errors.
impl LedgerError {
    /// Invalid request format or amount.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Order number fails validation.
    #[must_use]
    pub fn invalid_order_number(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidOrderNumber, message)
    }

    /// Acting user unknown.
    #[must_use]
    pub fn unauthorized(user_id: &str) -> Self {
        Self::new(ErrorCode::Unauthorized, "Unknown user").with_context("user_id", user_id)
    }

    /// Insufficient balance.
    #[must_use]
    pub fn payment_required(user_id: &str) -> Self {
        Self::new(ErrorCode::PaymentRequired, "Insufficient balance")
            .with_context("user_id", user_id)
    }

    /// Order not found.
    #[must_use]
    pub fn order_not_found(order_number: &str) -> Self {
        Self::new(
            ErrorCode::NotFound,
            format!("Order {order_number} not found"),
        )
        .with_context("order_number", order_number)
    }

    /// Account not found.
    #[must_use]
    pub fn account_not_found(user_id: &str) -> Self {
        Self::new(ErrorCode::NotFound, format!("Account {user_id} not found"))
            .with_context("user_id", user_id)
    }

    /// Order number already uploaded by another user.
    #[must_use]
    pub fn conflict(order_number: &str) -> Self {
        Self::new(
            ErrorCode::Conflict,
            format!("Order {order_number} was uploaded by another user"),
        )
        .with_context("order_number", order_number)
    }

    /// Internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Internal error that a later attempt may clear.
    #[must_use]
    pub fn retryable(message: impl Into<String>) -> Self {
        let mut error = Self::internal(message);
        error.retryable = true;
        error
    }
}
