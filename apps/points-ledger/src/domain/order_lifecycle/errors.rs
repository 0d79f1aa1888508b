//! Order lifecycle errors.

use std::fmt;

use super::value_objects::OrderStatus;

/// Errors that can occur while moving an order through its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// Invalid state transition attempted.
    InvalidStateTransition {
        /// Current order status.
        from: OrderStatus,
        /// Attempted status.
        to: OrderStatus,
    },

    /// Accrual reported or stored with a negative amount.
    NegativeAccrual {
        /// The offending amount, formatted.
        amount: String,
    },

    /// Non-zero accrual attached to an order that is not processed.
    AccrualWithoutProcessed {
        /// Status the order was in.
        status: OrderStatus,
    },

    /// Status string not recognised.
    UnknownStatus(String),
}

impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidStateTransition { from, to } => {
                write!(f, "Invalid order transition from {from} to {to}")
            }
            Self::NegativeAccrual { amount } => {
                write!(f, "Accrual cannot be negative: {amount}")
            }
            Self::AccrualWithoutProcessed { status } => {
                write!(f, "Order in status {status} cannot carry an accrual")
            }
            Self::UnknownStatus(s) => write!(f, "Unknown order status: {s}"),
        }
    }
}

impl std::error::Error for OrderError {}
