//! Balance ledger errors.

use std::fmt;

use crate::domain::shared::Points;

/// Errors raised by balance rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BalanceError {
    /// Debit larger than the available balance.
    InsufficientFunds {
        /// Balance at the time of the attempt.
        available: Points,
        /// Amount requested.
        requested: Points,
    },

    /// Amount not acceptable for the operation.
    InvalidAmount {
        /// Operation name ("credit", "withdraw").
        operation: &'static str,
        /// Offending amount.
        amount: Points,
    },
}

impl fmt::Display for BalanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientFunds {
                available,
                requested,
            } => write!(
                f,
                "Insufficient funds: requested {requested}, available {available}"
            ),
            Self::InvalidAmount { operation, amount } => {
                write!(f, "Invalid amount for {operation}: {amount}")
            }
        }
    }
}

impl std::error::Error for BalanceError {}
