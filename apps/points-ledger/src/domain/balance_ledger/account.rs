//! User account entity.

use serde::{Deserialize, Serialize};

use crate::domain::balance_ledger::errors::BalanceError;
use crate::domain::shared::{Points, Timestamp, UserId};

/// A loyalty program member's ledger account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: UserId,
    balance: Points,
    withdrawn: Points,
    created_at: Timestamp,
}

/// Point-in-time view of an account's totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSummary {
    /// Points available to withdraw.
    pub current: Points,
    /// Points withdrawn over the account's lifetime.
    pub withdrawn: Points,
}

impl Account {
    /// Open a new account with zero balance.
    #[must_use]
    pub fn open(id: UserId) -> Self {
        Self {
            id,
            balance: Points::ZERO,
            withdrawn: Points::ZERO,
            created_at: Timestamp::now(),
        }
    }

    /// Rebuild an account from stored fields.
    #[must_use]
    pub const fn restore(
        id: UserId,
        balance: Points,
        withdrawn: Points,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            balance,
            withdrawn,
            created_at,
        }
    }

    /// Account owner.
    #[must_use]
    pub const fn id(&self) -> &UserId {
        &self.id
    }

    /// Current balance.
    #[must_use]
    pub const fn balance(&self) -> Points {
        self.balance
    }

    /// Lifetime withdrawn total.
    #[must_use]
    pub const fn withdrawn(&self) -> Points {
        self.withdrawn
    }

    /// Opening time.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Totals for display.
    #[must_use]
    pub const fn summary(&self) -> BalanceSummary {
        BalanceSummary {
            current: self.balance,
            withdrawn: self.withdrawn,
        }
    }

    /// Add points to the balance. Zero is a no-op.
    ///
    /// # Errors
    ///
    /// Returns error if `amount` is negative.
    pub fn credit(&mut self, amount: Points) -> Result<(), BalanceError> {
        if amount.is_negative() {
            return Err(BalanceError::InvalidAmount {
                operation: "credit",
                amount,
            });
        }
        self.balance = self.balance + amount;
        Ok(())
    }

    /// Remove points for a withdrawal. The balance is left untouched on error.
    ///
    /// # Errors
    ///
    /// Returns error if `amount` is not positive or exceeds the balance.
    pub fn debit(&mut self, amount: Points) -> Result<(), BalanceError> {
        if !amount.is_positive() {
            return Err(BalanceError::InvalidAmount {
                operation: "withdraw",
                amount,
            });
        }
        let remaining =
            self.balance
                .checked_debit(amount)
                .ok_or(BalanceError::InsufficientFunds {
                    available: self.balance,
                    requested: amount,
                })?;
        self.balance = remaining;
        self.withdrawn = self.withdrawn + amount;
        Ok(())
    }

    /// Apply a signed balance adjustment without touching `withdrawn`.
    ///
    /// # Errors
    ///
    /// Returns error if the adjustment would take the balance below zero.
    pub fn adjust(&mut self, delta: Points) -> Result<(), BalanceError> {
        let next = self.balance + delta;
        if next.is_negative() {
            return Err(BalanceError::InsufficientFunds {
                available: self.balance,
                requested: Points::ZERO - delta,
            });
        }
        self.balance = next;
        Ok(())
    }
}
