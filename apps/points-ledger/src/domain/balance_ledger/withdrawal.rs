//! Withdrawal ledger entry.

use serde::{Deserialize, Serialize};

use crate::domain::balance_ledger::errors::BalanceError;
use crate::domain::shared::{OrderNumber, Points, Timestamp, UserId, WithdrawalId};

/// An immutable record of points leaving a user's balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    id: WithdrawalId,
    owner: UserId,
    order: OrderNumber,
    sum: Points,
    processed_at: Timestamp,
}

impl Withdrawal {
    /// Create a new withdrawal entry stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns error unless `sum` is strictly positive.
    pub fn new(owner: UserId, order: OrderNumber, sum: Points) -> Result<Self, BalanceError> {
        if !sum.is_positive() {
            return Err(BalanceError::InvalidAmount {
                operation: "withdraw",
                amount: sum,
            });
        }
        Ok(Self {
            id: WithdrawalId::generate(),
            owner,
            order,
            sum,
            processed_at: Timestamp::now(),
        })
    }

    /// Rebuild a withdrawal from stored fields.
    #[must_use]
    pub const fn restore(
        id: WithdrawalId,
        owner: UserId,
        order: OrderNumber,
        sum: Points,
        processed_at: Timestamp,
    ) -> Self {
        Self {
            id,
            owner,
            order,
            sum,
            processed_at,
        }
    }

    /// Entry identifier.
    #[must_use]
    pub const fn id(&self) -> &WithdrawalId {
        &self.id
    }

    /// User whose balance was debited.
    #[must_use]
    pub const fn owner(&self) -> &UserId {
        &self.owner
    }

    /// Order number the withdrawal was made against.
    #[must_use]
    pub const fn order(&self) -> &OrderNumber {
        &self.order
    }

    /// Amount withdrawn.
    #[must_use]
    pub const fn sum(&self) -> Points {
        self.sum
    }

    /// Commit time.
    #[must_use]
    pub const fn processed_at(&self) -> Timestamp {
        self.processed_at
    }
}
