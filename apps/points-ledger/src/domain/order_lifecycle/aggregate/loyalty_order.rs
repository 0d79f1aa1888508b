//! Loyalty order entity.

use serde::{Deserialize, Serialize};

use crate::domain::order_lifecycle::errors::OrderError;
use crate::domain::order_lifecycle::services::OrderStateMachine;
use crate::domain::order_lifecycle::value_objects::OrderStatus;
use crate::domain::shared::{OrderNumber, Points, Timestamp, UserId};

/// An order number submitted by a user for loyalty accrual.
///
/// `number`, `owner` and `uploaded_at` are fixed at upload. Only `status` and
/// `accrual` change, and only forward through [`OrderStateMachine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyOrder {
    number: OrderNumber,
    owner: UserId,
    status: OrderStatus,
    accrual: Points,
    uploaded_at: Timestamp,
}

impl LoyaltyOrder {
    /// Create a freshly uploaded order in `New` status.
    #[must_use]
    pub fn new(number: OrderNumber, owner: UserId) -> Self {
        Self::with_upload_time(number, owner, Timestamp::now())
    }

    /// Create a `New` order with an explicit upload time.
    #[must_use]
    pub const fn with_upload_time(
        number: OrderNumber,
        owner: UserId,
        uploaded_at: Timestamp,
    ) -> Self {
        Self {
            number,
            owner,
            status: OrderStatus::New,
            accrual: Points::ZERO,
            uploaded_at,
        }
    }

    /// Rebuild an order from stored fields.
    ///
    /// # Errors
    ///
    /// Returns error if the stored accrual is inconsistent with the status.
    pub fn restore(
        number: OrderNumber,
        owner: UserId,
        status: OrderStatus,
        accrual: Points,
        uploaded_at: Timestamp,
    ) -> Result<Self, OrderError> {
        check_accrual(status, accrual)?;
        Ok(Self {
            number,
            owner,
            status,
            accrual,
            uploaded_at,
        })
    }

    /// Order number.
    #[must_use]
    pub const fn number(&self) -> &OrderNumber {
        &self.number
    }

    /// Owning user.
    #[must_use]
    pub const fn owner(&self) -> &UserId {
        &self.owner
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> OrderStatus {
        self.status
    }

    /// Accrued points; zero unless processed.
    #[must_use]
    pub const fn accrual(&self) -> Points {
        self.accrual
    }

    /// Upload time.
    #[must_use]
    pub const fn uploaded_at(&self) -> Timestamp {
        self.uploaded_at
    }

    /// Returns true if `user` owns this order.
    #[must_use]
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner == user
    }

    /// Move the order to a new status with the given accrual.
    ///
    /// # Errors
    ///
    /// Returns error if the transition is not allowed or the accrual does
    /// not fit the target status.
    pub fn transition(&mut self, to: OrderStatus, accrual: Points) -> Result<(), OrderError> {
        OrderStateMachine::validate_transition(self.status, to)?;
        check_accrual(to, accrual)?;
        self.status = to;
        self.accrual = accrual;
        Ok(())
    }
}

fn check_accrual(status: OrderStatus, accrual: Points) -> Result<(), OrderError> {
    if accrual.is_negative() {
        return Err(OrderError::NegativeAccrual {
            amount: accrual.to_string(),
        });
    }
    if status != OrderStatus::Processed && !accrual.is_zero() {
        return Err(OrderError::AccrualWithoutProcessed { status });
    }
    Ok(())
}
