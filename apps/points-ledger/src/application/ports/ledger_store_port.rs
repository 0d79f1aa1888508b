//! Ledger Store Port (Driven Port)
//!
//! Durable storage for accounts, orders and withdrawals.
//!
//! Operations that read and then write the same account or order are single
//! atomic units in every adapter: `finalize_order`, `update_balance` and
//! `create_withdrawal` must never interleave with another mutation of the
//! same account. The store owns that locking, not the caller.

use async_trait::async_trait;

use crate::domain::balance_ledger::{Account, Withdrawal};
use crate::domain::order_lifecycle::{LoyaltyOrder, OrderStatus};
use crate::domain::shared::{OrderNumber, Points, Timestamp, UserId};

/// Position of a pending order in the reconciliation scan.
///
/// Ordered by upload time, then by number, so every pending order has a
/// distinct place and a scan can resume after any of them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PendingOrderKey {
    /// Upload time of the order.
    pub uploaded_at: Timestamp,
    /// Order number.
    pub number: OrderNumber,
}

impl PendingOrderKey {
    /// Scan position of `order`.
    #[must_use]
    pub fn of(order: &LoyaltyOrder) -> Self {
        Self {
            uploaded_at: order.uploaded_at(),
            number: order.number().clone(),
        }
    }
}

/// Ledger store errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No account for the user.
    #[error("User not found: {user_id}")]
    UserNotFound {
        /// The missing user.
        user_id: String,
    },

    /// No order with the number.
    #[error("Order not found: {number}")]
    OrderNotFound {
        /// The missing order number.
        number: String,
    },

    /// Order number already stored.
    #[error("Order already exists: {number}")]
    DuplicateOrder {
        /// The conflicting order number.
        number: String,
    },

    /// Account already opened.
    #[error("User already exists: {user_id}")]
    DuplicateUser {
        /// The conflicting user.
        user_id: String,
    },

    /// Debit larger than the balance.
    #[error("Insufficient funds for user {user_id}")]
    InsufficientFunds {
        /// The account owner.
        user_id: String,
    },

    /// Requested transition not allowed from the stored status.
    #[error("Order {number} cannot move from {from} to {to}")]
    InvalidTransition {
        /// Order number.
        number: String,
        /// Stored status.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
    },

    /// Could not reach the database or open a connection.
    #[error("Store connection error: {message}")]
    Connection {
        /// Error details.
        message: String,
    },

    /// Statement failed.
    #[error("Store query error: {message}")]
    Query {
        /// Error details.
        message: String,
    },

    /// Stored data could not be decoded into domain types.
    #[error("Corrupt row: {message}")]
    Corrupt {
        /// Error details.
        message: String,
    },
}

/// Port for ledger persistence.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Find an account.
    async fn get_user(&self, user_id: &UserId) -> Result<Option<Account>, StoreError>;

    /// Open an account. Fails with `DuplicateUser` if one exists.
    async fn create_user(&self, account: &Account) -> Result<(), StoreError>;

    /// Find an order by number.
    async fn get_order_by_number(
        &self,
        number: &OrderNumber,
    ) -> Result<Option<LoyaltyOrder>, StoreError>;

    /// Insert a new order. Fails with `DuplicateOrder` if the number exists.
    async fn create_order(&self, order: &LoyaltyOrder) -> Result<(), StoreError>;

    /// Set a non-terminal status on an order that is not yet terminal.
    ///
    /// Returns `false` without writing if the order is already terminal.
    async fn update_order_status(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Points,
    ) -> Result<bool, StoreError>;

    /// Move an order to a terminal status and credit its accrual to the owner.
    ///
    /// Status change and credit commit together or not at all. Returns
    /// `false` without writing if the order was already terminal, so a
    /// repeated call never credits twice.
    async fn finalize_order(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Points,
    ) -> Result<bool, StoreError>;

    /// Atomically add `delta` (may be negative) to a balance.
    ///
    /// Returns the new balance. Fails with `InsufficientFunds` rather than go
    /// below zero.
    async fn update_balance(&self, user_id: &UserId, delta: Points) -> Result<Points, StoreError>;

    /// Debit the owner and append the withdrawal in one atomic unit.
    ///
    /// Returns the new balance. Fails with `InsufficientFunds` if the balance
    /// at commit time is below the sum, leaving everything unchanged.
    async fn create_withdrawal(&self, withdrawal: &Withdrawal) -> Result<Points, StoreError>;

    /// A user's orders, newest upload first.
    async fn get_user_orders(&self, user_id: &UserId) -> Result<Vec<LoyaltyOrder>, StoreError>;

    /// A user's withdrawals, newest first.
    async fn get_user_withdrawals(&self, user_id: &UserId)
    -> Result<Vec<Withdrawal>, StoreError>;

    /// Orders still in `New` or `Processing`, in key order, starting strictly
    /// after `after` (or from the oldest when `None`).
    async fn find_pending_orders(
        &self,
        after: Option<&PendingOrderKey>,
        limit: usize,
    ) -> Result<Vec<PendingOrderKey>, StoreError>;
}
