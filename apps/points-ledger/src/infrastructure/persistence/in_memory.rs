//! In-memory ledger store for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::ports::{LedgerStore, PendingOrderKey, StoreError};
use crate::domain::balance_ledger::{Account, BalanceError, Withdrawal};
use crate::domain::order_lifecycle::{LoyaltyOrder, OrderStatus};
use crate::domain::shared::{OrderNumber, Points, UserId};

#[derive(Debug, Default)]
struct LedgerState {
    users: HashMap<UserId, Account>,
    orders: HashMap<OrderNumber, LoyaltyOrder>,
    withdrawals: Vec<Withdrawal>,
}

/// In-memory implementation of `LedgerStore`.
///
/// All tables sit behind one lock, and every trait method holds the write
/// lock for its whole read-modify-write, which gives the same atomicity as a
/// database transaction. Not for production use: state dies with the process.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl InMemoryLedgerStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders.
    #[must_use]
    pub fn order_count(&self) -> usize {
        self.state.read().orders.len()
    }

    /// Number of stored withdrawals across all users.
    #[must_use]
    pub fn withdrawal_count(&self) -> usize {
        self.state.read().withdrawals.len()
    }
}

fn balance_error(user_id: &UserId, error: BalanceError) -> StoreError {
    match error {
        BalanceError::InsufficientFunds { .. } => StoreError::InsufficientFunds {
            user_id: user_id.to_string(),
        },
        BalanceError::InvalidAmount { .. } => StoreError::Query {
            message: error.to_string(),
        },
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn get_user(&self, user_id: &UserId) -> Result<Option<Account>, StoreError> {
        Ok(self.state.read().users.get(user_id).cloned())
    }

    async fn create_user(&self, account: &Account) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if state.users.contains_key(account.id()) {
            return Err(StoreError::DuplicateUser {
                user_id: account.id().to_string(),
            });
        }
        state.users.insert(account.id().clone(), account.clone());
        Ok(())
    }

    async fn get_order_by_number(
        &self,
        number: &OrderNumber,
    ) -> Result<Option<LoyaltyOrder>, StoreError> {
        Ok(self.state.read().orders.get(number).cloned())
    }

    async fn create_order(&self, order: &LoyaltyOrder) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if state.orders.contains_key(order.number()) {
            return Err(StoreError::DuplicateOrder {
                number: order.number().to_string(),
            });
        }
        state.orders.insert(order.number().clone(), order.clone());
        Ok(())
    }

    async fn update_order_status(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Points,
    ) -> Result<bool, StoreError> {
        if status.is_terminal() {
            return Err(StoreError::Query {
                message: format!("terminal status {status} must go through finalize_order"),
            });
        }
        let mut state = self.state.write();
        let order = state
            .orders
            .get_mut(number)
            .ok_or_else(|| StoreError::OrderNotFound {
                number: number.to_string(),
            })?;
        if order.status().is_terminal() {
            return Ok(false);
        }
        let from = order.status();
        order
            .transition(status, accrual)
            .map_err(|_| StoreError::InvalidTransition {
                number: number.to_string(),
                from,
                to: status,
            })?;
        Ok(true)
    }

    async fn finalize_order(
        &self,
        number: &OrderNumber,
        status: OrderStatus,
        accrual: Points,
    ) -> Result<bool, StoreError> {
        if !status.is_terminal() {
            return Err(StoreError::Query {
                message: format!("finalize_order requires a terminal status, got {status}"),
            });
        }
        let mut guard = self.state.write();
        let state = &mut *guard;
        let order = state
            .orders
            .get_mut(number)
            .ok_or_else(|| StoreError::OrderNotFound {
                number: number.to_string(),
            })?;
        if order.status().is_terminal() {
            return Ok(false);
        }
        let account = state
            .users
            .get_mut(order.owner())
            .ok_or_else(|| StoreError::UserNotFound {
                user_id: order.owner().to_string(),
            })?;

        // Validate both mutations before applying either.
        let mut next_order = order.clone();
        let from = next_order.status();
        next_order
            .transition(status, accrual)
            .map_err(|_| StoreError::InvalidTransition {
                number: number.to_string(),
                from,
                to: status,
            })?;
        let mut next_account = account.clone();
        next_account
            .credit(accrual)
            .map_err(|e| balance_error(account.id(), e))?;

        *order = next_order;
        *account = next_account;
        Ok(true)
    }

    async fn update_balance(&self, user_id: &UserId, delta: Points) -> Result<Points, StoreError> {
        let mut state = self.state.write();
        let account = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::UserNotFound {
                user_id: user_id.to_string(),
            })?;
        account.adjust(delta).map_err(|e| balance_error(user_id, e))?;
        Ok(account.balance())
    }

    async fn create_withdrawal(&self, withdrawal: &Withdrawal) -> Result<Points, StoreError> {
        let mut state = self.state.write();
        let account = state
            .users
            .get_mut(withdrawal.owner())
            .ok_or_else(|| StoreError::UserNotFound {
                user_id: withdrawal.owner().to_string(),
            })?;
        account
            .debit(withdrawal.sum())
            .map_err(|e| balance_error(withdrawal.owner(), e))?;
        let balance = account.balance();
        state.withdrawals.push(withdrawal.clone());
        Ok(balance)
    }

    async fn get_user_orders(&self, user_id: &UserId) -> Result<Vec<LoyaltyOrder>, StoreError> {
        let state = self.state.read();
        let mut orders: Vec<LoyaltyOrder> = state
            .orders
            .values()
            .filter(|o| o.is_owned_by(user_id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.uploaded_at().cmp(&a.uploaded_at()));
        Ok(orders)
    }

    async fn get_user_withdrawals(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Withdrawal>, StoreError> {
        let state = self.state.read();
        let mut withdrawals: Vec<Withdrawal> = state
            .withdrawals
            .iter()
            .filter(|w| w.owner() == user_id)
            .cloned()
            .collect();
        withdrawals.sort_by(|a, b| b.processed_at().cmp(&a.processed_at()));
        Ok(withdrawals)
    }

    async fn find_pending_orders(
        &self,
        after: Option<&PendingOrderKey>,
        limit: usize,
    ) -> Result<Vec<PendingOrderKey>, StoreError> {
        let state = self.state.read();
        let mut pending: Vec<PendingOrderKey> = state
            .orders
            .values()
            .filter(|o| o.status().is_pending())
            .map(PendingOrderKey::of)
            .filter(|key| after.is_none_or(|after| key > after))
            .collect();
        pending.sort();
        pending.truncate(limit);
        Ok(pending)
    }
}
