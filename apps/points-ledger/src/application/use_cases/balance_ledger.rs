//! Balance Ledger Use Case
//!
//! Account opening, balance queries, credits and withdrawals.

use std::sync::Arc;

use super::store_failure;
use crate::application::ports::{LedgerStore, StoreError};
use crate::domain::balance_ledger::{Account, BalanceSummary, Withdrawal};
use crate::domain::shared::{OrderNumber, Points, UserId};
use crate::error::{ErrorCode, LedgerError};
use crate::observability::metrics;

/// Use case owning balance credits and debits.
pub struct BalanceLedger<S>
where
    S: LedgerStore,
{
    store: Arc<S>,
}

impl<S> BalanceLedger<S>
where
    S: LedgerStore,
{
    /// Create a new BalanceLedger.
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Open a zero-balance account for `user_id`. Idempotent.
    pub async fn open_account(&self, user_id: &UserId) -> Result<Account, LedgerError> {
        if let Some(existing) = self.load(user_id).await? {
            return Ok(existing);
        }

        let account = Account::open(user_id.clone());
        match self.store.create_user(&account).await {
            Ok(()) => {
                tracing::info!(user_id = %user_id, "Account opened");
                Ok(account)
            }
            Err(StoreError::DuplicateUser { .. }) => self
                .load(user_id)
                .await?
                .ok_or_else(|| LedgerError::internal("account vanished after insert")),
            Err(e) => Err(store_failure(&e, "open account")),
        }
    }

    /// Current and lifetime-withdrawn points.
    pub async fn get_balance(&self, user_id: &UserId) -> Result<BalanceSummary, LedgerError> {
        self.load(user_id)
            .await?
            .map(|account| account.summary())
            .ok_or_else(|| LedgerError::account_not_found(user_id.as_str()))
    }

    /// Add points to a balance. Zero is a no-op.
    ///
    /// Per-order idempotency of accrual credits is provided by the store's
    /// `finalize_order`; this entry point is for direct adjustments.
    pub async fn credit(&self, user_id: &UserId, amount: Points) -> Result<(), LedgerError> {
        amount
            .validate_credit()
            .map_err(|e| LedgerError::invalid_request(e.to_string()))?;
        if amount.is_zero() {
            return Ok(());
        }

        match self.store.update_balance(user_id, amount).await {
            Ok(balance) => {
                tracing::info!(user_id = %user_id, amount = %amount, balance = %balance, "Balance credited");
                Ok(())
            }
            Err(StoreError::UserNotFound { .. }) => {
                Err(LedgerError::account_not_found(user_id.as_str()))
            }
            Err(e) => Err(store_failure(&e, "credit balance")),
        }
    }

    /// Withdraw `sum` points against `order`.
    ///
    /// The balance check and the debit happen in one store operation, so
    /// concurrent withdrawals can never jointly overdraw.
    pub async fn withdraw(
        &self,
        user_id: &UserId,
        order: OrderNumber,
        sum: Points,
    ) -> Result<Withdrawal, LedgerError> {
        let withdrawal = Withdrawal::new(user_id.clone(), order, sum)
            .map_err(|e| LedgerError::invalid_request(e.to_string()))?;

        let result = match self.store.create_withdrawal(&withdrawal).await {
            Ok(balance) => {
                tracing::info!(
                    user_id = %user_id,
                    order_number = %withdrawal.order(),
                    sum = %sum,
                    balance = %balance,
                    "Withdrawal committed"
                );
                Ok(withdrawal)
            }
            Err(StoreError::UserNotFound { .. }) => {
                Err(LedgerError::unauthorized(user_id.as_str()))
            }
            Err(StoreError::InsufficientFunds { .. }) => {
                tracing::debug!(user_id = %user_id, sum = %sum, "Withdrawal refused: insufficient balance");
                Err(LedgerError::payment_required(user_id.as_str()))
            }
            Err(e) => Err(store_failure(&e, "create withdrawal")),
        };

        metrics::record_withdrawal(match &result {
            Ok(_) => "committed",
            Err(e) if e.code() == ErrorCode::PaymentRequired => "insufficient_funds",
            Err(_) => "failed",
        });
        result
    }

    /// A user's withdrawals, newest first.
    pub async fn get_withdrawals(&self, user_id: &UserId) -> Result<Vec<Withdrawal>, LedgerError> {
        self.store
            .get_user_withdrawals(user_id)
            .await
            .map_err(|e| store_failure(&e, "list withdrawals"))
    }

    async fn load(&self, user_id: &UserId) -> Result<Option<Account>, LedgerError> {
        self.store
            .get_user(user_id)
            .await
            .map_err(|e| store_failure(&e, "load account"))
    }
}
