//! Balance and withdrawal DTOs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::balance_ledger::{BalanceSummary, Withdrawal};

/// Current balance and lifetime withdrawals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDto {
    /// Spendable points.
    #[serde(with = "rust_decimal::serde::float")]
    pub current: Decimal,
    /// Sum of all withdrawals.
    #[serde(with = "rust_decimal::serde::float")]
    pub withdrawn: Decimal,
}

impl From<BalanceSummary> for BalanceDto {
    fn from(summary: BalanceSummary) -> Self {
        Self {
            current: summary.current.amount(),
            withdrawn: summary.withdrawn.amount(),
        }
    }
}

/// Body of `POST /api/user/balance/withdraw`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawRequestDto {
    /// Order number the points are spent against.
    pub order: String,
    /// Points to withdraw.
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
}

/// A recorded withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalDto {
    /// Order number the points were spent against.
    pub order: String,
    /// Points withdrawn.
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
    /// When the withdrawal was recorded, RFC 3339.
    pub processed_at: String,
}

impl From<&Withdrawal> for WithdrawalDto {
    fn from(withdrawal: &Withdrawal) -> Self {
        Self {
            order: withdrawal.order().to_string(),
            sum: withdrawal.sum().amount(),
            processed_at: withdrawal.processed_at().to_rfc3339(),
        }
    }
}
