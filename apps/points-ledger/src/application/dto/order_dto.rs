//! Order DTOs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order_lifecycle::{LoyaltyOrder, OrderStatus};

/// An uploaded order as listed to its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDto {
    /// Order number.
    pub number: String,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Points earned; only present once processed.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub accrual: Option<Decimal>,
    /// Upload time, RFC 3339.
    pub uploaded_at: String,
}

impl From<&LoyaltyOrder> for OrderDto {
    fn from(order: &LoyaltyOrder) -> Self {
        Self {
            number: order.number().to_string(),
            status: order.status(),
            accrual: (order.status() == OrderStatus::Processed).then(|| order.accrual().amount()),
            uploaded_at: order.uploaded_at().to_rfc3339(),
        }
    }
}
