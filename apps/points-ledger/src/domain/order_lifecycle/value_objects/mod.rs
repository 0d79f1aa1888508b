//! Order lifecycle value objects.

mod accrual_verdict;
mod order_status;

pub use accrual_verdict::AccrualVerdict;
pub use order_status::OrderStatus;
