//! Shared Value Objects
//!
//! Immutable domain types used across bounded contexts.
//! Value objects are compared by value, not identity.

mod identifiers;
mod order_number;
mod points;
mod timestamp;

pub use identifiers::{UserId, WithdrawalId};
pub use order_number::OrderNumber;
pub use points::Points;
pub use timestamp::Timestamp;
