//! Order Lifecycle Bounded Context
//!
//! Tracks a loyalty order from upload to its terminal accrual outcome.
//!
//! # Key Concepts
//!
//! - **LoyaltyOrder**: the entity; owner and number never change after upload
//! - **AccrualVerdict**: what the accrual system currently says about an order
//! - **OrderStateMachine**: decides how a verdict moves an order forward

pub mod aggregate;
pub mod errors;
pub mod services;
pub mod value_objects;

pub use aggregate::LoyaltyOrder;
pub use errors::OrderError;
pub use services::{OrderStateMachine, ReconcileStep};
pub use value_objects::{AccrualVerdict, OrderStatus};
