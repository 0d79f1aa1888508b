//! Domain Layer
//!
//! Core business logic of the loyalty ledger. Nothing in here knows about
//! HTTP, SQL, or the accrual system's wire format.
//!
//! # Bounded Contexts
//!
//! - `order_lifecycle`: loyalty orders and their accrual state machine
//! - `balance_ledger`: user accounts, balances, and withdrawals
//! - `shared`: value objects used by both contexts

pub mod balance_ledger;
pub mod order_lifecycle;
pub mod shared;
