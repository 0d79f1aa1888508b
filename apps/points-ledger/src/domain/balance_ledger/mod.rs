//! Balance Ledger Bounded Context
//!
//! User accounts and the append-only withdrawal history.
//!
//! An account's balance is the sum of credited accruals minus completed
//! withdrawals. It is maintained incrementally and never goes negative.

pub mod account;
pub mod errors;
pub mod withdrawal;

pub use account::{Account, BalanceSummary};
pub use errors::BalanceError;
pub use withdrawal::Withdrawal;
