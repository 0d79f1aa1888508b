//! Application Ports (Driven)
//!
//! Ports define interfaces for interacting with external systems.
//! The core only ever sees these traits; adapters live in infrastructure.

mod accrual_oracle_port;
mod ledger_store_port;

#[cfg(test)]
pub use accrual_oracle_port::MockAccrualOraclePort;
pub use accrual_oracle_port::{AccrualOraclePort, OracleError};
pub use ledger_store_port::{LedgerStore, PendingOrderKey, StoreError};
