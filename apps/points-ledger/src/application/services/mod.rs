//! Application Services
//!
//! Long-running coordinators that sit beside the use cases and drive them
//! from background tasks.

mod reconciliation_driver;

pub use reconciliation_driver::{CycleReport, ReconciliationConfig, ReconciliationDriver};
