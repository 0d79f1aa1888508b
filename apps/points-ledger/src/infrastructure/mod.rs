//! Infrastructure Layer
//!
//! Adapters implementing the application ports, plus the HTTP driver.

pub mod accrual;
pub mod http;
pub mod persistence;
