//! Accrual System Adapter
//!
//! HTTP client implementing `AccrualOraclePort`.

mod http_client;

pub use http_client::HttpAccrualOracle;
