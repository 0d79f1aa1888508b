//! Accrual system client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Accrual system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccrualConfig {
    /// Base URL of the accrual system.
    #[serde(default = "default_address")]
    pub address: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for AccrualConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl AccrualConfig {
    /// Request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_address() -> String {
    "http://localhost:8081".to_string()
}

const fn default_timeout_ms() -> u64 {
    5_000
}
