//! Reconciliation driver configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::services::ReconciliationConfig as DriverConfig;

/// Reconciliation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Run the background driver.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Time between cycles in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Orders reconciled concurrently.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Pending orders fetched per cycle.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_ms: default_interval_ms(),
            max_concurrency: default_max_concurrency(),
            batch_size: default_batch_size(),
        }
    }
}

impl ReconciliationConfig {
    /// Convert to the driver's scheduling settings.
    #[must_use]
    pub const fn to_driver_config(&self) -> DriverConfig {
        DriverConfig {
            interval: Duration::from_millis(self.interval_ms),
            max_concurrency: self.max_concurrency,
            batch_size: self.batch_size,
        }
    }
}

const fn default_enabled() -> bool {
    true
}

const fn default_interval_ms() -> u64 {
    1_000
}

const fn default_max_concurrency() -> usize {
    4
}

const fn default_batch_size() -> usize {
    100
}
