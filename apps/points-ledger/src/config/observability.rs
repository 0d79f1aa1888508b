//! Observability configuration.

use serde::{Deserialize, Serialize};

/// Metrics exporter settings. Logging is configured through `RUST_LOG` and
/// the `OTEL_*` variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Prometheus listener port; 0 disables the exporter.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_port: default_metrics_port(),
        }
    }
}

const fn default_metrics_port() -> u16 {
    9090
}
