//! Prometheus metrics for the points ledger.
//!
//! Recording functions are safe to call before [`init_metrics`]; without an
//! installed recorder they are no-ops.
//!
//! # Example
//!
//! ```ignore
//! use points_ledger::observability::{init_metrics, MetricsConfig};
//!
//! init_metrics(&MetricsConfig::default())?;
//! points_ledger::observability::metrics::record_withdrawal("committed");
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Configuration for the metrics exporter.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP listener.
    pub listen_addr: SocketAddr,
    /// Histogram buckets for latency measurements (in seconds).
    pub latency_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 9090)),
            // 1ms to 10s; accrual calls are network round-trips
            latency_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

impl MetricsConfig {
    /// Default buckets, custom address.
    #[must_use]
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            listen_addr: addr,
            ..Default::default()
        }
    }
}

/// Start the Prometheus exporter, serving `/metrics` on `listen_addr`.
///
/// # Errors
///
/// Returns an error if the exporter fails to start (e.g., port already in use).
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .set_buckets(&config.latency_buckets)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(addr = %config.listen_addr, "Prometheus metrics exporter started");

    Ok(())
}

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to configure metrics exporter.
    #[error("metrics configuration error: {0}")]
    Configuration(String),
    /// Failed to install metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

// ============================================================================
// Orders
// ============================================================================

/// Count an upload attempt by outcome (`accepted`, `already_uploaded`, `rejected`).
pub fn record_order_upload(outcome: &str) {
    counter!("ledger_order_uploads_total", "outcome" => outcome.to_string()).increment(1);
}

/// Count a single-order reconciliation by result
/// (`already_final`, `pending`, `processed`, `invalid`).
pub fn record_reconciliation(result: &str) {
    counter!("ledger_reconciliations_total", "result" => result.to_string()).increment(1);
}

/// Record one accrual-system call.
///
/// `outcome` is `ok`, `error` or `timeout`.
pub fn record_oracle_call(elapsed: Duration, outcome: &str) {
    counter!("ledger_accrual_requests_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("ledger_accrual_latency_seconds", "outcome" => outcome.to_string())
        .record(elapsed.as_secs_f64());
}

// ============================================================================
// Balances
// ============================================================================

/// Count a withdrawal attempt by outcome
/// (`committed`, `insufficient_funds`, `failed`).
pub fn record_withdrawal(outcome: &str) {
    counter!("ledger_withdrawals_total", "outcome" => outcome.to_string()).increment(1);
}

// ============================================================================
// Reconciliation driver
// ============================================================================

/// Record a completed reconciliation cycle.
pub fn record_cycle(scanned: usize, failed: usize, elapsed: Duration) {
    counter!("ledger_reconciliation_cycles_total").increment(1);
    counter!("ledger_reconciliation_failures_total").increment(failed as u64);
    gauge!("ledger_pending_orders").set(scanned as f64);
    histogram!("ledger_reconciliation_cycle_seconds").record(elapsed.as_secs_f64());
}
