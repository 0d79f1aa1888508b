//! Observability module for metrics.
//!
//! Structured logging and trace export live in [`crate::telemetry`].

pub mod metrics;

pub use metrics::{MetricsConfig, MetricsError, init_metrics};
