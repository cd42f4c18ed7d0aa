//! Observability module for metrics.
//!
//! Prometheus export of refresh and quote-source activity. Logging setup
//! lives in [`crate::telemetry`].

pub mod metrics;

pub use metrics::{MetricsConfig, MetricsError, init_metrics};
