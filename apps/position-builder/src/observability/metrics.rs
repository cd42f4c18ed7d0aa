//! Prometheus metrics for the position builder.
//!
//! Recording functions are cheap no-ops until [`init_metrics`] installs a
//! recorder, so the builder records unconditionally and the binary decides
//! whether anything is exported.
//!
//! # Example
//!
//! ```ignore
//! use position_builder::observability::{init_metrics, MetricsConfig};
//!
//! init_metrics(&MetricsConfig::default())?;
//! record_refresh_request("manual");
//! ```

use std::net::{Ipv4Addr, SocketAddr};

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Configuration for the metrics exporter.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP listener.
    pub listen_addr: SocketAddr,
    /// Histogram buckets for quote fetch latency (in seconds).
    pub latency_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 9090)),
            // Broker round trips: 10ms to 30s
            latency_buckets: vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
        }
    }
}

impl MetricsConfig {
    /// Create a new metrics configuration with custom address.
    #[must_use]
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            listen_addr: addr,
            ..Default::default()
        }
    }
}

/// Initialize the Prometheus metrics exporter.
///
/// Starts an HTTP server that exposes metrics at `/metrics`.
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

    tracing::info!(
        addr = %config.listen_addr,
        "Prometheus metrics exporter started"
    );

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
// Refresh Metrics
// ============================================================================

/// Record a refresh request.
///
/// # Arguments
///
/// * `trigger` - What asked for it (`"manual"`, `"periodic"`, `"mutation"`)
pub fn record_refresh_request(trigger: &str) {
    counter!(
        "refresh_requests_total",
        "trigger" => trigger.to_string()
    )
    .increment(1);
}

/// Record a pending request overwritten before it was dispatched.
pub fn record_refresh_superseded() {
    counter!("refresh_superseded_total").increment(1);
}

/// Record how a quote response was handled.
///
/// # Arguments
///
/// * `outcome` - `"applied"`, `"discarded"` or `"failed"`
pub fn record_quote_response(outcome: &str) {
    counter!(
        "quote_responses_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

// ============================================================================
// Quote Source Metrics
// ============================================================================

/// Record a quote source error.
///
/// # Arguments
///
/// * `kind` - Error kind (`"connection_lost"`, `"chain_lookup_failed"`)
pub fn record_quote_source_failure(kind: &str) {
    counter!(
        "quote_source_failures_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Record how long one fetch took, successful or not.
pub fn record_quote_fetch_latency(seconds: f64) {
    histogram!("quote_fetch_latency_seconds").record(seconds);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_listens_on_9090() {
        let config = MetricsConfig::default();
        assert_eq!(config.listen_addr.port(), 9090);
        assert!(config.latency_buckets.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn with_addr_keeps_buckets() {
        let addr: SocketAddr = "127.0.0.1:9191".parse().unwrap();
        let config = MetricsConfig::with_addr(addr);
        assert_eq!(config.listen_addr, addr);
        assert_eq!(config.latency_buckets, MetricsConfig::default().latency_buckets);
    }

    #[test]
    fn recording_without_recorder_is_noop() {
        record_refresh_request("manual");
        record_refresh_superseded();
        record_quote_response("applied");
        record_quote_source_failure("connection_lost");
        record_quote_fetch_latency(0.25);
    }
}
