//! Prometheus metrics for the claim monitor.
//!
//! All metrics are aggregated in the [`Metrics`] struct for easy tracking
//! and management.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Aggregated metrics for the claim monitor.
///
/// Metric descriptions are registered with the global registry on
/// creation.
#[derive(Debug, Clone)]
pub struct Metrics {
    _private: (),
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance and register all metric descriptions.
    pub fn new() -> Self {
        Self::register_descriptions();
        Self { _private: () }
    }

    fn register_descriptions() {
        describe_counter!(
            "claim_monitor_ticks_total",
            "Total number of scheduler ticks executed"
        );
        describe_histogram!(
            "claim_monitor_tick_duration_seconds",
            "Duration of each scheduler tick in seconds"
        );

        describe_counter!(
            "claim_monitor_check_success_total",
            "Total successful per-withdrawal checks"
        );
        describe_counter!(
            "claim_monitor_check_failure_total",
            "Total failed per-withdrawal checks"
        );

        describe_counter!(
            "claim_monitor_withdrawals_proven_total",
            "Total number of withdrawals proven on L1"
        );
        describe_counter!(
            "claim_monitor_withdrawals_finalized_total",
            "Total number of withdrawals finalized on L1"
        );

        describe_gauge!(
            "claim_monitor_withdrawals",
            "Number of tracked withdrawals by lifecycle status"
        );
    }

    /// Record a completed tick.
    pub fn record_tick(&self, duration: Duration) {
        counter!("claim_monitor_ticks_total").increment(1);
        histogram!("claim_monitor_tick_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a successful per-withdrawal check.
    pub fn record_check_success(&self) {
        counter!("claim_monitor_check_success_total").increment(1);
    }

    /// Record a failed per-withdrawal check.
    pub fn record_check_failure(&self) {
        counter!("claim_monitor_check_failure_total").increment(1);
    }

    /// Record a withdrawal proven on L1.
    pub fn record_proven(&self) {
        counter!("claim_monitor_withdrawals_proven_total").increment(1);
    }

    /// Record a withdrawal finalized on L1.
    pub fn record_finalized(&self) {
        counter!("claim_monitor_withdrawals_finalized_total").increment(1);
    }

    /// Set the count of tracked withdrawals in a given lifecycle status.
    pub fn set_withdrawals(&self, status: &'static str, count: usize) {
        gauge!("claim_monitor_withdrawals", "status" => status).set(count as f64);
    }
}

/// Install the Prometheus metrics exporter and start the HTTP server.
///
/// Returns an error if the server fails to bind to the specified port.
pub fn install_prometheus_exporter(port: u16) -> eyre::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::net::SocketAddr;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| eyre::eyre!("Failed to install Prometheus exporter: {}", e))?;

    Ok(())
}
