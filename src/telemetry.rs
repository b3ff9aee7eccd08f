//! Relay metrics registration and export
//!
//! # Metrics
//!
//! - `eventrelay_messages_total`: Counter of handled messages, labeled by
//!   `outcome` (`inserted`, `ignored`, `invalid`)
//! - `eventrelay_poll_errors_total`: Counter of failed consumer polls
//!
//! The counters are incremented by the relay loop through the constants
//! below. Without an installed recorder the increments are no-ops.

use metrics::describe_counter;

/// Counter of handled messages by outcome
pub const MESSAGES_TOTAL: &str = "eventrelay_messages_total";

/// Counter of failed consumer polls
pub const POLL_ERRORS_TOTAL: &str = "eventrelay_poll_errors_total";

/// Registers descriptions for every relay metric with the installed recorder
pub fn describe_metrics() {
    describe_counter!(
        MESSAGES_TOTAL,
        "Messages handled by the relay, labeled by outcome"
    );
    describe_counter!(POLL_ERRORS_TOTAL, "Consumer polls that returned an error");
}

/// Initialize metrics exporter (if enabled)
///
/// When the `prometheus` feature is enabled this installs the Prometheus
/// exporter with its default listener. Otherwise it is a no-op that is
/// still safe to call.
///
/// # Examples
///
/// ```
/// use eventrelay::telemetry::init_metrics_exporter;
///
/// init_metrics_exporter();
/// ```
pub fn init_metrics_exporter() {
    #[cfg(feature = "prometheus")]
    {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let _ = builder.install().map_err(|e| {
            tracing::warn!("Failed to install Prometheus exporter: {}", e);
        });
    }
    describe_metrics();
}
