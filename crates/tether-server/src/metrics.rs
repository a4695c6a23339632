//! Prometheus recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus recorder as the global `metrics` recorder.
///
/// Fails if another recorder is already installed.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format from the installed recorder.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// WebSocket connections accepted (counter).
pub const CONNECTIONS_TOTAL: &str = "tether_connections_total";
/// Currently open WebSocket connections (gauge).
pub const CONNECTIONS_ACTIVE: &str = "tether_connections_active";
/// Connection lifetime (histogram).
pub const CONNECTION_DURATION_SECONDS: &str = "tether_connection_duration_seconds";
/// Payloads appended to a pending queue (counter, labels: kind).
pub const MESSAGES_QUEUED_TOTAL: &str = "tether_messages_queued_total";
/// Payloads delivered from a pending queue (counter, labels: kind).
pub const MESSAGES_FLUSHED_TOTAL: &str = "tether_messages_flushed_total";
/// Inbound envelopes rejected (counter, labels: code).
pub const DISPATCH_ERRORS_TOTAL: &str = "tether_dispatch_errors_total";
