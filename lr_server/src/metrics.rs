//! Prometheus metrics for the ranking server.
//!
//! Metrics are exposed in Prometheus text format on the address given by
//! `METRICS_BIND`. Without an installed exporter every call below is a no-op.
//!
//! # Metrics Categories
//!
//! - **Calculation Metrics**: recomputations by trigger and status, duration
//! - **Broadcast Metrics**: delivered, failed and abandoned live updates
//! - **WebSocket Metrics**: active and denied live connections
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use lr_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::calculations_total("manual", "succeeded");
//! metrics::websocket_connections_active(10);
//! ```

use live_ranking::broadcast::SweepReport;
use live_ranking::ranking::AutoCalculationReport;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// Calculation Metrics
// ============================================================================

/// Count one calculation attempt.
pub fn calculations_total(trigger: &str, status: &str) {
    metrics::counter!("ranking_calculations_total",
        "trigger" => trigger.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record calculation duration in milliseconds.
pub fn calculation_duration_ms(trigger: &str, duration_ms: f64) {
    metrics::histogram!("ranking_calculation_duration_ms",
        "trigger" => trigger.to_string()
    )
    .record(duration_ms);
}

/// Record position changes detected by one calculation.
pub fn position_changes(count: usize) {
    metrics::counter!("ranking_position_changes_total").increment(count as u64);
}

/// Record the result of one auto-calculation sweep.
pub fn auto_calculation_sweep(report: &AutoCalculationReport) {
    metrics::counter!("ranking_calculations_total",
        "trigger" => "auto",
        "status" => "succeeded"
    )
    .increment(report.recomputed as u64);
    metrics::counter!("ranking_calculations_total",
        "trigger" => "auto",
        "status" => "failed"
    )
    .increment(report.failed as u64);
}

// ============================================================================
// Broadcast Metrics
// ============================================================================

/// Record the result of one pending-update sweep.
pub fn broadcast_sweep(report: &SweepReport) {
    metrics::counter!("broadcast_updates_delivered_total").increment(report.delivered as u64);
    metrics::counter!("broadcast_updates_failed_total").increment(report.failed as u64);
    metrics::gauge!("broadcast_updates_abandoned").set(report.abandoned as f64);
}

// ============================================================================
// WebSocket Metrics
// ============================================================================

/// Set current active live connection count.
pub fn websocket_connections_active(count: usize) {
    metrics::gauge!("websocket_connections_active").set(count as f64);
}

/// Count a live connection refused by the access rules.
pub fn websocket_connections_denied() {
    metrics::counter!("websocket_connections_denied_total").increment(1);
}

/// Count messages received on live connections.
pub fn websocket_messages_received() {
    metrics::counter!("websocket_messages_received_total").increment(1);
}
