//! Metrics collection and export for roomcast.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use roomcast_core::{CloseReason, SessionSummary};
use std::net::SocketAddr;
use tracing::info;

/// Metric names.
pub mod names {
    pub const ROOMS_CREATED_TOTAL: &str = "roomcast_rooms_created_total";
    pub const ROOMS_ACTIVE: &str = "roomcast_rooms_active";
    pub const ROOMS_REAPED_TOTAL: &str = "roomcast_rooms_reaped_total";
    pub const SESSIONS_TOTAL: &str = "roomcast_sessions_total";
    pub const SESSIONS_ACTIVE: &str = "roomcast_sessions_active";
    pub const SESSIONS_CLOSED_TOTAL: &str = "roomcast_sessions_closed_total";
    pub const MESSAGES_TOTAL: &str = "roomcast_messages_total";
    pub const DELIVERIES_TOTAL: &str = "roomcast_deliveries_total";
    pub const ERRORS_TOTAL: &str = "roomcast_errors_total";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(names::ROOMS_CREATED_TOTAL, "Total number of rooms created");
    metrics::describe_gauge!(names::ROOMS_ACTIVE, "Current number of rooms");
    metrics::describe_counter!(
        names::ROOMS_REAPED_TOTAL,
        "Rooms removed because nobody joined them in time"
    );
    metrics::describe_counter!(names::SESSIONS_TOTAL, "Total number of room sessions");
    metrics::describe_gauge!(names::SESSIONS_ACTIVE, "Current number of room sessions");
    metrics::describe_counter!(
        names::SESSIONS_CLOSED_TOTAL,
        "Finished sessions, labelled by close reason"
    );
    metrics::describe_counter!(names::MESSAGES_TOTAL, "Inbound messages processed");
    metrics::describe_counter!(
        names::DELIVERIES_TOTAL,
        "Outbound deliveries, labelled by result"
    );
    metrics::describe_counter!(names::ERRORS_TOTAL, "Total number of errors");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a created room.
pub fn record_room_created() {
    counter!(names::ROOMS_CREATED_TOTAL).increment(1);
}

/// Record rooms removed by the reaper.
pub fn record_rooms_reaped(count: usize) {
    counter!(names::ROOMS_REAPED_TOTAL).increment(count as u64);
}

/// Update the active room count.
pub fn set_active_rooms(count: usize) {
    gauge!(names::ROOMS_ACTIVE).set(count as f64);
}

/// Record a finished session.
pub fn record_session(summary: &SessionSummary) {
    let reason = match summary.reason {
        CloseReason::ClientClosed => "client_closed",
        CloseReason::Malformed => "malformed",
        CloseReason::Timeout => "timeout",
        CloseReason::TransportError => "transport_error",
    };
    counter!(names::SESSIONS_CLOSED_TOTAL, "reason" => reason).increment(1);
    counter!(names::MESSAGES_TOTAL).increment(summary.messages);
    counter!(names::DELIVERIES_TOTAL, "result" => "delivered")
        .increment(summary.deliveries.delivered as u64);
    counter!(names::DELIVERIES_TOTAL, "result" => "failed")
        .increment(summary.deliveries.failed as u64);
}

/// Record an error.
pub fn record_error(error_type: &str) {
    counter!(names::ERRORS_TOTAL, "type" => error_type.to_string()).increment(1);
}

/// Metrics guard that tracks one session's lifetime.
pub struct SessionMetricsGuard;

impl SessionMetricsGuard {
    /// Create a new metrics guard, recording a session start.
    #[must_use]
    pub fn new() -> Self {
        counter!(names::SESSIONS_TOTAL).increment(1);
        gauge!(names::SESSIONS_ACTIVE).increment(1.0);
        Self
    }
}

impl Default for SessionMetricsGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SessionMetricsGuard {
    fn drop(&mut self) {
        gauge!(names::SESSIONS_ACTIVE).decrement(1.0);
    }
}
