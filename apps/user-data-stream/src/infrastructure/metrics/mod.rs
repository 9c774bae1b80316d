//! Prometheus Metrics Module
//!
//! Metric recording helpers for the user data stream. Recording goes through
//! the `metrics` facade and is a no-op until a recorder is installed, so the
//! library stays silent unless the host application opts in with
//! [`init_metrics`].
//!
//! # Metrics
//!
//! - `user_stream_frames_received_total{class}`: inbound frames by class
//! - `user_stream_requests_sent_total{kind}`: `REQUEST` frames written
//! - `user_stream_errors_total{kind}`: errors delivered to the error handler
//! - `user_stream_pending_requests`: correlation entries awaiting a response
//! - `user_stream_sessions_terminated_total{reason}`: session terminations
//! - `user_stream_request_latency_seconds{kind}`: request round-trip time

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder, once per process.
///
/// # Errors
///
/// Returns an error if another recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

fn register_metrics() {
    describe_counter!(
        "user_stream_frames_received_total",
        "Inbound user data stream frames by class"
    );
    describe_counter!(
        "user_stream_requests_sent_total",
        "REQUEST frames written to the user data stream"
    );
    describe_counter!(
        "user_stream_errors_total",
        "Errors delivered to the stream error handler"
    );
    describe_gauge!(
        "user_stream_pending_requests",
        "Requests awaiting a correlated response"
    );
    describe_counter!(
        "user_stream_sessions_terminated_total",
        "User data stream sessions terminated by reason"
    );
    describe_histogram!(
        "user_stream_request_latency_seconds",
        "Time from REQUEST write to correlated response"
    );
}

/// Record an inbound frame.
pub fn record_frame_received(class: &'static str) {
    counter!("user_stream_frames_received_total", "class" => class).increment(1);
}

/// Record a `REQUEST` written to the socket.
pub fn record_request_sent(kind: &'static str) {
    counter!("user_stream_requests_sent_total", "kind" => kind).increment(1);
}

/// Record an error delivered to the error handler.
pub fn record_error(kind: &'static str) {
    counter!("user_stream_errors_total", "kind" => kind).increment(1);
}

/// Update the pending request gauge.
#[allow(clippy::cast_precision_loss)]
pub fn set_pending_requests(count: usize) {
    gauge!("user_stream_pending_requests").set(count as f64);
}

/// Record a session termination.
pub fn record_session_terminated(reason: &'static str) {
    counter!("user_stream_sessions_terminated_total", "reason" => reason).increment(1);
}

/// Record the round-trip time of a completed request.
pub fn record_request_latency(kind: &'static str, latency: Duration) {
    histogram!("user_stream_request_latency_seconds", "kind" => kind)
        .record(latency.as_secs_f64());
}
