//! Metrics definitions for the call session controller.
//!
//! All metrics follow Prometheus naming conventions:
//! - `call_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded enums rendered with `as_str()`:
//! - `from`, `to`, `state`: 5 call states
//! - `command`: 7 commands (including destroy)
//! - `outcome`: 4 outcomes (ok, invalid_state, invalid_argument, engine_error)
//! - `event`: 5 engine event kinds
//!
//! Participant ids and channel names never appear in labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

/// Install the Prometheus recorder and start its HTTP listener on `bind_address`.
///
/// Must be called from within a tokio runtime, before any metric is recorded.
///
/// # Errors
///
/// Returns error if the bucket configuration is rejected or a global
/// recorder is already installed.
pub fn init_metrics_recorder(bind_address: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(bind_address)
        // Command handling is in-process bookkeeping plus a non-blocking engine call
        .set_buckets_for_metric(
            Matcher::Full("call_command_duration_seconds".to_string()),
            &[
                0.0001, 0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250,
            ],
        )
        .map_err(|e| format!("Failed to set command duration buckets: {e}"))?
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))
}

// ============================================================================
// State Machine Metrics (Counters)
// ============================================================================

/// Record a call state transition.
///
/// Metric: `call_state_transitions_total`
/// Labels: `from`, `to`
///
/// Cardinality: 25 at most (5 x 5 states), about 8 reachable
pub fn record_state_transition(from: &'static str, to: &'static str) {
    counter!("call_state_transitions_total", "from" => from, "to" => to).increment(1);
}

/// Record a command handled by the session actor.
///
/// Metric: `call_commands_total`, `call_command_duration_seconds`
/// Labels: `command`, `outcome` (counter); `command` (histogram)
pub fn record_command(command: &'static str, outcome: &'static str, duration: Duration) {
    counter!("call_commands_total", "command" => command, "outcome" => outcome).increment(1);
    histogram!("call_command_duration_seconds", "command" => command)
        .record(duration.as_secs_f64());
}

/// Record an engine-reported error.
///
/// Metric: `call_engine_errors_total`
/// Labels: `state` (state the session was in when the error arrived)
pub fn record_engine_error(state: &'static str) {
    counter!("call_engine_errors_total", "state" => state).increment(1);
}

/// Record an engine event discarded because the session had already stopped.
///
/// Metric: `call_engine_events_dropped_total`
/// Labels: none
pub fn record_engine_event_dropped() {
    counter!("call_engine_events_dropped_total").increment(1);
}

/// Record an engine event ignored because the session was not in a state to act on it.
///
/// Metric: `call_stale_events_total`
/// Labels: `event`
pub fn record_stale_event(event: &'static str) {
    counter!("call_stale_events_total", "event" => event).increment(1);
}

// ============================================================================
// Resource Metrics (Gauges)
// ============================================================================

/// Set the number of bound render surfaces (local preview included).
///
/// Metric: `call_bound_surfaces`
/// Labels: none
pub fn set_bound_surfaces(count: usize) {
    // usize to f64 conversion is safe for realistic surface counts
    #[allow(clippy::cast_precision_loss)]
    gauge!("call_bound_surfaces").set(count as f64);
}

/// Set the session actor mailbox depth.
///
/// Metric: `call_mailbox_depth`
/// Labels: none
pub fn set_mailbox_depth(depth: usize) {
    // usize to f64 conversion is safe for realistic mailbox depths
    #[allow(clippy::cast_precision_loss)]
    gauge!("call_mailbox_depth").set(depth as f64);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    // These run against the global no-op recorder; they only exercise the
    // recording paths.

    #[test]
    fn test_record_state_transition() {
        record_state_transition("idle", "previewing");
        record_state_transition("previewing", "joining");
        record_state_transition("joining", "in_call");
        record_state_transition("in_call", "ending");
        record_state_transition("ending", "idle");
    }

    #[test]
    fn test_record_command() {
        record_command("preview", "ok", Duration::from_micros(80));
        record_command("mute", "invalid_state", Duration::from_micros(5));
        record_command("join", "invalid_argument", Duration::from_micros(3));
        record_command("switch_camera", "engine_error", Duration::from_micros(40));
    }

    #[test]
    fn test_gauges() {
        set_bound_surfaces(0);
        set_bound_surfaces(3);
        set_mailbox_depth(0);
        set_mailbox_depth(200);
    }

    #[test]
    fn test_recorded_values_with_local_recorder() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();

        metrics::with_local_recorder(&recorder, || {
            record_engine_error("joining");
            record_engine_error("joining");
            record_engine_event_dropped();
            record_stale_event("join_success");
            set_bound_surfaces(2);
        });

        let snapshot = snapshotter.snapshot().into_vec();

        let engine_errors = snapshot
            .iter()
            .find(|(key, _, _, _)| key.key().name() == "call_engine_errors_total")
            .expect("engine error counter recorded");
        assert_eq!(engine_errors.3, DebugValue::Counter(2));

        let surfaces = snapshot
            .iter()
            .find(|(key, _, _, _)| key.key().name() == "call_bound_surfaces")
            .expect("surface gauge recorded");
        assert_eq!(surfaces.3, DebugValue::Gauge(2.0.into()));

        assert!(snapshot
            .iter()
            .any(|(key, _, _, _)| key.key().name() == "call_engine_events_dropped_total"));
        assert!(snapshot
            .iter()
            .any(|(key, _, _, _)| key.key().name() == "call_stale_events_total"));
    }
}
