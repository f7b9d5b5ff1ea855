//! Observability for the call session controller.
//!
//! # Privacy by Default
//!
//! The actor run loop uses `#[instrument(skip_all)]` with an explicit
//! `session_id` field. Channel tokens are `SecretString` and never reach a
//! span or event. Metric labels are bounded enums.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `call_state_transitions_total` | Counter | `from`, `to` | State machine activity |
//! | `call_commands_total` | Counter | `command`, `outcome` | Command acceptance and rejection |
//! | `call_command_duration_seconds` | Histogram | `command` | Time spent handling a command |
//! | `call_engine_errors_total` | Counter | `state` | Engine-reported failures |
//! | `call_engine_events_dropped_total` | Counter | none | Events emitted after the session stopped |
//! | `call_stale_events_total` | Counter | `event` | Events ignored after teardown or for a stale join |
//! | `call_bound_surfaces` | Gauge | none | Live render surfaces |
//! | `call_mailbox_depth` | Gauge | none | Backpressure indicator |

pub mod metrics;

pub use metrics::init_metrics_recorder;
