//! Boundary to the external real-time communication engine.
//!
//! The engine (transport, codecs, NAT traversal) is a black box reached only
//! through [`EngineFacade`]. It reports back through an [`EngineEventSender`]
//! that enqueues into the session's event queue. The session actor serves that
//! queue and the command mailbox from one loop, so every state mutation
//! happens on the actor's turn.
//!
//! # Threading
//!
//! Native engines invoke their callbacks on engine-owned threads that are not
//! part of the tokio runtime. [`EngineEventSender::emit`] never blocks and
//! never awaits, so it can be called from any thread.
//!
//! # Modules
//!
//! - [`settings`] - encoding and audio parameters passed through verbatim
//! - [`loopback`] - in-process engine for local runs and tests

pub mod loopback;
pub mod settings;

use crate::observability::metrics;
use crate::registry::SurfaceHandle;

use common::types::ParticipantId;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

pub use loopback::LoopbackEngine;
pub use settings::{
    AudioProfile, AudioScenario, BitratePolicy, MediaSettings, OrientationPolicy, Resolution,
    VideoEncoding,
};

/// Failure reported by the engine, either as an immediate refusal of a
/// facade call or asynchronously through [`EngineEvent::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize)]
#[error("engine error code {code}")]
pub struct EngineError {
    /// Native engine error code.
    pub code: i32,
}

impl EngineError {
    #[must_use]
    pub const fn new(code: i32) -> Self {
        Self { code }
    }
}

/// Why a remote participant went offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflineReason {
    /// The remote left the channel.
    Quit,
    /// No packets received for too long.
    Dropped,
    /// The remote switched to audience role.
    BecameAudience,
    /// Code not known to this crate.
    Other(i32),
}

impl OfflineReason {
    /// Decode the engine's reason code.
    #[must_use]
    pub const fn from_code(code: i32) -> Self {
        match code {
            0 => OfflineReason::Quit,
            1 => OfflineReason::Dropped,
            2 => OfflineReason::BecameAudience,
            other => OfflineReason::Other(other),
        }
    }
}

/// Notifications emitted by the engine, in the order the engine produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The local user entered `channel` and was assigned `local_uid`.
    JoinSuccess { channel: String, local_uid: u32 },
    /// First video frames from a remote are about to be decoded.
    RemoteVideoStarting { participant_id: ParticipantId },
    /// A remote stopped sending video (it may resume later).
    RemoteVideoStopped { participant_id: ParticipantId },
    /// A remote left or was dropped.
    UserOffline {
        participant_id: ParticipantId,
        reason: OfflineReason,
    },
    /// Engine-side failure (join rejected, network unreachable, ...).
    Error(EngineError),
}

impl EngineEvent {
    /// Bounded label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            EngineEvent::JoinSuccess { .. } => "join_success",
            EngineEvent::RemoteVideoStarting { .. } => "remote_video_starting",
            EngineEvent::RemoteVideoStopped { .. } => "remote_video_stopped",
            EngineEvent::UserOffline { .. } => "user_offline",
            EngineEvent::Error(_) => "engine_error",
        }
    }
}

/// Capability interface of the real-time engine.
///
/// Every call is a request: completion, if any, arrives later as an
/// [`EngineEvent`]. An `Err` means the engine refused the request outright.
/// Implementations must not retry internally.
pub trait EngineFacade: Send {
    fn enable_video(&mut self) -> Result<(), EngineError>;

    fn start_preview(&mut self) -> Result<(), EngineError>;

    fn stop_preview(&mut self) -> Result<(), EngineError>;

    /// Ask to join `channel`. Success is reported by [`EngineEvent::JoinSuccess`].
    fn join_channel(&mut self, token: &str, channel: &str) -> Result<(), EngineError>;

    fn leave_channel(&mut self) -> Result<(), EngineError>;

    fn setup_local_video(&mut self, surface: SurfaceHandle) -> Result<(), EngineError>;

    fn setup_remote_video(
        &mut self,
        participant_id: ParticipantId,
        surface: SurfaceHandle,
    ) -> Result<(), EngineError>;

    fn mute_local_audio(&mut self, muted: bool) -> Result<(), EngineError>;

    fn switch_camera(&mut self) -> Result<(), EngineError>;

    fn configure_encoding(&mut self, encoding: &VideoEncoding) -> Result<(), EngineError>;

    fn configure_audio_profile(
        &mut self,
        profile: AudioProfile,
        scenario: AudioScenario,
    ) -> Result<(), EngineError>;

    /// Free native resources. Called at most once per engine.
    fn release(&mut self);
}

/// Handle an engine uses to report events into a session.
///
/// Cloneable and usable from any thread. Events travel on a queue of their
/// own, separate from the command mailbox, and are never dropped while the
/// session runs: a burst of commands cannot push out a `UserOffline` or a
/// `JoinSuccess`. The session drains queued events before it handles the
/// next command.
#[derive(Debug, Clone)]
pub struct EngineEventSender {
    sender: mpsc::UnboundedSender<EngineEvent>,
}

impl EngineEventSender {
    pub(crate) fn new(sender: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { sender }
    }

    /// Enqueue an event without blocking.
    ///
    /// Returns `false` only when the session is gone (event discarded, counted).
    pub fn emit(&self, event: EngineEvent) -> bool {
        match self.sender.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                debug!(
                    target: "call.engine",
                    event = event.kind(),
                    "Session closed, engine event discarded"
                );
                metrics::record_engine_event_dropped();
                false
            }
        }
    }

    /// Whether the receiving session has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
