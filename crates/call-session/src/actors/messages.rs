//! Message types for the session actor.
//!
//! Commands travel on a bounded `tokio::sync::mpsc` mailbox and carry a
//! `tokio::sync::oneshot` reply for request-reply semantics. Engine events
//! travel on a separate queue (see [`EngineEventSender`](crate::engine::EngineEventSender)).

use crate::engine::EngineError;
use crate::errors::SessionError;
use crate::registry::{BindingKey, RenderBinding};

use common::secret::SecretString;
use common::types::{ParticipantId, SessionId};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, oneshot, watch};
use tracing::debug;

/// Call lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    Idle,
    Previewing,
    Joining,
    InCall,
    Ending,
}

impl CallState {
    /// Returns the state as a string for logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            CallState::Idle => "idle",
            CallState::Previewing => "previewing",
            CallState::Joining => "joining",
            CallState::InCall => "in_call",
            CallState::Ending => "ending",
        }
    }

    /// Whether a join request has been issued to the engine.
    #[must_use]
    pub const fn has_joined(&self) -> bool {
        matches!(
            self,
            CallState::Joining | CallState::InCall | CallState::Ending
        )
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which camera the local preview uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraFacing {
    #[default]
    Front,
    Back,
}

impl CameraFacing {
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            CameraFacing::Front => CameraFacing::Back,
            CameraFacing::Back => CameraFacing::Front,
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            CameraFacing::Front => "front",
            CameraFacing::Back => "back",
        }
    }
}

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallSnapshot {
    pub session_id: SessionId,
    pub state: CallState,
    /// Last commanded mute preference (not confirmed by the engine).
    pub muted: bool,
    /// Last commanded camera (not confirmed by the engine).
    pub camera: CameraFacing,
    /// Channel requested or joined; `None` outside `Joining`/`InCall`.
    pub channel: Option<String>,
    /// Engine-assigned local uid once the join succeeded.
    pub local_uid: Option<u32>,
    /// Live render bindings, sorted by key.
    pub bindings: Vec<RenderBinding>,
    /// The session has been destroyed; no further updates follow.
    pub terminated: bool,
}

impl CallSnapshot {
    /// Snapshot of a freshly constructed session.
    #[must_use]
    pub fn initial(session_id: SessionId) -> Self {
        Self {
            session_id,
            state: CallState::Idle,
            muted: false,
            camera: CameraFacing::Front,
            channel: None,
            local_uid: None,
            bindings: Vec::new(),
            terminated: false,
        }
    }

    /// Remote participants with a bound surface.
    #[must_use]
    pub fn participants(&self) -> BTreeSet<ParticipantId> {
        self.bindings
            .iter()
            .filter_map(|binding| match binding.key {
                BindingKey::Remote(id) => Some(id),
                BindingKey::Local => None,
            })
            .collect()
    }

    /// Whether the local preview surface is bound.
    #[must_use]
    pub fn has_local(&self) -> bool {
        self.bindings
            .iter()
            .any(|binding| binding.key == BindingKey::Local)
    }

    #[must_use]
    pub fn is_bound(&self, key: impl Into<BindingKey>) -> bool {
        let key = key.into();
        self.bindings.iter().any(|binding| binding.key == key)
    }
}

/// Engine-sourced problem, delivered on the update stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionNotice {
    /// State the session was in when the problem was reported.
    pub state: CallState,
    pub error: EngineError,
    /// Unix timestamp (seconds).
    pub at: i64,
}

/// One item of the update stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SessionUpdate {
    /// Session state changed.
    State(CallSnapshot),
    /// Surfaces the presentation layer must release, in release order.
    SurfacesReleased(Vec<RenderBinding>),
    /// Problem occurred; state unchanged unless a `State` update follows.
    Notice(SessionNotice),
}

/// Receiver side of a subscription.
///
/// Yields the snapshot current at subscription time first, then every later
/// update. A receiver that falls behind gets the latest snapshot in place of
/// the updates it missed.
#[derive(Debug)]
pub struct SessionUpdates {
    current: Option<CallSnapshot>,
    receiver: broadcast::Receiver<SessionUpdate>,
    latest: watch::Receiver<CallSnapshot>,
}

impl SessionUpdates {
    pub(crate) fn new(
        current: CallSnapshot,
        receiver: broadcast::Receiver<SessionUpdate>,
        latest: watch::Receiver<CallSnapshot>,
    ) -> Self {
        Self {
            current: Some(current),
            receiver,
            latest,
        }
    }

    /// Next update, or `None` once the session has stopped and every
    /// buffered update was delivered.
    pub async fn recv(&mut self) -> Option<SessionUpdate> {
        if let Some(snapshot) = self.current.take() {
            return Some(SessionUpdate::State(snapshot));
        }

        match self.receiver.recv().await {
            Ok(update) => Some(update),
            Err(RecvError::Lagged(missed)) => {
                debug!(
                    target: "call.actor.session",
                    missed,
                    "Update subscriber lagged, resyncing from latest snapshot"
                );
                Some(SessionUpdate::State(self.latest.borrow().clone()))
            }
            Err(RecvError::Closed) => None,
        }
    }
}

/// Local user intent.
#[derive(Debug)]
pub enum SessionCommand {
    Preview,
    Join {
        channel: String,
        token: SecretString,
    },
    EndCall,
    Mute,
    Unmute,
    SwitchCamera,
}

impl SessionCommand {
    /// Returns the command name for logs and metric labels.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            SessionCommand::Preview => "preview",
            SessionCommand::Join { .. } => "join",
            SessionCommand::EndCall => "end_call",
            SessionCommand::Mute => "mute",
            SessionCommand::Unmute => "unmute",
            SessionCommand::SwitchCamera => "switch_camera",
        }
    }
}

/// Messages sent to `CallSessionActor`.
#[derive(Debug)]
pub enum SessionMessage {
    /// A local command.
    Command {
        command: SessionCommand,
        /// Response channel for acceptance or rejection.
        respond_to: oneshot::Sender<Result<(), SessionError>>,
    },

    /// Tear down, release the engine and stop the actor.
    Destroy {
        /// Response channel for confirmation.
        respond_to: oneshot::Sender<()>,
    },

    /// Get the current snapshot.
    GetState {
        respond_to: oneshot::Sender<CallSnapshot>,
    },

    /// Open an update subscription positioned at the current snapshot.
    Subscribe {
        respond_to: oneshot::Sender<SessionUpdates>,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::registry::SurfaceHandle;

    #[test]
    fn test_call_state_labels() {
        assert_eq!(CallState::InCall.as_str(), "in_call");
        assert_eq!(CallState::Previewing.to_string(), "previewing");
        assert!(CallState::Joining.has_joined());
        assert!(!CallState::Previewing.has_joined());
    }

    #[test]
    fn test_camera_flip() {
        assert_eq!(CameraFacing::default(), CameraFacing::Front);
        assert_eq!(CameraFacing::Front.flipped(), CameraFacing::Back);
        assert_eq!(CameraFacing::Back.flipped(), CameraFacing::Front);
    }

    #[test]
    fn test_initial_snapshot() {
        let snapshot = CallSnapshot::initial(SessionId::new());
        assert_eq!(snapshot.state, CallState::Idle);
        assert!(!snapshot.muted);
        assert_eq!(snapshot.camera, CameraFacing::Front);
        assert!(snapshot.bindings.is_empty());
        assert!(!snapshot.terminated);
    }

    #[test]
    fn test_command_debug_redacts_token() {
        let command = SessionCommand::Join {
            channel: "room1".to_string(),
            token: SecretString::from("006secret"),
        };
        let debug = format!("{command:?}");
        assert!(debug.contains("room1"));
        assert!(!debug.contains("006secret"));
        assert_eq!(command.name(), "join");
    }

    #[tokio::test]
    async fn test_updates_yield_current_snapshot_first() {
        let snapshot = CallSnapshot::initial(SessionId::new());
        let (updates_tx, updates_rx) = broadcast::channel(4);
        let (_state_tx, state_rx) = watch::channel(snapshot.clone());
        let mut updates = SessionUpdates::new(snapshot.clone(), updates_rx, state_rx);

        updates_tx
            .send(SessionUpdate::SurfacesReleased(Vec::new()))
            .unwrap();

        assert_eq!(updates.recv().await, Some(SessionUpdate::State(snapshot)));
        assert_eq!(
            updates.recv().await,
            Some(SessionUpdate::SurfacesReleased(Vec::new()))
        );

        drop(updates_tx);
        assert_eq!(updates.recv().await, None);
    }

    #[tokio::test]
    async fn test_lagged_subscriber_gets_latest_snapshot() {
        let initial = CallSnapshot::initial(SessionId::new());
        let (updates_tx, updates_rx) = broadcast::channel(2);
        let (state_tx, state_rx) = watch::channel(initial.clone());
        let mut updates = SessionUpdates::new(initial.clone(), updates_rx, state_rx);
        assert!(matches!(updates.recv().await, Some(SessionUpdate::State(_))));

        for code in 0..5 {
            updates_tx
                .send(SessionUpdate::Notice(SessionNotice {
                    state: CallState::InCall,
                    error: EngineError::new(code),
                    at: 0,
                }))
                .unwrap();
        }
        let mut latest = initial;
        latest.state = CallState::InCall;
        state_tx.send_replace(latest.clone());

        match updates.recv().await {
            Some(SessionUpdate::State(snapshot)) => assert_eq!(snapshot, latest),
            other => panic!("expected resync snapshot, got {other:?}"),
        }
    }

    #[test]
    fn test_snapshot_participants_exclude_local() {
        let mut snapshot = CallSnapshot::initial(SessionId::new());
        let mut registry = crate::registry::RenderSurfaceRegistry::new();
        registry.bind(BindingKey::Local);
        registry.bind(ParticipantId(42));
        snapshot.bindings = registry.bindings();

        assert!(snapshot.has_local());
        assert!(snapshot.is_bound(ParticipantId(42)));
        assert_eq!(
            snapshot.participants().into_iter().collect::<Vec<_>>(),
            vec![ParticipantId(42)]
        );
        let handles: Vec<SurfaceHandle> = snapshot.bindings.iter().map(|b| b.handle).collect();
        assert_eq!(handles.len(), 2);
    }
}
