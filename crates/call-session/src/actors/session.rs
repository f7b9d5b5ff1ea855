//! `CallSessionActor` - single-writer owner of one call session.
//!
//! The actor owns the call state, the render surface registry, the optimistic
//! mute and camera preferences and the engine. Local commands (through
//! [`CallSessionHandle`]) arrive on a bounded mailbox and engine events
//! (through [`EngineEventSender`](crate::engine::EngineEventSender)) on an
//! unbounded queue. One loop serves both, one message at a time, so no two
//! transitions race. Queued engine events are handled before the next
//! command, so a command observes every event emitted before it was sent.
//!
//! # Teardown
//!
//! `end_call()` and `destroy()` tear down within a single turn:
//! 1. State becomes `Ending`
//! 2. All render bindings are released, newest first
//! 3. The engine leaves the channel (when a join was issued) and stops the preview
//! 4. State becomes `Idle`
//!
//! Engine events still queued behind a teardown find the session `Idle` and
//! are ignored. `destroy()` additionally releases the engine and stops the
//! actor; cancellation and dropping every handle do the same.

use crate::engine::{
    EngineError, EngineEvent, EngineEventSender, EngineFacade, MediaSettings, OfflineReason,
};
use crate::errors::SessionError;
use crate::observability::metrics;
use crate::registry::{BindingKey, RenderBinding, RenderSurfaceRegistry};

use super::messages::{
    CallSnapshot, CallState, CameraFacing, SessionCommand, SessionMessage, SessionNotice,
    SessionUpdate, SessionUpdates,
};
use super::metrics::MailboxMonitor;

use common::secret::{self, ExposeSecret, SecretString};
use common::types::{ParticipantId, SessionId};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default channel buffer size for the session mailbox.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Buffered updates per subscriber before it is considered lagging.
const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Construction parameters for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Passed through verbatim to the engine when the preview starts.
    pub media: MediaSettings,
    pub mailbox_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            media: MediaSettings::default(),
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

/// Handle to a `CallSessionActor`.
#[derive(Clone, Debug)]
pub struct CallSessionHandle {
    sender: mpsc::Sender<SessionMessage>,
    cancel_token: CancellationToken,
    state: watch::Receiver<CallSnapshot>,
    session_id: SessionId,
}

impl CallSessionHandle {
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Start the local camera preview. Valid in `Idle`.
    pub async fn preview(&self) -> Result<(), SessionError> {
        self.command(SessionCommand::Preview).await
    }

    /// Join `channel` with `token`.
    ///
    /// Valid in `Previewing`, and in `Idle` where the preview is started
    /// first. Success means the request was issued; the move to `InCall`
    /// follows when the engine reports the join.
    pub async fn join(
        &self,
        channel: impl Into<String>,
        token: SecretString,
    ) -> Result<(), SessionError> {
        self.command(SessionCommand::Join {
            channel: channel.into(),
            token,
        })
        .await
    }

    /// Hang up. Valid in `Previewing`, `Joining` and `InCall`.
    pub async fn end_call(&self) -> Result<(), SessionError> {
        self.command(SessionCommand::EndCall).await
    }

    /// Toggle the local microphone. Valid in `InCall`.
    pub async fn mute(&self) -> Result<(), SessionError> {
        self.command(SessionCommand::Mute).await
    }

    /// Turn the local microphone back on. Valid in `InCall`.
    pub async fn unmute(&self) -> Result<(), SessionError> {
        self.command(SessionCommand::Unmute).await
    }

    /// Switch between front and back camera. Valid in `InCall`.
    pub async fn switch_camera(&self) -> Result<(), SessionError> {
        self.command(SessionCommand::SwitchCamera).await
    }

    /// Tear down, release the engine and stop the session.
    ///
    /// Idempotent: returns `Ok(())` when the session is already gone.
    pub async fn destroy(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(SessionMessage::Destroy { respond_to: tx })
            .await
            .is_err()
        {
            debug!(
                target: "call.actor.session",
                session_id = %self.session_id,
                "destroy on stopped session"
            );
            return Ok(());
        }

        // A dropped reply means the actor stopped before reaching this message.
        let _ = rx.await;
        Ok(())
    }

    /// Current snapshot, ordered after every message queued before this call.
    pub async fn get_state(&self) -> Result<CallSnapshot, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionMessage::GetState { respond_to: tx })
            .await
            .map_err(|_| SessionError::Closed)?;

        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Subscribe to state changes, released surfaces and engine notices.
    pub async fn subscribe(&self) -> Result<SessionUpdates, SessionError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionMessage::Subscribe { respond_to: tx })
            .await
            .map_err(|_| SessionError::Closed)?;

        rx.await.map_err(|_| SessionError::Closed)
    }

    /// Latest-value view of the session state.
    ///
    /// Keeps the final snapshot readable after the session stops.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<CallSnapshot> {
        self.state.clone()
    }

    /// Cancel the session (same teardown as `destroy()`).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Whether the actor has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn command(&self, command: SessionCommand) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SessionMessage::Command {
                command,
                respond_to: tx,
            })
            .await
            .map_err(|_| SessionError::Closed)?;

        rx.await.map_err(|_| SessionError::Closed)?
    }
}

/// Owned engine slot. The engine is released exactly once: explicitly on
/// destroy, or on drop if the actor never got that far.
struct EngineSlot {
    engine: Option<Box<dyn EngineFacade>>,
}

impl EngineSlot {
    fn new(engine: Box<dyn EngineFacade>) -> Self {
        Self {
            engine: Some(engine),
        }
    }

    fn call(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut dyn EngineFacade) -> Result<(), EngineError>,
    ) -> Result<(), EngineError> {
        let Some(engine) = self.engine.as_deref_mut() else {
            debug!(target: "call.actor.session", operation, "Engine released, call skipped");
            return Ok(());
        };

        f(engine).inspect_err(|error| {
            warn!(
                target: "call.actor.session",
                operation,
                code = error.code,
                "Engine refused request"
            );
        })
    }

    /// Returns true if this call released the engine.
    fn release(&mut self) -> bool {
        match self.engine.take() {
            Some(mut engine) => {
                engine.release();
                true
            }
            None => false,
        }
    }
}

impl Drop for EngineSlot {
    fn drop(&mut self) {
        if self.release() {
            warn!(
                target: "call.actor.session",
                "Engine released on drop without destroy"
            );
        }
    }
}

/// The call session actor.
pub struct CallSessionActor {
    session_id: SessionId,
    receiver: mpsc::Receiver<SessionMessage>,
    events: mpsc::UnboundedReceiver<EngineEvent>,
    /// Keeps the event queue open for the actor's lifetime.
    _events_tx: mpsc::UnboundedSender<EngineEvent>,
    cancel_token: CancellationToken,
    engine: EngineSlot,
    media: MediaSettings,
    registry: RenderSurfaceRegistry,
    state: CallState,
    muted: bool,
    camera: CameraFacing,
    /// Channel of the join in progress or completed.
    channel: Option<String>,
    local_uid: Option<u32>,
    terminated: bool,
    state_tx: watch::Sender<CallSnapshot>,
    updates_tx: broadcast::Sender<SessionUpdate>,
    mailbox: MailboxMonitor,
}

impl CallSessionActor {
    /// Spawn a new session actor.
    ///
    /// `make_engine` receives the sender the engine must use for its events.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn<E, F>(
        settings: SessionSettings,
        cancel_token: CancellationToken,
        make_engine: F,
    ) -> (CallSessionHandle, JoinHandle<()>)
    where
        E: EngineFacade + 'static,
        F: FnOnce(EngineEventSender) -> E,
    {
        let session_id = SessionId::new();
        let (sender, receiver) = mpsc::channel(settings.mailbox_capacity.max(1));
        let (events_tx, events) = mpsc::unbounded_channel();
        let engine = make_engine(EngineEventSender::new(events_tx.clone()));

        let initial = CallSnapshot::initial(session_id);
        let (state_tx, state_rx) = watch::channel(initial);
        let (updates_tx, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

        let actor = Self {
            session_id,
            receiver,
            events,
            _events_tx: events_tx,
            cancel_token: cancel_token.clone(),
            engine: EngineSlot::new(Box::new(engine)),
            media: settings.media,
            registry: RenderSurfaceRegistry::new(),
            state: CallState::Idle,
            muted: false,
            camera: CameraFacing::Front,
            channel: None,
            local_uid: None,
            terminated: false,
            state_tx,
            updates_tx,
            mailbox: MailboxMonitor::new(session_id.to_string()),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = CallSessionHandle {
            sender,
            cancel_token,
            state: state_rx,
            session_id,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "call.actor.session", fields(session_id = %self.session_id))]
    async fn run(mut self) {
        info!(
            target: "call.actor.session",
            session_id = %self.session_id,
            "CallSessionActor started"
        );

        loop {
            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "call.actor.session",
                        session_id = %self.session_id,
                        "CallSessionActor received cancellation signal"
                    );
                    self.shutdown("cancelled");
                    break;
                }

                Some(event) = self.events.recv() => {
                    self.mailbox.record_depth(self.queue_depth());
                    self.handle_engine_event(event);
                    self.mailbox.record_processed();
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.mailbox.record_depth(self.queue_depth());
                            let keep_running = self.handle_message(message);
                            self.mailbox.record_processed();
                            if !keep_running {
                                break;
                            }
                        }
                        None => {
                            info!(
                                target: "call.actor.session",
                                session_id = %self.session_id,
                                "All handles dropped, shutting down"
                            );
                            self.shutdown("handles_dropped");
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "call.actor.session",
            session_id = %self.session_id,
            messages_processed = self.mailbox.messages_processed(),
            peak_mailbox_depth = self.mailbox.peak_depth(),
            "CallSessionActor stopped"
        );
    }

    fn queue_depth(&self) -> usize {
        self.receiver.len() + self.events.len()
    }

    /// Handle a single message. Returns false when the actor must stop.
    fn handle_message(&mut self, message: SessionMessage) -> bool {
        match message {
            SessionMessage::Command {
                command,
                respond_to,
            } => {
                let name = command.name();
                let started = Instant::now();
                let result = self.handle_command(command);
                metrics::record_command(name, command_outcome(&result), started.elapsed());

                if let Err(error) = &result {
                    debug!(
                        target: "call.actor.session",
                        session_id = %self.session_id,
                        command = name,
                        error = %error,
                        "Command rejected"
                    );
                }
                let _ = respond_to.send(result);
                true
            }

            SessionMessage::Destroy { respond_to } => {
                let started = Instant::now();
                self.shutdown("destroy");
                metrics::record_command("destroy", "ok", started.elapsed());
                let _ = respond_to.send(());
                false
            }

            SessionMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.snapshot());
                true
            }

            SessionMessage::Subscribe { respond_to } => {
                let updates = SessionUpdates::new(
                    self.snapshot(),
                    self.updates_tx.subscribe(),
                    self.state_tx.subscribe(),
                );
                let _ = respond_to.send(updates);
                true
            }
        }
    }

    fn handle_command(&mut self, command: SessionCommand) -> Result<(), SessionError> {
        match command {
            SessionCommand::Preview => {
                self.ensure_state("preview", &[CallState::Idle])?;
                self.start_preview()
            }
            SessionCommand::Join { channel, token } => self.join(channel, &token),
            SessionCommand::EndCall => {
                self.ensure_state(
                    "end_call",
                    &[CallState::Previewing, CallState::Joining, CallState::InCall],
                )?;
                self.teardown();
                Ok(())
            }
            SessionCommand::Mute => self.set_muted("mute", !self.muted),
            SessionCommand::Unmute => self.set_muted("unmute", false),
            SessionCommand::SwitchCamera => self.switch_camera(),
        }
    }

    fn ensure_state(
        &self,
        command: &'static str,
        allowed: &[CallState],
    ) -> Result<(), SessionError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                command,
                state: self.state,
            })
        }
    }

    /// Bind the local surface and start the camera preview.
    ///
    /// On refusal the local binding is rolled back and the state stays `Idle`.
    /// If the surface was already handed to the engine, the preview is stopped
    /// before the surface is released.
    fn start_preview(&mut self) -> Result<(), SessionError> {
        let (surface, _) = self.registry.bind(BindingKey::Local);
        let media = self.media;
        let mut surface_attached = false;

        let result = self.engine.call("start_preview", |engine| {
            engine.enable_video()?;
            engine.configure_encoding(&media.encoding)?;
            engine.configure_audio_profile(media.audio_profile, media.audio_scenario)?;
            engine.setup_local_video(surface)?;
            surface_attached = true;
            engine.start_preview()
        });

        if let Err(error) = result {
            if surface_attached {
                let _ = self
                    .engine
                    .call("stop_preview", |engine| engine.stop_preview());
            }
            let _ = self.registry.unbind(BindingKey::Local);
            return Err(error.into());
        }

        debug!(
            target: "call.actor.session",
            session_id = %self.session_id,
            %surface,
            "Local preview bound"
        );
        self.transition(CallState::Previewing);
        Ok(())
    }

    fn join(&mut self, channel: String, token: &SecretString) -> Result<(), SessionError> {
        if channel.is_empty() {
            return Err(SessionError::InvalidArgument(
                "channel name must not be empty".to_string(),
            ));
        }
        if secret::is_blank(token) {
            return Err(SessionError::InvalidArgument(
                "token must not be empty".to_string(),
            ));
        }

        match self.state {
            CallState::Idle => self.start_preview()?,
            CallState::Previewing => {}
            state => {
                return Err(SessionError::InvalidState {
                    command: "join",
                    state,
                })
            }
        }

        self.engine.call("join_channel", |engine| {
            engine.join_channel(token.expose_secret(), &channel)
        })?;

        info!(
            target: "call.actor.session",
            session_id = %self.session_id,
            channel = %channel,
            "Join requested"
        );
        self.channel = Some(channel);
        self.transition(CallState::Joining);
        Ok(())
    }

    fn set_muted(&mut self, command: &'static str, muted: bool) -> Result<(), SessionError> {
        self.ensure_state(command, &[CallState::InCall])?;
        self.engine
            .call("mute_local_audio", |engine| engine.mute_local_audio(muted))?;

        if self.muted != muted {
            self.muted = muted;
            self.publish_state();
        }
        Ok(())
    }

    fn switch_camera(&mut self) -> Result<(), SessionError> {
        self.ensure_state("switch_camera", &[CallState::InCall])?;
        self.engine
            .call("switch_camera", |engine| engine.switch_camera())?;

        self.camera = self.camera.flipped();
        self.publish_state();
        Ok(())
    }

    fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::JoinSuccess { channel, local_uid } => {
                self.on_join_success(&channel, local_uid);
            }
            EngineEvent::RemoteVideoStarting { participant_id } => {
                if self.accepts_remote_event(&event) {
                    self.on_remote_video_starting(participant_id);
                }
            }
            EngineEvent::RemoteVideoStopped { participant_id } => {
                if self.accepts_remote_event(&event) {
                    debug!(
                        target: "call.actor.session",
                        session_id = %self.session_id,
                        %participant_id,
                        "Remote video stopped, surface kept"
                    );
                }
            }
            EngineEvent::UserOffline {
                participant_id,
                reason,
            } => {
                if self.accepts_remote_event(&event) {
                    self.on_user_offline(participant_id, reason);
                }
            }
            EngineEvent::Error(error) => self.on_engine_error(error),
        }
    }

    /// Acted on only in `Joining` for the pending channel.
    ///
    /// The engine reports no join generation, so a late success from an
    /// abandoned join of the same channel name (join, hang up, join again)
    /// is indistinguishable from the current one and is accepted.
    fn on_join_success(&mut self, channel: &str, local_uid: u32) {
        if self.state != CallState::Joining || self.channel.as_deref() != Some(channel) {
            self.ignore_stale("join_success");
            return;
        }

        info!(
            target: "call.actor.session",
            session_id = %self.session_id,
            local_uid,
            "Joined channel"
        );
        self.local_uid = Some(local_uid);
        self.transition(CallState::InCall);

        // Keep the engine in line with a mute preference carried over from a previous call
        if self.muted {
            if let Err(error) = self
                .engine
                .call("mute_local_audio", |engine| engine.mute_local_audio(true))
            {
                self.notify(error);
            }
        }
    }

    fn accepts_remote_event(&self, event: &EngineEvent) -> bool {
        if self.state == CallState::InCall {
            true
        } else {
            self.ignore_stale(event.kind());
            false
        }
    }

    fn on_remote_video_starting(&mut self, participant_id: ParticipantId) {
        let (surface, created) = self.registry.bind(participant_id);
        if !created {
            debug!(
                target: "call.actor.session",
                session_id = %self.session_id,
                %participant_id,
                "Remote video already bound"
            );
            return;
        }

        let result = self.engine.call("setup_remote_video", |engine| {
            engine.setup_remote_video(participant_id, surface)
        });
        match result {
            Ok(()) => {
                info!(
                    target: "call.actor.session",
                    session_id = %self.session_id,
                    %participant_id,
                    %surface,
                    "Remote video bound"
                );
                self.publish_state();
            }
            Err(error) => {
                let _ = self.registry.unbind(participant_id);
                self.notify(error);
            }
        }
    }

    fn on_user_offline(&mut self, participant_id: ParticipantId, reason: OfflineReason) {
        match self.registry.unbind(participant_id) {
            Ok(handle) => {
                info!(
                    target: "call.actor.session",
                    session_id = %self.session_id,
                    %participant_id,
                    ?reason,
                    "Participant left, surface released"
                );
                self.broadcast(SessionUpdate::SurfacesReleased(vec![RenderBinding {
                    key: BindingKey::Remote(participant_id),
                    handle,
                }]));
                self.publish_state();
            }
            Err(error) => {
                debug!(
                    target: "call.actor.session",
                    session_id = %self.session_id,
                    %participant_id,
                    ?reason,
                    error = %error,
                    "Participant left without a surface"
                );
            }
        }
    }

    fn on_engine_error(&mut self, error: EngineError) {
        match self.state {
            CallState::Joining => {
                warn!(
                    target: "call.actor.session",
                    session_id = %self.session_id,
                    code = error.code,
                    "Join failed, back to preview"
                );
                self.notify(error);
                // The engine may still complete the join; it must not stay in the channel
                if let Err(leave_error) = self
                    .engine
                    .call("leave_channel", |engine| engine.leave_channel())
                {
                    self.notify(leave_error);
                }
                self.channel = None;
                self.transition(CallState::Previewing);
            }
            CallState::Previewing | CallState::InCall => {
                warn!(
                    target: "call.actor.session",
                    session_id = %self.session_id,
                    state = self.state.as_str(),
                    code = error.code,
                    "Engine error reported"
                );
                self.notify(error);
            }
            CallState::Idle | CallState::Ending => {
                metrics::record_engine_error(self.state.as_str());
                self.ignore_stale("engine_error");
            }
        }
    }

    /// Release every surface, leave and stop the preview, end in `Idle`.
    fn teardown(&mut self) {
        let from = self.state;
        if from == CallState::Idle && self.registry.is_empty() {
            return;
        }

        self.transition(CallState::Ending);

        let released = self.registry.unbind_all();
        if !released.is_empty() {
            debug!(
                target: "call.actor.session",
                session_id = %self.session_id,
                surfaces = released.len(),
                "Render surfaces released"
            );
            self.broadcast(SessionUpdate::SurfacesReleased(released));
        }

        if from.has_joined() {
            if let Err(error) = self
                .engine
                .call("leave_channel", |engine| engine.leave_channel())
            {
                self.notify(error);
            }
        }
        if let Err(error) = self
            .engine
            .call("stop_preview", |engine| engine.stop_preview())
        {
            self.notify(error);
        }

        self.channel = None;
        self.local_uid = None;
        self.transition(CallState::Idle);
    }

    /// Teardown, engine release and the final terminated snapshot.
    fn shutdown(&mut self, reason: &'static str) {
        info!(
            target: "call.actor.session",
            session_id = %self.session_id,
            reason,
            state = self.state.as_str(),
            "Destroying call session"
        );

        self.teardown();
        if self.engine.release() {
            debug!(
                target: "call.actor.session",
                session_id = %self.session_id,
                "Engine released"
            );
        }

        self.terminated = true;
        self.publish_state();
    }

    fn transition(&mut self, to: CallState) {
        let from = self.state;
        if from == to {
            return;
        }

        self.state = to;
        info!(
            target: "call.actor.session",
            session_id = %self.session_id,
            from = from.as_str(),
            to = to.as_str(),
            "Call state changed"
        );
        metrics::record_state_transition(from.as_str(), to.as_str());
        self.publish_state();
    }

    fn snapshot(&self) -> CallSnapshot {
        CallSnapshot {
            session_id: self.session_id,
            state: self.state,
            muted: self.muted,
            camera: self.camera,
            channel: self.channel.clone(),
            local_uid: self.local_uid,
            bindings: self.registry.bindings(),
            terminated: self.terminated,
        }
    }

    fn publish_state(&mut self) {
        let snapshot = self.snapshot();
        metrics::set_bound_surfaces(self.registry.len());
        self.state_tx.send_replace(snapshot.clone());
        self.broadcast(SessionUpdate::State(snapshot));
    }

    fn notify(&self, error: EngineError) {
        metrics::record_engine_error(self.state.as_str());
        self.broadcast(SessionUpdate::Notice(SessionNotice {
            state: self.state,
            error,
            at: chrono::Utc::now().timestamp(),
        }));
    }

    fn broadcast(&self, update: SessionUpdate) {
        // No subscribers is not an error
        let _ = self.updates_tx.send(update);
    }

    fn ignore_stale(&self, event: &'static str) {
        debug!(
            target: "call.actor.session",
            session_id = %self.session_id,
            state = self.state.as_str(),
            event,
            "Ignoring stale engine event"
        );
        metrics::record_stale_event(event);
    }
}

fn command_outcome(result: &Result<(), SessionError>) -> &'static str {
    match result {
        Ok(()) => "ok",
        Err(SessionError::InvalidState { .. }) => "invalid_state",
        Err(SessionError::InvalidArgument(_)) => "invalid_argument",
        Err(SessionError::Engine(_)) => "engine_error",
        Err(SessionError::Closed) => "closed",
    }
}
