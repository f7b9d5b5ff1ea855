//! Recording mock of the real-time engine.
//!
//! [`MockEngine`] is what the session owns; [`EngineProbe`] is what the test
//! keeps. Both share one recorder, so the test can inspect every facade call,
//! make chosen calls fail, and emit engine events into the session the same
//! way a native engine would.
//!
//! # Example
//!
//! ```rust,ignore
//! use call_test_utils::{EngineOp, EngineProbe};
//!
//! let probe = EngineProbe::new().fail_on(EngineOp::SwitchCamera, 7);
//! let (handle, _task) = CallSessionActor::spawn(settings, token, probe.factory());
//!
//! // ... drive the session ...
//! assert_eq!(probe.count(EngineOp::LeaveChannel), 1);
//! assert_eq!(probe.release_count(), 1);
//! ```

use call_session::engine::{
    AudioProfile, AudioScenario, EngineError, EngineEvent, EngineEventSender, EngineFacade,
    OfflineReason, VideoEncoding,
};
use call_session::registry::SurfaceHandle;
use common::types::ParticipantId;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Facade operation, without arguments. Used for counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineOp {
    EnableVideo,
    StartPreview,
    StopPreview,
    JoinChannel,
    LeaveChannel,
    SetupLocalVideo,
    SetupRemoteVideo,
    MuteLocalAudio,
    SwitchCamera,
    ConfigureEncoding,
    ConfigureAudioProfile,
    Release,
}

/// One recorded facade call, with its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    EnableVideo,
    StartPreview,
    StopPreview,
    JoinChannel { token: String, channel: String },
    LeaveChannel,
    SetupLocalVideo(SurfaceHandle),
    SetupRemoteVideo(ParticipantId, SurfaceHandle),
    MuteLocalAudio(bool),
    SwitchCamera,
    ConfigureEncoding(VideoEncoding),
    ConfigureAudioProfile(AudioProfile, AudioScenario),
    Release,
}

impl EngineCall {
    /// The operation this call belongs to.
    pub fn op(&self) -> EngineOp {
        match self {
            EngineCall::EnableVideo => EngineOp::EnableVideo,
            EngineCall::StartPreview => EngineOp::StartPreview,
            EngineCall::StopPreview => EngineOp::StopPreview,
            EngineCall::JoinChannel { .. } => EngineOp::JoinChannel,
            EngineCall::LeaveChannel => EngineOp::LeaveChannel,
            EngineCall::SetupLocalVideo(_) => EngineOp::SetupLocalVideo,
            EngineCall::SetupRemoteVideo(..) => EngineOp::SetupRemoteVideo,
            EngineCall::MuteLocalAudio(_) => EngineOp::MuteLocalAudio,
            EngineCall::SwitchCamera => EngineOp::SwitchCamera,
            EngineCall::ConfigureEncoding(_) => EngineOp::ConfigureEncoding,
            EngineCall::ConfigureAudioProfile(..) => EngineOp::ConfigureAudioProfile,
            EngineCall::Release => EngineOp::Release,
        }
    }
}

#[derive(Debug, Default)]
struct ProbeInner {
    calls: Vec<EngineCall>,
    /// Error codes returned on every call of the operation.
    failures: HashMap<EngineOp, i32>,
    /// Error codes returned once each, before `failures` is consulted.
    one_shot_failures: HashMap<EngineOp, VecDeque<i32>>,
    events: Option<EngineEventSender>,
}

/// Test-side view of a [`MockEngine`].
#[derive(Debug, Clone, Default)]
pub struct EngineProbe {
    inner: Arc<Mutex<ProbeInner>>,
}

impl EngineProbe {
    /// Create a probe whose engine accepts every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `op` fail with `code`.
    #[must_use]
    pub fn fail_on(self, op: EngineOp, code: i32) -> Self {
        self.set_failure(op, code);
        self
    }

    /// Make the next call of `op` fail with `code`.
    #[must_use]
    pub fn fail_once(self, op: EngineOp, code: i32) -> Self {
        self.inner
            .lock()
            .unwrap()
            .one_shot_failures
            .entry(op)
            .or_default()
            .push_back(code);
        self
    }

    /// Make every later call of `op` fail with `code`.
    pub fn set_failure(&self, op: EngineOp, code: i32) {
        self.inner.lock().unwrap().failures.insert(op, code);
    }

    /// Remove every injected failure.
    pub fn clear_failures(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failures.clear();
        inner.one_shot_failures.clear();
    }

    /// Engine constructor for `CallSessionActor::spawn`.
    pub fn factory(&self) -> impl FnOnce(EngineEventSender) -> MockEngine {
        let probe = self.clone();
        move |events| {
            probe.inner.lock().unwrap().events = Some(events);
            MockEngine { probe }
        }
    }

    /// Emit an event into the session as the engine would.
    ///
    /// Returns false when the session has stopped.
    ///
    /// # Panics
    ///
    /// Panics if no engine was created from this probe.
    pub fn emit(&self, event: EngineEvent) -> bool {
        let events = self
            .inner
            .lock()
            .unwrap()
            .events
            .clone()
            .expect("no MockEngine created from this probe");
        events.emit(event)
    }

    pub fn join_success(&self, channel: &str, local_uid: u32) -> bool {
        self.emit(EngineEvent::JoinSuccess {
            channel: channel.to_string(),
            local_uid,
        })
    }

    pub fn remote_video_starting(&self, participant_id: u32) -> bool {
        self.emit(EngineEvent::RemoteVideoStarting {
            participant_id: ParticipantId(participant_id),
        })
    }

    pub fn remote_video_stopped(&self, participant_id: u32) -> bool {
        self.emit(EngineEvent::RemoteVideoStopped {
            participant_id: ParticipantId(participant_id),
        })
    }

    pub fn user_offline(&self, participant_id: u32) -> bool {
        self.emit(EngineEvent::UserOffline {
            participant_id: ParticipantId(participant_id),
            reason: OfflineReason::Quit,
        })
    }

    pub fn engine_error(&self, code: i32) -> bool {
        self.emit(EngineEvent::Error(EngineError::new(code)))
    }

    /// Every call recorded so far, in order.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Recorded operations, in order.
    pub fn ops(&self) -> Vec<EngineOp> {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(EngineCall::op)
            .collect()
    }

    /// Recorded calls of `op`, in order.
    pub fn calls_of(&self, op: EngineOp) -> Vec<EngineCall> {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.op() == op)
            .cloned()
            .collect()
    }

    /// Number of recorded calls of `op`.
    pub fn count(&self, op: EngineOp) -> usize {
        self.inner
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|call| call.op() == op)
            .count()
    }

    pub fn release_count(&self) -> usize {
        self.count(EngineOp::Release)
    }

    /// Forget recorded calls (failures are kept).
    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    fn record(&self, call: EngineCall) -> Result<(), EngineError> {
        let mut inner = self.inner.lock().unwrap();
        let op = call.op();
        inner.calls.push(call);

        if let Some(code) = inner
            .one_shot_failures
            .get_mut(&op)
            .and_then(VecDeque::pop_front)
        {
            return Err(EngineError::new(code));
        }
        match inner.failures.get(&op) {
            Some(code) => Err(EngineError::new(*code)),
            None => Ok(()),
        }
    }
}

/// Engine handed to the session; records into its [`EngineProbe`].
#[derive(Debug)]
pub struct MockEngine {
    probe: EngineProbe,
}

impl EngineFacade for MockEngine {
    fn enable_video(&mut self) -> Result<(), EngineError> {
        self.probe.record(EngineCall::EnableVideo)
    }

    fn start_preview(&mut self) -> Result<(), EngineError> {
        self.probe.record(EngineCall::StartPreview)
    }

    fn stop_preview(&mut self) -> Result<(), EngineError> {
        self.probe.record(EngineCall::StopPreview)
    }

    fn join_channel(&mut self, token: &str, channel: &str) -> Result<(), EngineError> {
        self.probe.record(EngineCall::JoinChannel {
            token: token.to_string(),
            channel: channel.to_string(),
        })
    }

    fn leave_channel(&mut self) -> Result<(), EngineError> {
        self.probe.record(EngineCall::LeaveChannel)
    }

    fn setup_local_video(&mut self, surface: SurfaceHandle) -> Result<(), EngineError> {
        self.probe.record(EngineCall::SetupLocalVideo(surface))
    }

    fn setup_remote_video(
        &mut self,
        participant_id: ParticipantId,
        surface: SurfaceHandle,
    ) -> Result<(), EngineError> {
        self.probe
            .record(EngineCall::SetupRemoteVideo(participant_id, surface))
    }

    fn mute_local_audio(&mut self, muted: bool) -> Result<(), EngineError> {
        self.probe.record(EngineCall::MuteLocalAudio(muted))
    }

    fn switch_camera(&mut self) -> Result<(), EngineError> {
        self.probe.record(EngineCall::SwitchCamera)
    }

    fn configure_encoding(&mut self, encoding: &VideoEncoding) -> Result<(), EngineError> {
        self.probe.record(EngineCall::ConfigureEncoding(*encoding))
    }

    fn configure_audio_profile(
        &mut self,
        profile: AudioProfile,
        scenario: AudioScenario,
    ) -> Result<(), EngineError> {
        self.probe
            .record(EngineCall::ConfigureAudioProfile(profile, scenario))
    }

    fn release(&mut self) {
        let _ = self.probe.record(EngineCall::Release);
    }
}
