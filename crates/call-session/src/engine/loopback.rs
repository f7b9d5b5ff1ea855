//! In-process engine with no media transport.
//!
//! Accepts every request, answers a join with [`EngineEvent::JoinSuccess`] and,
//! when configured with a peer, announces that peer's video right after.
//! Used by the `call-session` binary and by unit tests.

use super::{
    AudioProfile, AudioScenario, EngineError, EngineEvent, EngineEventSender, EngineFacade,
    VideoEncoding,
};
use crate::registry::SurfaceHandle;

use common::types::ParticipantId;
use tracing::{debug, info};

/// Local uid assigned when none is configured.
pub const DEFAULT_LOCAL_UID: u32 = 1000;

/// Loopback implementation of [`EngineFacade`].
#[derive(Debug)]
pub struct LoopbackEngine {
    events: EngineEventSender,
    local_uid: u32,
    peer: Option<ParticipantId>,
    channel: Option<String>,
    previewing: bool,
    released: bool,
}

impl LoopbackEngine {
    #[must_use]
    pub fn new(events: EngineEventSender) -> Self {
        Self {
            events,
            local_uid: DEFAULT_LOCAL_UID,
            peer: None,
            channel: None,
            previewing: false,
            released: false,
        }
    }

    /// Announce `peer` as a remote video source after every successful join.
    #[must_use]
    pub fn with_peer(mut self, peer: Option<ParticipantId>) -> Self {
        self.peer = peer;
        self
    }

    #[must_use]
    pub fn with_local_uid(mut self, local_uid: u32) -> Self {
        self.local_uid = local_uid;
        self
    }

    /// Channel currently joined.
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    #[must_use]
    pub fn is_previewing(&self) -> bool {
        self.previewing
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl EngineFacade for LoopbackEngine {
    fn enable_video(&mut self) -> Result<(), EngineError> {
        debug!(target: "call.engine.loopback", "enable_video");
        Ok(())
    }

    fn start_preview(&mut self) -> Result<(), EngineError> {
        debug!(target: "call.engine.loopback", "start_preview");
        self.previewing = true;
        Ok(())
    }

    fn stop_preview(&mut self) -> Result<(), EngineError> {
        debug!(target: "call.engine.loopback", "stop_preview");
        self.previewing = false;
        Ok(())
    }

    fn join_channel(&mut self, _token: &str, channel: &str) -> Result<(), EngineError> {
        info!(target: "call.engine.loopback", channel, "join_channel");
        self.channel = Some(channel.to_string());

        self.events.emit(EngineEvent::JoinSuccess {
            channel: channel.to_string(),
            local_uid: self.local_uid,
        });
        if let Some(participant_id) = self.peer {
            self.events
                .emit(EngineEvent::RemoteVideoStarting { participant_id });
        }
        Ok(())
    }

    fn leave_channel(&mut self) -> Result<(), EngineError> {
        info!(
            target: "call.engine.loopback",
            channel = self.channel.as_deref().unwrap_or_default(),
            "leave_channel"
        );
        self.channel = None;
        Ok(())
    }

    fn setup_local_video(&mut self, surface: SurfaceHandle) -> Result<(), EngineError> {
        debug!(target: "call.engine.loopback", %surface, "setup_local_video");
        Ok(())
    }

    fn setup_remote_video(
        &mut self,
        participant_id: ParticipantId,
        surface: SurfaceHandle,
    ) -> Result<(), EngineError> {
        debug!(
            target: "call.engine.loopback",
            %participant_id,
            %surface,
            "setup_remote_video"
        );
        Ok(())
    }

    fn mute_local_audio(&mut self, muted: bool) -> Result<(), EngineError> {
        debug!(target: "call.engine.loopback", muted, "mute_local_audio");
        Ok(())
    }

    fn switch_camera(&mut self) -> Result<(), EngineError> {
        debug!(target: "call.engine.loopback", "switch_camera");
        Ok(())
    }

    fn configure_encoding(&mut self, encoding: &VideoEncoding) -> Result<(), EngineError> {
        debug!(
            target: "call.engine.loopback",
            width = encoding.resolution.width,
            height = encoding.resolution.height,
            frame_rate = encoding.frame_rate,
            bitrate = ?encoding.bitrate,
            orientation = ?encoding.orientation,
            "configure_encoding"
        );
        Ok(())
    }

    fn configure_audio_profile(
        &mut self,
        profile: AudioProfile,
        scenario: AudioScenario,
    ) -> Result<(), EngineError> {
        debug!(
            target: "call.engine.loopback",
            ?profile,
            ?scenario,
            "configure_audio_profile"
        );
        Ok(())
    }

    fn release(&mut self) {
        info!(target: "call.engine.loopback", "release");
        self.released = true;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn next_event(rx: &mut mpsc::UnboundedReceiver<EngineEvent>) -> EngineEvent {
        rx.try_recv().unwrap()
    }

    #[test]
    fn test_join_answers_with_join_success_then_peer() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine = LoopbackEngine::new(EngineEventSender::new(tx))
            .with_peer(Some(ParticipantId(42)))
            .with_local_uid(7);

        engine.join_channel("tok", "room1").unwrap();

        assert_eq!(
            next_event(&mut rx),
            EngineEvent::JoinSuccess {
                channel: "room1".to_string(),
                local_uid: 7,
            }
        );
        assert_eq!(
            next_event(&mut rx),
            EngineEvent::RemoteVideoStarting {
                participant_id: ParticipantId(42),
            }
        );
        assert_eq!(engine.channel(), Some("room1"));
    }

    #[test]
    fn test_leave_emits_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine = LoopbackEngine::new(EngineEventSender::new(tx));

        engine.join_channel("tok", "room1").unwrap();
        let _ = next_event(&mut rx);
        engine.leave_channel().unwrap();

        assert!(rx.try_recv().is_err());
        assert!(engine.channel().is_none());
    }

    #[test]
    fn test_preview_and_release_flags() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut engine = LoopbackEngine::new(EngineEventSender::new(tx));

        engine.start_preview().unwrap();
        assert!(engine.is_previewing());
        engine.stop_preview().unwrap();
        assert!(!engine.is_previewing());

        engine.release();
        assert!(engine.is_released());
    }
}
