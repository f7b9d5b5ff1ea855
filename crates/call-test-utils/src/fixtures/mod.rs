//! Pre-configured test data fixtures for call session testing.
//!
//! Provides:
//! - Channel, token and uid constants
//! - Session settings with a small mailbox
//! - [`TestSession`]: a session over a [`MockEngine`](crate::MockEngine),
//!   spawned and driven to a chosen state

use crate::mock_engine::EngineProbe;

use call_session::actors::{
    CallSessionActor, CallSessionHandle, CallSnapshot, CallState, SessionSettings,
};
use common::secret::SecretString;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Channel used by the pre-positioned sessions.
pub const TEST_CHANNEL: &str = "room1";

/// Token used by the pre-positioned sessions.
pub const TEST_TOKEN: &str = "006test-token";

/// Local uid reported in `JoinSuccess`.
pub const TEST_LOCAL_UID: u32 = 1000;

/// Mailbox capacity for test sessions.
pub const TEST_MAILBOX_CAPACITY: usize = 16;

/// Fresh copy of [`TEST_TOKEN`].
#[must_use]
pub fn test_token() -> SecretString {
    SecretString::from(TEST_TOKEN)
}

/// Default media settings, small mailbox.
#[must_use]
pub fn test_settings() -> SessionSettings {
    SessionSettings {
        mailbox_capacity: TEST_MAILBOX_CAPACITY,
        ..SessionSettings::default()
    }
}

/// A spawned session together with the probe of its engine.
pub struct TestSession {
    pub handle: CallSessionHandle,
    pub task: JoinHandle<()>,
    pub probe: EngineProbe,
    pub cancel_token: CancellationToken,
}

impl TestSession {
    /// Spawn an `Idle` session over an engine that accepts every call.
    pub fn spawn() -> Self {
        Self::spawn_with(EngineProbe::new(), test_settings())
    }

    /// Spawn an `Idle` session over `probe`'s engine.
    pub fn spawn_with(probe: EngineProbe, settings: SessionSettings) -> Self {
        let cancel_token = CancellationToken::new();
        let (handle, task) =
            CallSessionActor::spawn(settings, cancel_token.child_token(), probe.factory());
        Self {
            handle,
            task,
            probe,
            cancel_token,
        }
    }

    /// Session in `Previewing`.
    pub async fn previewing() -> Self {
        let session = Self::spawn();
        session.handle.preview().await.unwrap();
        session
    }

    /// Session in `Joining` on [`TEST_CHANNEL`]; no `JoinSuccess` delivered yet.
    pub async fn joining() -> Self {
        let session = Self::previewing().await;
        session
            .handle
            .join(TEST_CHANNEL, test_token())
            .await
            .unwrap();
        session
    }

    /// Session in `InCall` on [`TEST_CHANNEL`].
    ///
    /// # Panics
    ///
    /// Panics if the session did not reach `InCall`.
    pub async fn in_call() -> Self {
        let session = Self::joining().await;
        session.join_success().await;
        assert_eq!(session.state().await.state, CallState::InCall);
        session
    }

    /// Deliver `JoinSuccess` for [`TEST_CHANNEL`] and wait until it is handled.
    pub async fn join_success(&self) -> CallSnapshot {
        assert!(self.probe.join_success(TEST_CHANNEL, TEST_LOCAL_UID));
        self.state().await
    }

    /// Current snapshot, ordered after every event emitted before the call.
    ///
    /// # Panics
    ///
    /// Panics if the session has stopped.
    pub async fn state(&self) -> CallSnapshot {
        self.handle.get_state().await.unwrap()
    }
}
