//! Integration tests for hang-up, destroy and the update stream.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use call_session::actors::{CallState, SessionUpdate};
use call_session::errors::SessionError;
use call_session::registry::BindingKey;
use call_test_utils::{EngineOp, TestSession};
use common::types::ParticipantId;
use std::time::Duration;

const TASK_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// end_call
// ============================================================================

#[tokio::test]
async fn test_end_call_releases_surfaces_newest_first() {
    let session = TestSession::in_call().await;
    session.probe.remote_video_starting(42);
    session.probe.remote_video_starting(7);
    let mut updates = session.handle.subscribe().await.unwrap();
    let _ = updates.recv().await;

    session.handle.end_call().await.unwrap();

    match updates.recv().await {
        Some(SessionUpdate::State(snapshot)) => {
            assert_eq!(snapshot.state, CallState::Ending);
            assert_eq!(snapshot.bindings.len(), 3);
        }
        other => panic!("expected Ending snapshot, got {other:?}"),
    }
    match updates.recv().await {
        Some(SessionUpdate::SurfacesReleased(released)) => {
            assert_eq!(
                released.iter().map(|b| b.key).collect::<Vec<_>>(),
                vec![
                    BindingKey::Remote(ParticipantId(7)),
                    BindingKey::Remote(ParticipantId(42)),
                    BindingKey::Local,
                ]
            );
        }
        other => panic!("expected released surfaces, got {other:?}"),
    }
    match updates.recv().await {
        Some(SessionUpdate::State(snapshot)) => {
            assert_eq!(snapshot.state, CallState::Idle);
            assert!(snapshot.bindings.is_empty());
            assert!(snapshot.channel.is_none());
            assert!(snapshot.local_uid.is_none());
            assert!(!snapshot.terminated);
        }
        other => panic!("expected Idle snapshot, got {other:?}"),
    }

    let ops = session.probe.ops();
    let leave = ops.iter().position(|op| *op == EngineOp::LeaveChannel);
    let stop = ops.iter().position(|op| *op == EngineOp::StopPreview);
    assert!(leave.is_some() && stop.is_some());
    assert!(leave < stop);
}

#[tokio::test]
async fn test_end_call_from_preview_does_not_leave() {
    let session = TestSession::previewing().await;

    session.handle.end_call().await.unwrap();

    assert_eq!(session.state().await.state, CallState::Idle);
    assert_eq!(session.probe.count(EngineOp::LeaveChannel), 0);
    assert_eq!(session.probe.count(EngineOp::StopPreview), 1);
}

#[tokio::test]
async fn test_end_call_while_idle_is_rejected() {
    let session = TestSession::spawn();

    let err = session.handle.end_call().await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::InvalidState {
            command: "end_call",
            state: CallState::Idle
        }
    ));
    assert!(session.probe.calls().is_empty());
}

#[tokio::test]
async fn test_events_after_end_call_are_ignored() {
    let session = TestSession::in_call().await;
    session.handle.end_call().await.unwrap();

    session.probe.remote_video_starting(42);
    session.probe.user_offline(42);
    session.probe.engine_error(110);
    let snapshot = session.state().await;

    assert_eq!(snapshot.state, CallState::Idle);
    assert!(snapshot.bindings.is_empty());
    assert_eq!(session.probe.count(EngineOp::SetupRemoteVideo), 0);
}

// ============================================================================
// destroy
// ============================================================================

#[tokio::test]
async fn test_destroy_releases_engine_once() {
    let session = TestSession::in_call().await;

    session.handle.destroy().await.unwrap();
    session.handle.destroy().await.unwrap();

    assert_eq!(session.probe.release_count(), 1);
    assert_eq!(session.probe.count(EngineOp::LeaveChannel), 1);
    tokio::time::timeout(TASK_TIMEOUT, session.task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_destroy_while_joining_leaves_channel() {
    let session = TestSession::joining().await;

    session.handle.destroy().await.unwrap();

    let ops = session.probe.ops();
    assert!(ops.contains(&EngineOp::LeaveChannel));
    assert_eq!(ops.last(), Some(&EngineOp::Release));
}

#[tokio::test]
async fn test_destroy_while_idle_only_releases() {
    let session = TestSession::spawn();

    session.handle.destroy().await.unwrap();

    assert_eq!(session.probe.ops(), vec![EngineOp::Release]);
}

#[tokio::test]
async fn test_destroy_publishes_terminated_snapshot() {
    let session = TestSession::in_call().await;
    let state = session.handle.watch_state();

    session.handle.destroy().await.unwrap();

    let snapshot = state.borrow().clone();
    assert_eq!(snapshot.state, CallState::Idle);
    assert!(snapshot.terminated);
    assert!(snapshot.bindings.is_empty());
}

#[tokio::test]
async fn test_commands_after_destroy_report_closed() {
    let session = TestSession::in_call().await;
    session.handle.destroy().await.unwrap();
    tokio::time::timeout(TASK_TIMEOUT, session.task)
        .await
        .unwrap()
        .unwrap();

    assert!(session.handle.is_closed());
    assert!(matches!(
        session.handle.mute().await,
        Err(SessionError::Closed)
    ));
    assert!(matches!(
        session.handle.get_state().await,
        Err(SessionError::Closed)
    ));
    // Events from the engine are no longer accepted
    assert!(!session.probe.remote_video_starting(42));
}

#[tokio::test]
async fn test_cancellation_tears_down() {
    let session = TestSession::in_call().await;
    session.probe.remote_video_starting(42);
    let _ = session.state().await;

    session.cancel_token.cancel();
    tokio::time::timeout(TASK_TIMEOUT, session.task)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(session.probe.count(EngineOp::LeaveChannel), 1);
    assert_eq!(session.probe.release_count(), 1);
    let state = session.handle.watch_state();
    assert!(state.borrow().terminated);
}

#[tokio::test]
async fn test_dropping_handles_tears_down() {
    let TestSession {
        handle,
        task,
        probe,
        cancel_token: _cancel_token,
    } = TestSession::in_call().await;

    drop(handle);
    tokio::time::timeout(TASK_TIMEOUT, task)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(probe.count(EngineOp::LeaveChannel), 1);
    assert_eq!(probe.release_count(), 1);
}

#[tokio::test]
async fn test_aborted_task_still_releases_engine() {
    let session = TestSession::previewing().await;

    session.task.abort();
    let result = tokio::time::timeout(TASK_TIMEOUT, session.task)
        .await
        .unwrap();

    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(session.probe.release_count(), 1);
}

// ============================================================================
// Update stream
// ============================================================================

#[tokio::test]
async fn test_late_subscriber_sees_current_state_first() {
    let session = TestSession::in_call().await;
    session.probe.remote_video_starting(3);

    let mut updates = session.handle.subscribe().await.unwrap();

    match updates.recv().await {
        Some(SessionUpdate::State(snapshot)) => {
            assert_eq!(snapshot.state, CallState::InCall);
            assert!(snapshot.is_bound(ParticipantId(3)));
        }
        other => panic!("expected current snapshot, got {other:?}"),
    }
}

#[tokio::test]
async fn test_update_stream_ends_after_destroy() {
    let session = TestSession::previewing().await;
    let mut updates = session.handle.subscribe().await.unwrap();
    let _ = updates.recv().await;

    session.handle.destroy().await.unwrap();

    let mut last = None;
    while let Some(update) = updates.recv().await {
        last = Some(update);
    }
    match last {
        Some(SessionUpdate::State(snapshot)) => assert!(snapshot.terminated),
        other => panic!("expected terminated snapshot last, got {other:?}"),
    }
}
