//! Call Session demo binary.
//!
//! Drives one session against the loopback engine:
//! - Loads configuration from `CALL_*` environment variables
//! - Optionally exposes Prometheus metrics
//! - Starts the preview, joins the configured channel and logs every update
//! - Hangs up and destroys the session on Ctrl-C

#![warn(clippy::pedantic)]

use std::time::Duration;

use anyhow::{Context, Result};
use call_session::actors::{CallSessionActor, CallSessionHandle, SessionUpdate};
use call_session::config::Config;
use call_session::engine::LoopbackEngine;
use call_session::observability::init_metrics_recorder;
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Maximum time to wait for the session actor after destroy.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "call_session=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting call session");

    let config = Config::from_env().context("failed to load configuration")?;
    info!(
        channel = %config.channel,
        width = config.media.encoding.resolution.width,
        height = config.media.encoding.resolution.height,
        frame_rate = config.media.encoding.frame_rate,
        mailbox_capacity = config.mailbox_capacity,
        "Configuration loaded successfully"
    );

    if let Some(bind_address) = config.metrics_bind_address {
        init_metrics_recorder(bind_address)
            .map_err(anyhow::Error::msg)
            .context("failed to start metrics exporter")?;
        info!(%bind_address, "Prometheus metrics exporter listening");
    }

    let cancel_token = CancellationToken::new();
    let peer = config.loopback_peer;
    let (session, session_task) = CallSessionActor::spawn(
        config.session_settings(),
        cancel_token.child_token(),
        move |events| LoopbackEngine::new(events).with_peer(peer),
    );

    let updates_task = spawn_update_logger(&session)
        .await
        .context("failed to subscribe to session updates")?;

    session.preview().await.context("failed to start preview")?;
    session
        .join(config.channel.clone(), config.token.clone())
        .await
        .context("failed to join channel")?;

    info!("In call; press Ctrl-C to hang up");
    signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    if let Err(e) = session.end_call().await {
        warn!(error = %e, "end_call rejected");
    }
    session.destroy().await.context("failed to destroy session")?;

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, session_task).await {
        Ok(Ok(())) => info!("Session stopped cleanly"),
        Ok(Err(e)) => error!(error = ?e, "Session task panicked"),
        Err(_) => {
            warn!("Session shutdown timed out");
            cancel_token.cancel();
        }
    }
    // The update stream ends once the session actor is gone
    let _ = tokio::time::timeout(SHUTDOWN_TIMEOUT, updates_task).await;

    info!("Call session exited");
    Ok(())
}

/// Log every session update until the stream ends.
async fn spawn_update_logger(session: &CallSessionHandle) -> Result<JoinHandle<()>> {
    let mut updates = session.subscribe().await?;

    Ok(tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            match update {
                SessionUpdate::State(snapshot) => info!(
                    state = snapshot.state.as_str(),
                    muted = snapshot.muted,
                    camera = snapshot.camera.as_str(),
                    participants = ?snapshot.participants(),
                    terminated = snapshot.terminated,
                    "Session state"
                ),
                SessionUpdate::SurfacesReleased(bindings) => {
                    for binding in bindings {
                        info!(key = %binding.key, surface = %binding.handle, "Surface released");
                    }
                }
                SessionUpdate::Notice(notice) => warn!(
                    state = notice.state.as_str(),
                    code = notice.error.code,
                    "Engine problem reported"
                ),
            }
        }
    }))
}
