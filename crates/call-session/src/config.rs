//! Call session configuration.
//!
//! Configuration is loaded from environment variables. The channel token is
//! redacted in Debug output.

use crate::actors::session::{SessionSettings, DEFAULT_MAILBOX_CAPACITY};
use crate::engine::settings::{DEFAULT_FRAME_RATE, DEFAULT_RESOLUTION};
use crate::engine::{
    AudioProfile, AudioScenario, BitratePolicy, MediaSettings, OrientationPolicy, Resolution,
    VideoEncoding,
};

use common::secret::{self, SecretString};
use common::types::ParticipantId;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use thiserror::Error;

/// Default channel name.
pub const DEFAULT_CHANNEL: &str = "videochat";

/// Call session configuration.
#[derive(Clone)]
pub struct Config {
    /// Channel access token. Protected by `SecretString` to prevent accidental logging.
    pub token: SecretString,

    /// Channel to join (default: "videochat").
    pub channel: String,

    /// Media parameters handed to the engine.
    pub media: MediaSettings,

    /// Session mailbox capacity (default: 256).
    pub mailbox_capacity: usize,

    /// Prometheus listener address; no exporter when unset.
    pub metrics_bind_address: Option<SocketAddr>,

    /// Remote participant the loopback engine announces after joining.
    pub loopback_peer: Option<ParticipantId>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token", &"[REDACTED]")
            .field("channel", &self.channel)
            .field("media", &self.media)
            .field("mailbox_capacity", &self.mailbox_capacity)
            .field("metrics_bind_address", &self.metrics_bind_address)
            .field("loopback_peer", &self.loopback_peer)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let token = SecretString::from(
            vars.get("CALL_TOKEN")
                .ok_or_else(|| ConfigError::MissingEnvVar("CALL_TOKEN".to_string()))?
                .clone(),
        );
        if secret::is_blank(&token) {
            return Err(ConfigError::InvalidValue(
                "CALL_TOKEN must not be empty".to_string(),
            ));
        }

        let channel = vars
            .get("CALL_CHANNEL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_CHANNEL.to_string());
        if channel.is_empty() {
            return Err(ConfigError::InvalidValue(
                "CALL_CHANNEL must not be empty".to_string(),
            ));
        }

        // Unparseable numbers fall back to defaults
        let width = vars
            .get("CALL_VIDEO_WIDTH")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RESOLUTION.width);

        let height = vars
            .get("CALL_VIDEO_HEIGHT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_RESOLUTION.height);

        let frame_rate = vars
            .get("CALL_VIDEO_FRAME_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_FRAME_RATE);

        let mailbox_capacity = vars
            .get("CALL_MAILBOX_CAPACITY")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAILBOX_CAPACITY);

        if width == 0 || height == 0 || frame_rate == 0 {
            return Err(ConfigError::InvalidValue(format!(
                "video size and frame rate must be positive, got {width}x{height}@{frame_rate}"
            )));
        }
        if mailbox_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "CALL_MAILBOX_CAPACITY must be greater than 0".to_string(),
            ));
        }

        let bitrate: BitratePolicy = parse_setting(vars, "CALL_VIDEO_BITRATE")?;
        let orientation: OrientationPolicy = parse_setting(vars, "CALL_VIDEO_ORIENTATION")?;
        let audio_profile: AudioProfile = parse_setting(vars, "CALL_AUDIO_PROFILE")?;
        let audio_scenario: AudioScenario = parse_setting(vars, "CALL_AUDIO_SCENARIO")?;

        let metrics_bind_address = vars
            .get("CALL_METRICS_BIND_ADDRESS")
            .map(|s| {
                s.parse::<SocketAddr>().map_err(|e| {
                    ConfigError::InvalidValue(format!("CALL_METRICS_BIND_ADDRESS: {e}"))
                })
            })
            .transpose()?;

        let loopback_peer = vars
            .get("CALL_LOOPBACK_PEER")
            .map(|s| {
                s.parse::<u32>()
                    .map(ParticipantId)
                    .map_err(|e| ConfigError::InvalidValue(format!("CALL_LOOPBACK_PEER: {e}")))
            })
            .transpose()?;

        Ok(Config {
            token,
            channel,
            media: MediaSettings {
                encoding: VideoEncoding {
                    resolution: Resolution { width, height },
                    frame_rate,
                    bitrate,
                    orientation,
                },
                audio_profile,
                audio_scenario,
            },
            mailbox_capacity,
            metrics_bind_address,
            loopback_peer,
        })
    }

    /// Construction parameters for the session actor.
    #[must_use]
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            media: self.media,
            mailbox_capacity: self.mailbox_capacity,
        }
    }
}

/// Parse an enum setting, using its default when the variable is unset.
fn parse_setting<T>(vars: &HashMap<String, String>, name: &str) -> Result<T, ConfigError>
where
    T: FromStr + Default,
    T::Err: fmt::Display,
{
    match vars.get(name) {
        Some(value) => value
            .parse()
            .map_err(|e| ConfigError::InvalidValue(format!("{name}: {e}"))),
        None => Ok(T::default()),
    }
}
