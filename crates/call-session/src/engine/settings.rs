//! Encoding and audio parameters.
//!
//! The session never interprets these values; they are handed to
//! [`EngineFacade::configure_encoding`](super::EngineFacade::configure_encoding)
//! and [`EngineFacade::configure_audio_profile`](super::EngineFacade::configure_audio_profile)
//! exactly as configured.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Default target resolution (640x360).
pub const DEFAULT_RESOLUTION: Resolution = Resolution {
    width: 640,
    height: 360,
};

/// Default target frame rate.
pub const DEFAULT_FRAME_RATE: u32 = 15;

/// Error returned when a settings string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseSettingError {
    kind: &'static str,
    value: String,
}

impl ParseSettingError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// Target capture resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Bitrate policy for the video encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitratePolicy {
    /// Engine-recommended bitrate for the resolution and frame rate.
    #[default]
    Standard,
    /// Lower bitrate compatible with older live-broadcast peers.
    Compatible,
    /// Fixed target in kbps.
    Kbps(u32),
}

impl FromStr for BitratePolicy {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(BitratePolicy::Standard),
            "compatible" => Ok(BitratePolicy::Compatible),
            other => other
                .parse::<u32>()
                .ok()
                .filter(|kbps| *kbps > 0)
                .map(BitratePolicy::Kbps)
                .ok_or_else(|| ParseSettingError::new("bitrate policy", other)),
        }
    }
}

/// How encoded video follows device orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrientationPolicy {
    Adaptive,
    FixedLandscape,
    #[default]
    FixedPortrait,
}

impl FromStr for OrientationPolicy {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "adaptive" => Ok(OrientationPolicy::Adaptive),
            "fixed_landscape" => Ok(OrientationPolicy::FixedLandscape),
            "fixed_portrait" => Ok(OrientationPolicy::FixedPortrait),
            other => Err(ParseSettingError::new("orientation policy", other)),
        }
    }
}

/// Audio sample rate, channel count and encoding quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioProfile {
    #[default]
    Default,
    SpeechStandard,
    MusicStandard,
    MusicStandardStereo,
    MusicHighQuality,
    MusicHighQualityStereo,
}

impl FromStr for AudioProfile {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(AudioProfile::Default),
            "speech_standard" => Ok(AudioProfile::SpeechStandard),
            "music_standard" => Ok(AudioProfile::MusicStandard),
            "music_standard_stereo" => Ok(AudioProfile::MusicStandardStereo),
            "music_high_quality" => Ok(AudioProfile::MusicHighQuality),
            "music_high_quality_stereo" => Ok(AudioProfile::MusicHighQualityStereo),
            other => Err(ParseSettingError::new("audio profile", other)),
        }
    }
}

/// Usage scenario hint for the audio pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioScenario {
    #[default]
    Default,
    ChatRoomEntertainment,
    Education,
    GameStreaming,
    ShowRoom,
    ChatRoomGaming,
}

impl FromStr for AudioScenario {
    type Err = ParseSettingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(AudioScenario::Default),
            "chat_room_entertainment" => Ok(AudioScenario::ChatRoomEntertainment),
            "education" => Ok(AudioScenario::Education),
            "game_streaming" => Ok(AudioScenario::GameStreaming),
            "show_room" => Ok(AudioScenario::ShowRoom),
            "chat_room_gaming" => Ok(AudioScenario::ChatRoomGaming),
            other => Err(ParseSettingError::new("audio scenario", other)),
        }
    }
}

/// Video encoder configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoEncoding {
    pub resolution: Resolution,
    pub frame_rate: u32,
    pub bitrate: BitratePolicy,
    pub orientation: OrientationPolicy,
}

impl Default for VideoEncoding {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            frame_rate: DEFAULT_FRAME_RATE,
            bitrate: BitratePolicy::Standard,
            orientation: OrientationPolicy::FixedPortrait,
        }
    }
}

/// Everything applied to the engine when the local preview starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MediaSettings {
    pub encoding: VideoEncoding,
    pub audio_profile: AudioProfile,
    pub audio_scenario: AudioScenario,
}
