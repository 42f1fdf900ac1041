//! Runtime configuration for the encoder and the orchestrator.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default database URL; `mode=rwc` creates the file on first run.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:livecast.db?mode=rwc";

/// Default RTMP ingest base the stream key is appended to.
pub const DEFAULT_INGEST_BASE: &str = "rtmp://a.rtmp.youtube.com/live2";

/// Encoder (ffmpeg) parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Path or name of the ffmpeg binary.
    pub binary: PathBuf,
    /// Ingest base URL used when only a stream key is given.
    pub ingest_base_url: String,
    pub video_bitrate: String,
    pub max_rate: String,
    pub buffer_size: String,
    pub frame_rate: u32,
    /// Keyframe interval in frames.
    pub keyframe_interval: u32,
    pub preset: String,
    pub audio_bitrate: String,
    pub audio_sample_rate: u32,
    pub vertical_width: u32,
    pub vertical_height: u32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
            ingest_base_url: DEFAULT_INGEST_BASE.to_string(),
            video_bitrate: "2500k".to_string(),
            max_rate: "2500k".to_string(),
            buffer_size: "5000k".to_string(),
            frame_rate: 30,
            keyframe_interval: 60,
            preset: "veryfast".to_string(),
            audio_bitrate: "128k".to_string(),
            audio_sample_rate: 44_100,
            vertical_width: 720,
            vertical_height: 1280,
        }
    }
}

impl EncoderConfig {
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }
}

/// How the orchestrator obtains an ingest endpoint when the caller does not say.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningMode {
    /// Bare ingest endpoint, no public broadcast.
    StreamKey,
    /// Stream plus a scheduled broadcast bound to it.
    #[default]
    Broadcast,
}

/// Session orchestrator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Delay between provisioning a broadcast and its scheduled auto-start.
    /// Advisory; the platform may start ingest later.
    #[serde(with = "duration_secs")]
    pub broadcast_lead_time: Duration,
    pub default_mode: ProvisioningMode,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            broadcast_lead_time: Duration::from_secs(30),
            default_mode: ProvisioningMode::default(),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoder_defaults_fill_missing_fields() {
        let cfg: EncoderConfig = serde_json::from_str(r#"{"video_bitrate":"4500k"}"#).unwrap();
        assert_eq!(cfg.video_bitrate, "4500k");
        assert_eq!(cfg.binary, PathBuf::from("ffmpeg"));
        assert_eq!(cfg.keyframe_interval, 60);
    }

    #[test]
    fn orchestrator_lead_time_in_seconds() {
        let cfg: OrchestratorConfig =
            serde_json::from_str(r#"{"broadcast_lead_time":45,"default_mode":"stream_key"}"#)
                .unwrap();
        assert_eq!(cfg.broadcast_lead_time, Duration::from_secs(45));
        assert_eq!(cfg.default_mode, ProvisioningMode::StreamKey);
        assert_eq!(
            OrchestratorConfig::default().broadcast_lead_time,
            Duration::from_secs(30)
        );
    }
}
