//! Streaming session entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Broadcast visibility on the platform.
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
    strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    #[default]
    Public,
    Unlisted,
    Private,
}

/// Lifecycle of a persisted session.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
}

/// Public-facing metadata for a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastMetadata {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Platform category id (e.g. "20" for Gaming).
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub privacy: PrivacyStatus,
    #[serde(default)]
    pub made_for_kids: bool,
}

impl BroadcastMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            tags: Vec::new(),
            category: None,
            privacy: PrivacyStatus::default(),
            made_for_kids: false,
        }
    }
}

/// One end-to-end run of provision, encode and stop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingSession {
    pub session_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub video_file: PathBuf,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub privacy_status: PrivacyStatus,
    pub made_for_kids: bool,
    pub channel_name: Option<String>,
    pub status: SessionStatus,
}

impl StreamingSession {
    /// Create a new active session with a generated id.
    pub fn new(
        video_file: impl Into<PathBuf>,
        metadata: &BroadcastMetadata,
        channel_name: Option<String>,
    ) -> Self {
        Self {
            session_id: new_session_id(),
            start_time: Utc::now(),
            end_time: None,
            video_file: video_file.into(),
            title: metadata.title.clone(),
            description: metadata.description.clone(),
            tags: metadata.tags.clone(),
            category: metadata.category.clone(),
            privacy_status: metadata.privacy,
            made_for_kids: metadata.made_for_kids,
            channel_name,
            status: SessionStatus::Active,
        }
    }

    /// End the session now.
    pub fn end(&mut self) {
        self.end_at(Utc::now());
    }

    pub fn end_at(&mut self, time: DateTime<Utc>) {
        self.end_time = Some(time);
        self.status = SessionStatus::Ended;
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// Session ids sort by creation time: `YYYYMMDD_HHMMSS_` plus a random suffix.
pub fn new_session_id() -> String {
    let uuid = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", Utc::now().format("%Y%m%d_%H%M%S"), &uuid[..8])
}
