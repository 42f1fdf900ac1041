//! Streaming session database model.

use sqlx::FromRow;
use std::str::FromStr;

use crate::database::time::ms_to_datetime;
use crate::domain::{PrivacyStatus, SessionStatus, StreamingSession};
use crate::{Error, Result};

/// Row of `streaming_sessions`.
#[derive(Debug, Clone, FromRow)]
pub struct StreamingSessionDbModel {
    pub session_id: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub video_file: String,
    pub title: String,
    pub description: String,
    /// JSON array of strings
    pub tags: String,
    pub category: Option<String>,
    /// public, unlisted, private
    pub privacy_status: String,
    pub made_for_kids: bool,
    pub channel_name: Option<String>,
    /// active, ended
    pub status: String,
}

impl StreamingSessionDbModel {
    pub fn from_domain(session: &StreamingSession) -> Result<Self> {
        Ok(Self {
            session_id: session.session_id.clone(),
            start_time: session.start_time.timestamp_millis(),
            end_time: session.end_time.map(|t| t.timestamp_millis()),
            video_file: session.video_file.to_string_lossy().into_owned(),
            title: session.title.clone(),
            description: session.description.clone(),
            tags: serde_json::to_string(&session.tags)?,
            category: session.category.clone(),
            privacy_status: session.privacy_status.to_string(),
            made_for_kids: session.made_for_kids,
            channel_name: session.channel_name.clone(),
            status: session.status.to_string(),
        })
    }

    pub fn into_domain(self) -> Result<StreamingSession> {
        let privacy_status = PrivacyStatus::from_str(&self.privacy_status).map_err(|_| {
            Error::Other(format!("Unknown privacy status: {}", self.privacy_status))
        })?;
        let status = SessionStatus::from_str(&self.status)
            .map_err(|_| Error::Other(format!("Unknown session status: {}", self.status)))?;

        Ok(StreamingSession {
            session_id: self.session_id,
            start_time: ms_to_datetime(self.start_time),
            end_time: self.end_time.map(ms_to_datetime),
            video_file: self.video_file.into(),
            title: self.title,
            description: self.description,
            tags: serde_json::from_str(&self.tags)?,
            category: self.category,
            privacy_status,
            made_for_kids: self.made_for_kids,
            channel_name: self.channel_name,
            status,
        })
    }
}
