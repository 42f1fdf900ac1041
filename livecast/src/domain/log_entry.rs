//! Session log entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category of a session log entry.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum LogKind {
    Info,
    Error,
    /// A line of encoder output.
    Ffmpeg,
}

/// A persisted log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub kind: LogKind,
    pub message: String,
    pub video_file: Option<String>,
    pub channel_name: Option<String>,
}

/// A log entry waiting to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLogEntry {
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub kind: LogKind,
    pub message: String,
    pub video_file: Option<String>,
    pub channel_name: Option<String>,
}

impl NewLogEntry {
    pub fn new(session_id: impl Into<String>, kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            session_id: session_id.into(),
            kind,
            message: message.into(),
            video_file: None,
            channel_name: None,
        }
    }

    pub fn info(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(session_id, LogKind::Info, message)
    }

    pub fn error(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(session_id, LogKind::Error, message)
    }

    pub fn ffmpeg(session_id: impl Into<String>, line: impl Into<String>) -> Self {
        Self::new(session_id, LogKind::Ffmpeg, line)
    }

    pub fn with_video_file(mut self, video_file: Option<String>) -> Self {
        self.video_file = video_file;
        self
    }

    pub fn with_channel(mut self, channel_name: Option<String>) -> Self {
        self.channel_name = channel_name;
        self
    }

    /// Attach the id assigned by the store.
    pub fn into_entry(self, id: i64) -> LogEntry {
        LogEntry {
            id,
            timestamp: self.timestamp,
            session_id: self.session_id,
            kind: self.kind,
            message: self.message,
            video_file: self.video_file,
            channel_name: self.channel_name,
        }
    }
}

/// Filter criteria for querying log entries.
#[derive(Debug, Clone)]
pub struct LogQuery {
    pub session_id: Option<String>,
    pub kind: Option<LogKind>,
    /// Applied after filtering.
    pub limit: u32,
}

impl Default for LogQuery {
    fn default() -> Self {
        Self {
            session_id: None,
            kind: None,
            limit: 100,
        }
    }
}

impl LogQuery {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_kind(mut self, kind: LogKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn kinds_use_uppercase_names() {
        assert_eq!(LogKind::Ffmpeg.to_string(), "FFMPEG");
        assert_eq!(LogKind::from_str("ERROR").unwrap(), LogKind::Error);
        assert_eq!(
            serde_json::to_string(&LogKind::Info).unwrap(),
            "\"INFO\""
        );
    }
}
