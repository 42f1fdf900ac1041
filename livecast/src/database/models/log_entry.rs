//! Session log database model.

use sqlx::FromRow;
use std::str::FromStr;

use crate::database::time::ms_to_datetime;
use crate::domain::{LogEntry, LogKind};
use crate::{Error, Result};

/// Row of `session_logs`.
#[derive(Debug, Clone, FromRow)]
pub struct LogEntryDbModel {
    pub id: i64,
    pub timestamp: i64,
    pub session_id: String,
    /// INFO, ERROR, FFMPEG
    pub kind: String,
    pub message: String,
    pub video_file: Option<String>,
    pub channel_name: Option<String>,
}

impl LogEntryDbModel {
    pub fn into_domain(self) -> Result<LogEntry> {
        let kind = LogKind::from_str(&self.kind)
            .map_err(|_| Error::Other(format!("Unknown log kind: {}", self.kind)))?;
        Ok(LogEntry {
            id: self.id,
            timestamp: ms_to_datetime(self.timestamp),
            session_id: self.session_id,
            kind,
            message: self.message,
            video_file: self.video_file,
            channel_name: self.channel_name,
        })
    }
}
