//! Session log store.
//!
//! Append-only structured log plus the session registry, queryable by
//! session id, log kind and limit. Appended entries are also pushed to
//! subscribers so a viewer can follow a session live instead of polling.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

use crate::Result;
use crate::database::DbPool;
use crate::database::repositories::{
    LogRepository, SessionRepository, SqlxLogRepository, SqlxSessionRepository,
};
use crate::domain::{LogEntry, LogQuery, NewLogEntry, StreamingSession};

/// Broadcast channel capacity for live log entries.
const LOG_BROADCAST_CAPACITY: usize = 1024;

/// Handle to the session log store. Cheap to clone.
#[derive(Clone)]
pub struct SessionLog {
    logs: Arc<dyn LogRepository>,
    sessions: Arc<dyn SessionRepository>,
    live_tx: broadcast::Sender<LogEntry>,
}

impl SessionLog {
    pub fn new(logs: Arc<dyn LogRepository>, sessions: Arc<dyn SessionRepository>) -> Self {
        let (live_tx, _) = broadcast::channel(LOG_BROADCAST_CAPACITY);
        Self {
            logs,
            sessions,
            live_tx,
        }
    }

    /// Store backed by the SQLx repositories.
    pub fn from_pool(pool: DbPool) -> Self {
        Self::new(
            Arc::new(SqlxLogRepository::new(pool.clone())),
            Arc::new(SqlxSessionRepository::new(pool)),
        )
    }

    /// Append an entry, returning it with its assigned id.
    pub async fn append(&self, entry: NewLogEntry) -> Result<LogEntry> {
        let id = self.logs.append(&entry).await?;
        let stored = entry.into_entry(id);
        // No subscribers is not an error.
        let _ = self.live_tx.send(stored.clone());
        Ok(stored)
    }

    /// Append an entry, logging and swallowing any persistence failure.
    pub async fn record(&self, entry: NewLogEntry) {
        let session_id = entry.session_id.clone();
        if let Err(e) = self.append(entry).await {
            warn!(session_id = %session_id, error = %e, "Failed to persist session log entry");
        }
    }

    /// Entries matching `query`, newest first.
    pub async fn query(&self, query: &LogQuery) -> Result<Vec<LogEntry>> {
        self.logs.query(query).await
    }

    /// Receive every entry appended from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.live_tx.subscribe()
    }

    pub async fn save_session(&self, session: &StreamingSession) -> Result<()> {
        self.sessions.save_session(session).await
    }

    pub async fn end_session(&self, session_id: &str, end_time: DateTime<Utc>) -> Result<()> {
        self.sessions.end_session(session_id, end_time).await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<StreamingSession> {
        self.sessions.get_session(session_id).await
    }

    /// Most recently started first.
    pub async fn list_sessions(&self, limit: u32) -> Result<Vec<StreamingSession>> {
        self.sessions.list_sessions(limit).await
    }
}
