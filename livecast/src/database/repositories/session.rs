//! Session repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::database::models::StreamingSessionDbModel;
use crate::domain::{SessionStatus, StreamingSession};
use crate::{Error, Result};

/// Session repository trait.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert or replace a session by id.
    async fn save_session(&self, session: &StreamingSession) -> Result<()>;
    /// Mark a session ended at `end_time`.
    async fn end_session(&self, session_id: &str, end_time: DateTime<Utc>) -> Result<()>;
    async fn get_session(&self, session_id: &str) -> Result<StreamingSession>;
    /// Most recently started first.
    async fn list_sessions(&self, limit: u32) -> Result<Vec<StreamingSession>>;
}

/// SQLx implementation of SessionRepository.
pub struct SqlxSessionRepository {
    pool: SqlitePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn save_session(&self, session: &StreamingSession) -> Result<()> {
        let row = StreamingSessionDbModel::from_domain(session)?;
        sqlx::query(
            r#"
            INSERT INTO streaming_sessions (
                session_id, start_time, end_time, video_file, title, description,
                tags, category, privacy_status, made_for_kids, channel_name, status
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                start_time = excluded.start_time,
                end_time = excluded.end_time,
                video_file = excluded.video_file,
                title = excluded.title,
                description = excluded.description,
                tags = excluded.tags,
                category = excluded.category,
                privacy_status = excluded.privacy_status,
                made_for_kids = excluded.made_for_kids,
                channel_name = excluded.channel_name,
                status = excluded.status
            "#,
        )
        .bind(&row.session_id)
        .bind(row.start_time)
        .bind(row.end_time)
        .bind(&row.video_file)
        .bind(&row.title)
        .bind(&row.description)
        .bind(&row.tags)
        .bind(&row.category)
        .bind(&row.privacy_status)
        .bind(row.made_for_kids)
        .bind(&row.channel_name)
        .bind(&row.status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn end_session(&self, session_id: &str, end_time: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE streaming_sessions SET end_time = ?, status = ? WHERE session_id = ?",
        )
        .bind(end_time.timestamp_millis())
        .bind(SessionStatus::Ended.as_ref())
        .bind(session_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("StreamingSession", session_id));
        }
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<StreamingSession> {
        sqlx::query_as::<_, StreamingSessionDbModel>(
            "SELECT * FROM streaming_sessions WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found("StreamingSession", session_id))?
        .into_domain()
    }

    async fn list_sessions(&self, limit: u32) -> Result<Vec<StreamingSession>> {
        let rows = sqlx::query_as::<_, StreamingSessionDbModel>(
            "SELECT * FROM streaming_sessions ORDER BY start_time DESC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(StreamingSessionDbModel::into_domain)
            .collect()
    }
}
