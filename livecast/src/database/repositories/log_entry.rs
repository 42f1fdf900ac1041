//! Session log repository.

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::Result;
use crate::database::models::LogEntryDbModel;
use crate::domain::{LogEntry, LogQuery, NewLogEntry};

/// Log repository trait.
#[async_trait]
pub trait LogRepository: Send + Sync {
    /// Append an entry and return its id.
    async fn append(&self, entry: &NewLogEntry) -> Result<i64>;
    /// Newest first, `limit` applied after filtering.
    async fn query(&self, query: &LogQuery) -> Result<Vec<LogEntry>>;
}

/// SQLx implementation of LogRepository.
pub struct SqlxLogRepository {
    pool: SqlitePool,
}

impl SqlxLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LogRepository for SqlxLogRepository {
    async fn append(&self, entry: &NewLogEntry) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO session_logs (timestamp, session_id, kind, message, video_file, channel_name)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.timestamp.timestamp_millis())
        .bind(&entry.session_id)
        .bind(entry.kind.as_ref())
        .bind(&entry.message)
        .bind(&entry.video_file)
        .bind(&entry.channel_name)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn query(&self, query: &LogQuery) -> Result<Vec<LogEntry>> {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT id, timestamp, session_id, kind, message, video_file, channel_name FROM session_logs WHERE 1 = 1",
        );
        if let Some(session_id) = &query.session_id {
            builder.push(" AND session_id = ").push_bind(session_id.clone());
        }
        if let Some(kind) = query.kind {
            builder.push(" AND kind = ").push_bind(kind.to_string());
        }
        // id breaks ties between entries written in the same millisecond.
        builder
            .push(" ORDER BY timestamp DESC, id DESC LIMIT ")
            .push_bind(i64::from(query.limit));

        let rows = builder
            .build_query_as::<LogEntryDbModel>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(LogEntryDbModel::into_domain).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;
    use crate::domain::LogKind;

    async fn seeded() -> SqlxLogRepository {
        let repo = SqlxLogRepository::new(test_pool().await);
        for i in 0..8 {
            let session = if i % 2 == 0 { "s1" } else { "s2" };
            let entry = if i % 3 == 0 {
                NewLogEntry::info(session, format!("info {i}"))
            } else {
                NewLogEntry::ffmpeg(session, format!("line {i}"))
            };
            repo.append(&entry).await.unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn query_filters_by_session_newest_first() {
        let repo = seeded().await;
        let entries = repo
            .query(&LogQuery::new(10).with_session_id("s1"))
            .await
            .unwrap();

        assert_eq!(entries.len(), 4);
        assert!(entries.iter().all(|e| e.session_id == "s1"));
        let ids: Vec<i64> = entries.iter().map(|e| e.id).collect();
        let mut sorted = ids.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(ids, sorted);
    }

    #[tokio::test]
    async fn limit_applies_after_filtering() {
        let repo = seeded().await;
        let entries = repo
            .query(&LogQuery::new(2).with_session_id("s2").with_kind(LogKind::Ffmpeg))
            .await
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert!(
            entries
                .iter()
                .all(|e| e.session_id == "s2" && e.kind == LogKind::Ffmpeg)
        );
        assert_eq!(entries[0].message, "line 7");
    }

    #[tokio::test]
    async fn append_keeps_optional_fields() {
        let repo = SqlxLogRepository::new(test_pool().await);
        let entry = NewLogEntry::error("s1", "boom")
            .with_video_file(Some("clip.mp4".to_string()))
            .with_channel(Some("demo".to_string()));
        let id = repo.append(&entry).await.unwrap();

        let stored = repo.query(&LogQuery::default()).await.unwrap();
        assert_eq!(stored[0].id, id);
        assert_eq!(stored[0].video_file.as_deref(), Some("clip.mp4"));
        assert_eq!(stored[0].channel_name.as_deref(), Some("demo"));
    }
}
