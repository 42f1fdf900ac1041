//! Credential store repository (SQLx).
//!
//! This is the database-backed persistence implementation for the credentials subsystem.

use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

use crate::credentials::CredentialStore;
use crate::database::models::ChannelCredentialDbModel;
use crate::database::time::now_ms;
use crate::domain::{AuthMaterial, ChannelCredential};
use crate::{Error, Result};

/// SQLx-backed credential store.
pub struct SqlxCredentialStore {
    pool: SqlitePool,
}

impl SqlxCredentialStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for SqlxCredentialStore {
    #[instrument(skip(self, auth_material), fields(channel = %channel_name))]
    async fn save(
        &self,
        channel_name: &str,
        channel_id: &str,
        auth_material: &AuthMaterial,
    ) -> Result<()> {
        let now = now_ms();
        let material = serde_json::to_string(auth_material)?;

        sqlx::query(
            r#"
            INSERT INTO channel_credentials (channel_name, channel_id, auth_material, created_at, last_used_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(channel_name) DO UPDATE SET
                channel_id = excluded.channel_id,
                auth_material = excluded.auth_material,
                last_used_at = excluded.last_used_at
            "#,
        )
        .bind(channel_name)
        .bind(channel_id)
        .bind(material)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!("Channel credentials saved");
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<ChannelCredential>> {
        let rows = sqlx::query_as::<_, ChannelCredentialDbModel>(
            r#"
            SELECT channel_name, channel_id, auth_material, created_at, last_used_at
            FROM channel_credentials
            ORDER BY last_used_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(ChannelCredentialDbModel::into_domain)
            .collect()
    }

    async fn find(&self, channel_name: &str) -> Result<Option<ChannelCredential>> {
        sqlx::query_as::<_, ChannelCredentialDbModel>(
            r#"
            SELECT channel_name, channel_id, auth_material, created_at, last_used_at
            FROM channel_credentials
            WHERE channel_name = ?
            "#,
        )
        .bind(channel_name)
        .fetch_optional(&self.pool)
        .await?
        .map(ChannelCredentialDbModel::into_domain)
        .transpose()
    }

    #[instrument(skip(self), fields(channel = %channel_name))]
    async fn touch(&self, channel_name: &str) -> Result<()> {
        let result =
            sqlx::query("UPDATE channel_credentials SET last_used_at = ? WHERE channel_name = ?")
                .bind(now_ms())
                .bind(channel_name)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("ChannelCredential", channel_name));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;
    use crate::domain::AuthMaterial;

    fn material(token: &str) -> AuthMaterial {
        AuthMaterial {
            access_token: token.to_string(),
            refresh_token: Some("refresh".to_string()),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            scopes: vec!["https://www.googleapis.com/auth/youtube".to_string()],
            expiry: None,
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = SqlxCredentialStore::new(test_pool().await);
        store.save("demo", "UC123", &material("a")).await.unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].channel_name, "demo");
        assert_eq!(all[0].channel_id, "UC123");
        assert_eq!(all[0].auth_material, material("a"));
    }

    #[tokio::test]
    async fn save_replaces_existing_channel() {
        let store = SqlxCredentialStore::new(test_pool().await);
        store.save("demo", "UC123", &material("old")).await.unwrap();
        let first = store.find("demo").await.unwrap().unwrap();

        store.save("demo", "UC456", &material("new")).await.unwrap();

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].channel_id, "UC456");
        assert_eq!(all[0].auth_material.access_token, "new");
        assert_eq!(all[0].created_at, first.created_at);
    }

    #[tokio::test]
    async fn load_all_orders_by_last_use() {
        let store = SqlxCredentialStore::new(test_pool().await);
        store.save("first", "UC1", &material("a")).await.unwrap();
        store.save("second", "UC2", &material("b")).await.unwrap();

        // Force distinct timestamps regardless of clock resolution.
        sqlx::query("UPDATE channel_credentials SET last_used_at = 1000 WHERE channel_name = 'second'")
            .execute(&store.pool)
            .await
            .unwrap();
        store.touch("first").await.unwrap();

        let names: Vec<String> = store
            .load_all()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.channel_name)
            .collect();
        assert_eq!(names, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn touch_unknown_channel_is_not_found() {
        let store = SqlxCredentialStore::new(test_pool().await);
        let err = store.touch("missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }
}
