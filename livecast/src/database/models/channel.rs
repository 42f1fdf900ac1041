//! Channel credential database model.

use sqlx::FromRow;

use crate::Result;
use crate::database::time::ms_to_datetime;
use crate::domain::{AuthMaterial, ChannelCredential};

/// Row of `channel_credentials`.
#[derive(Debug, Clone, FromRow)]
pub struct ChannelCredentialDbModel {
    pub channel_name: String,
    pub channel_id: String,
    /// JSON-encoded [`AuthMaterial`]
    pub auth_material: String,
    /// Unix epoch milliseconds
    pub created_at: i64,
    /// Unix epoch milliseconds
    pub last_used_at: i64,
}

impl ChannelCredentialDbModel {
    pub fn into_domain(self) -> Result<ChannelCredential> {
        let auth_material: AuthMaterial = serde_json::from_str(&self.auth_material)?;
        Ok(ChannelCredential {
            channel_name: self.channel_name,
            channel_id: self.channel_id,
            auth_material,
            created_at: ms_to_datetime(self.created_at),
            last_used_at: ms_to_datetime(self.last_used_at),
        })
    }
}
