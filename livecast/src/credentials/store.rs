//! Credential persistence abstraction.
//!
//! The concrete SQL implementation lives in the database repository layer.

use async_trait::async_trait;

use crate::Result;
use crate::domain::{AuthMaterial, ChannelCredential};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert or replace the credential saved under `channel_name`.
    ///
    /// A new row gets both timestamps; a replaced row keeps `created_at`
    /// and has its `last_used_at` refreshed.
    async fn save(
        &self,
        channel_name: &str,
        channel_id: &str,
        auth_material: &AuthMaterial,
    ) -> Result<()>;

    /// All saved channels, most recently used first.
    async fn load_all(&self) -> Result<Vec<ChannelCredential>>;

    /// Look up one channel by name.
    async fn find(&self, channel_name: &str) -> Result<Option<ChannelCredential>>;

    /// Mark a channel as used now.
    async fn touch(&self, channel_name: &str) -> Result<()>;
}
