//! Remote video platform client.
//!
//! - [`PlatformApi`]: the operations the orchestrator depends on.
//! - [`PlatformClient`]: reqwest implementation against the live streaming API.
//! - [`OAuthConfig`]: client settings and authorization URL builder.

mod client;
mod error;
pub mod http;
pub mod models;
pub mod oauth;

#[cfg(test)]
pub use client::MockPlatformApi;
pub use client::{DEFAULT_API_BASE, DEFAULT_CATEGORY_ID, PlatformApi, PlatformClient};
pub use error::PlatformError;
pub use models::{BroadcastSummary, ChannelInfo, StreamProvisioning};
pub use oauth::{OAuthConfig, TokenResponse};
