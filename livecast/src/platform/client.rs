//! Typed client for the live streaming API and the OAuth token endpoint.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::PlatformError;
use super::http::build_client;
use super::models::{
    BroadcastSummary, ChannelInfo, ChannelResource, CreatedStream, ListResponse,
    LiveBroadcastInsert, LiveBroadcastInsertContentDetails, LiveBroadcastInsertSnippet,
    LiveBroadcastInsertStatus, LiveBroadcastResource, LiveStreamInsert, LiveStreamResource,
    StreamProvisioning, VideoSnippet, VideoSnippetUpdate, studio_url, watch_url,
};
use super::oauth::{OAuthConfig, TokenResponse};
use crate::domain::{AuthMaterial, BroadcastMetadata};

pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Category applied when the metadata names none ("People & Blogs").
pub const DEFAULT_CATEGORY_ID: &str = "22";

/// Upper bound the API accepts for `maxResults`.
const MAX_LIST_RESULTS: u32 = 50;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Remote platform operations used by the orchestrator.
///
/// Every call is a single attempt; failures are returned, never retried.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Exchange a one-time authorization code for a token bundle.
    async fn exchange_code(
        &self,
        config: &OAuthConfig,
        code: &str,
    ) -> Result<AuthMaterial, PlatformError>;

    /// Obtain a fresh access token using the stored refresh token.
    async fn refresh_access_token(
        &self,
        auth: &AuthMaterial,
    ) -> Result<AuthMaterial, PlatformError>;

    /// The channel the credentials belong to.
    async fn own_channel(&self, auth: &AuthMaterial) -> Result<ChannelInfo, PlatformError>;

    /// Create a bare ingest endpoint without a public broadcast.
    async fn provision_stream_key(
        &self,
        auth: &AuthMaterial,
    ) -> Result<StreamProvisioning, PlatformError>;

    /// Create an ingest stream and a broadcast and bind them together.
    async fn provision_broadcast(
        &self,
        auth: &AuthMaterial,
        metadata: &BroadcastMetadata,
        scheduled_start: DateTime<Utc>,
    ) -> Result<StreamProvisioning, PlatformError>;

    async fn list_broadcasts(
        &self,
        auth: &AuthMaterial,
        max_results: u32,
    ) -> Result<Vec<BroadcastSummary>, PlatformError>;
}

/// HTTP implementation of [`PlatformApi`].
#[derive(Debug, Clone)]
pub struct PlatformClient {
    http: reqwest::Client,
    api_base: String,
}

impl PlatformClient {
    pub fn new() -> Result<Self, PlatformError> {
        Self::with_api_base(DEFAULT_API_BASE)
    }

    pub fn with_api_base(api_base: impl Into<String>) -> Result<Self, PlatformError> {
        Ok(Self::with_client(
            build_client(DEFAULT_REQUEST_TIMEOUT)?,
            api_base,
        ))
    }

    pub fn with_client(http: reqwest::Client, api_base: impl Into<String>) -> Self {
        Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, PlatformError> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        if !(200..300).contains(&status) {
            return Err(PlatformError::from_api_response(status, &body));
        }
        serde_json::from_str(&body).map_err(|e| PlatformError::RemoteRejected {
            status,
            message: format!("undecodable response: {e}"),
        })
    }

    async fn token_request(
        &self,
        token_uri: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, PlatformError> {
        let response = self.http.post(token_uri).form(form).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        if !(200..300).contains(&status) {
            return Err(PlatformError::from_token_response(status, &body));
        }
        serde_json::from_str(&body).map_err(|e| PlatformError::RemoteRejected {
            status,
            message: format!("undecodable token response: {e}"),
        })
    }

    async fn create_stream(
        &self,
        auth: &AuthMaterial,
        title: &str,
    ) -> Result<CreatedStream, PlatformError> {
        let request = self
            .http
            .post(self.url("liveStreams"))
            .bearer_auth(&auth.access_token)
            .query(&[("part", "snippet,cdn,contentDetails,status")])
            .json(&LiveStreamInsert::rtmp(title));
        let resource: LiveStreamResource = self.send_json(request).await?;
        resource.into_created()
    }

    async fn create_broadcast(
        &self,
        auth: &AuthMaterial,
        metadata: &BroadcastMetadata,
        scheduled_start: DateTime<Utc>,
    ) -> Result<String, PlatformError> {
        let body = LiveBroadcastInsert {
            snippet: LiveBroadcastInsertSnippet {
                title: metadata.title.clone(),
                description: metadata.description.clone(),
                scheduled_start_time: scheduled_start.to_rfc3339_opts(SecondsFormat::Secs, true),
            },
            status: LiveBroadcastInsertStatus {
                privacy_status: metadata.privacy.to_string(),
                self_declared_made_for_kids: metadata.made_for_kids,
            },
            content_details: LiveBroadcastInsertContentDetails {
                enable_auto_start: true,
                enable_auto_stop: true,
            },
        };
        let request = self
            .http
            .post(self.url("liveBroadcasts"))
            .bearer_auth(&auth.access_token)
            .query(&[("part", "snippet,status,contentDetails")])
            .json(&body);
        let resource: LiveBroadcastResource = self.send_json(request).await?;
        resource
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| PlatformError::missing_field("liveBroadcast id"))
    }

    async fn bind(
        &self,
        auth: &AuthMaterial,
        broadcast_id: &str,
        stream_id: &str,
    ) -> Result<(), PlatformError> {
        let request = self
            .http
            .post(self.url("liveBroadcasts/bind"))
            .bearer_auth(&auth.access_token)
            .query(&[
                ("id", broadcast_id),
                ("part", "id,contentDetails"),
                ("streamId", stream_id),
            ]);
        let _: serde_json::Value = self.send_json(request).await?;
        Ok(())
    }

    /// Apply tags and category to the broadcast's video.
    async fn update_video_snippet(
        &self,
        auth: &AuthMaterial,
        video_id: &str,
        metadata: &BroadcastMetadata,
    ) -> Result<(), PlatformError> {
        let body = VideoSnippetUpdate {
            id: video_id.to_string(),
            snippet: VideoSnippet {
                title: metadata.title.clone(),
                description: metadata.description.clone(),
                tags: metadata.tags.clone(),
                category_id: metadata
                    .category
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CATEGORY_ID.to_string()),
            },
        };
        let request = self
            .http
            .put(self.url("videos"))
            .bearer_auth(&auth.access_token)
            .query(&[("part", "snippet")])
            .json(&body);
        let _: serde_json::Value = self.send_json(request).await?;
        Ok(())
    }
}

#[async_trait]
impl PlatformApi for PlatformClient {
    async fn exchange_code(
        &self,
        config: &OAuthConfig,
        code: &str,
    ) -> Result<AuthMaterial, PlatformError> {
        config.validate()?;
        if code.trim().is_empty() {
            return Err(PlatformError::ConfigInvalid(
                "authorization code is empty".to_string(),
            ));
        }

        let token = self
            .token_request(
                &config.token_uri,
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code.trim()),
                    ("client_id", config.client_id.as_str()),
                    ("client_secret", config.client_secret.as_str()),
                    ("redirect_uri", config.redirect_uri.as_str()),
                ],
            )
            .await?;

        let mut material = token.into_auth_material(
            &config.client_id,
            &config.client_secret,
            &config.token_uri,
            None,
        );
        if material.scopes.is_empty() {
            material.scopes = config.scopes.clone();
        }
        debug!(client_id = %config.client_id, "Authorization code exchanged");
        Ok(material)
    }

    async fn refresh_access_token(
        &self,
        auth: &AuthMaterial,
    ) -> Result<AuthMaterial, PlatformError> {
        let refresh_token = auth
            .refresh_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PlatformError::AuthExpired("no refresh token stored".to_string()))?;

        let token = self
            .token_request(
                &auth.token_uri,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                    ("client_id", auth.client_id.as_str()),
                    ("client_secret", auth.client_secret.as_str()),
                ],
            )
            .await?;

        let mut material = token.into_auth_material(
            &auth.client_id,
            &auth.client_secret,
            &auth.token_uri,
            auth.refresh_token.clone(),
        );
        if material.scopes.is_empty() {
            material.scopes = auth.scopes.clone();
        }
        Ok(material)
    }

    async fn own_channel(&self, auth: &AuthMaterial) -> Result<ChannelInfo, PlatformError> {
        let request = self
            .http
            .get(self.url("channels"))
            .bearer_auth(&auth.access_token)
            .query(&[("part", "snippet"), ("mine", "true")]);
        let list: ListResponse<ChannelResource> = self.send_json(request).await?;
        list.items
            .into_iter()
            .next()
            .ok_or_else(|| PlatformError::missing_field("channel for these credentials"))?
            .into_info()
    }

    async fn provision_stream_key(
        &self,
        auth: &AuthMaterial,
    ) -> Result<StreamProvisioning, PlatformError> {
        let title = format!("livecast {}", Utc::now().format("%Y-%m-%d %H:%M:%S"));
        let stream = self.create_stream(auth, &title).await?;
        info!(stream_id = %stream.id, "Ingest stream created");
        Ok(StreamProvisioning {
            stream_id: stream.id,
            stream_key: stream.key,
            ingest_url: stream.ingest_url,
            broadcast_id: None,
            watch_url: None,
            studio_url: None,
        })
    }

    async fn provision_broadcast(
        &self,
        auth: &AuthMaterial,
        metadata: &BroadcastMetadata,
        scheduled_start: DateTime<Utc>,
    ) -> Result<StreamProvisioning, PlatformError> {
        let stream = self.create_stream(auth, &metadata.title).await?;

        let broadcast_id = match self.create_broadcast(auth, metadata, scheduled_start).await {
            Ok(id) => id,
            Err(e) => {
                warn!(stream_id = %stream.id, error = %e, "Broadcast creation failed; ingest stream left unbound");
                return Err(e);
            }
        };

        if let Err(e) = self.bind(auth, &broadcast_id, &stream.id).await {
            warn!(
                stream_id = %stream.id,
                broadcast_id = %broadcast_id,
                error = %e,
                "Binding stream to broadcast failed"
            );
            return Err(e);
        }

        if (!metadata.tags.is_empty() || metadata.category.is_some())
            && let Err(e) = self
                .update_video_snippet(auth, &broadcast_id, metadata)
                .await
        {
            warn!(broadcast_id = %broadcast_id, error = %e, "Could not apply tags/category to broadcast");
        }

        info!(
            stream_id = %stream.id,
            broadcast_id = %broadcast_id,
            scheduled_start = %scheduled_start,
            "Broadcast provisioned"
        );
        Ok(StreamProvisioning {
            stream_id: stream.id,
            stream_key: stream.key,
            ingest_url: stream.ingest_url,
            watch_url: Some(watch_url(&broadcast_id)),
            studio_url: Some(studio_url(&broadcast_id)),
            broadcast_id: Some(broadcast_id),
        })
    }

    async fn list_broadcasts(
        &self,
        auth: &AuthMaterial,
        max_results: u32,
    ) -> Result<Vec<BroadcastSummary>, PlatformError> {
        let max_results = max_results.clamp(1, MAX_LIST_RESULTS).to_string();
        let request = self
            .http
            .get(self.url("liveBroadcasts"))
            .bearer_auth(&auth.access_token)
            .query(&[
                ("part", "id,snippet,status"),
                ("mine", "true"),
                ("maxResults", max_results.as_str()),
            ]);
        let list: ListResponse<LiveBroadcastResource> = self.send_json(request).await?;
        list.items
            .into_iter()
            .map(LiveBroadcastResource::into_summary)
            .collect()
    }
}
