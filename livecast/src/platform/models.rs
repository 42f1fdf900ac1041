//! Platform API request/response shapes.
//!
//! Wire structs mirror only the fields the client reads, all optional, so a
//! missing field becomes a `RemoteRejected` at the point of use rather than a
//! decode failure of the whole body.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::PlatformError;

/// Where the encoder should push media, and the public pages for it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamProvisioning {
    pub stream_id: String,
    pub stream_key: String,
    /// Full push URL including the key.
    pub ingest_url: String,
    /// `None` in stream-key-only mode.
    pub broadcast_id: Option<String>,
    pub watch_url: Option<String>,
    pub studio_url: Option<String>,
}

impl fmt::Debug for StreamProvisioning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamProvisioning")
            .field("stream_id", &self.stream_id)
            .field("stream_key", &"<redacted>")
            .field("broadcast_id", &self.broadcast_id)
            .field("watch_url", &self.watch_url)
            .field("studio_url", &self.studio_url)
            .finish()
    }
}

/// The channel an access token belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub title: String,
}

/// One entry of `list_broadcasts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastSummary {
    pub id: String,
    pub title: String,
    pub privacy_status: Option<String>,
    /// e.g. `created`, `ready`, `live`, `complete`.
    pub life_cycle_status: Option<String>,
    pub scheduled_start_time: Option<DateTime<Utc>>,
    pub watch_url: String,
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

pub fn studio_url(video_id: &str) -> String {
    format!("https://studio.youtube.com/video/{video_id}/livestreaming")
}

fn require(value: Option<String>, what: &str) -> Result<String, PlatformError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PlatformError::missing_field(what))
}

// ---- liveStreams ----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LiveStreamInsert {
    pub snippet: LiveStreamInsertSnippet,
    pub cdn: LiveStreamCdnRequest,
    pub content_details: LiveStreamContentDetailsRequest,
}

#[derive(Debug, Serialize)]
pub(crate) struct LiveStreamInsertSnippet {
    pub title: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LiveStreamCdnRequest {
    pub frame_rate: &'static str,
    pub ingestion_type: &'static str,
    pub resolution: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LiveStreamContentDetailsRequest {
    pub is_reusable: bool,
}

impl LiveStreamInsert {
    pub fn rtmp(title: impl Into<String>) -> Self {
        Self {
            snippet: LiveStreamInsertSnippet {
                title: title.into(),
            },
            cdn: LiveStreamCdnRequest {
                frame_rate: "variable",
                ingestion_type: "rtmp",
                resolution: "variable",
            },
            content_details: LiveStreamContentDetailsRequest { is_reusable: true },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LiveStreamResource {
    pub id: Option<String>,
    pub cdn: Option<LiveStreamCdn>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LiveStreamCdn {
    pub ingestion_info: Option<IngestionInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct IngestionInfo {
    pub stream_name: Option<String>,
    pub ingestion_address: Option<String>,
}

/// Id, key and ingest URL of a created stream.
pub(crate) struct CreatedStream {
    pub id: String,
    pub key: String,
    pub ingest_url: String,
}

impl LiveStreamResource {
    pub fn into_created(self) -> Result<CreatedStream, PlatformError> {
        let id = require(self.id, "liveStream id")?;
        let info = self
            .cdn
            .and_then(|cdn| cdn.ingestion_info)
            .ok_or_else(|| PlatformError::missing_field("cdn.ingestionInfo"))?;
        let key = require(info.stream_name, "ingestionInfo.streamName")?;
        let address = require(info.ingestion_address, "ingestionInfo.ingestionAddress")?;
        let ingest_url = format!("{}/{}", address.trim_end_matches('/'), key);
        Ok(CreatedStream {
            id,
            key,
            ingest_url,
        })
    }
}

// ---- liveBroadcasts ----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LiveBroadcastInsert {
    pub snippet: LiveBroadcastInsertSnippet,
    pub status: LiveBroadcastInsertStatus,
    pub content_details: LiveBroadcastInsertContentDetails,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LiveBroadcastInsertSnippet {
    pub title: String,
    pub description: String,
    pub scheduled_start_time: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LiveBroadcastInsertStatus {
    pub privacy_status: String,
    pub self_declared_made_for_kids: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LiveBroadcastInsertContentDetails {
    pub enable_auto_start: bool,
    pub enable_auto_stop: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LiveBroadcastResource {
    pub id: Option<String>,
    pub snippet: Option<LiveBroadcastSnippet>,
    pub status: Option<LiveBroadcastStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LiveBroadcastSnippet {
    pub title: Option<String>,
    pub scheduled_start_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LiveBroadcastStatus {
    pub privacy_status: Option<String>,
    pub life_cycle_status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

impl LiveBroadcastResource {
    pub fn into_summary(self) -> Result<BroadcastSummary, PlatformError> {
        let id = require(self.id, "liveBroadcast id")?;
        let (title, scheduled_start_time) = match self.snippet {
            Some(snippet) => (snippet.title.unwrap_or_default(), snippet.scheduled_start_time),
            None => (String::new(), None),
        };
        let (privacy_status, life_cycle_status) = match self.status {
            Some(status) => (status.privacy_status, status.life_cycle_status),
            None => (None, None),
        };
        Ok(BroadcastSummary {
            watch_url: watch_url(&id),
            id,
            title,
            privacy_status,
            life_cycle_status,
            scheduled_start_time,
        })
    }
}

// ---- videos ----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VideoSnippetUpdate {
    pub id: String,
    pub snippet: VideoSnippet,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VideoSnippet {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
}

// ---- channels ----

#[derive(Debug, Deserialize)]
pub(crate) struct ChannelResource {
    pub id: Option<String>,
    pub snippet: Option<ChannelSnippet>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChannelSnippet {
    pub title: Option<String>,
}

impl ChannelResource {
    pub fn into_info(self) -> Result<ChannelInfo, PlatformError> {
        let id = require(self.id, "channel id")?;
        let title = self
            .snippet
            .and_then(|s| s.title)
            .unwrap_or_else(|| id.clone());
        Ok(ChannelInfo { id, title })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_stream_builds_ingest_url() {
        let resource: LiveStreamResource = serde_json::from_str(
            r#"{"id":"s1","cdn":{"ingestionInfo":{"streamName":"abcd-1234","ingestionAddress":"rtmp://ingest/live2/"}}}"#,
        )
        .unwrap();
        let created = resource.into_created().unwrap();
        assert_eq!(created.key, "abcd-1234");
        assert_eq!(created.ingest_url, "rtmp://ingest/live2/abcd-1234");
    }

    #[test]
    fn missing_stream_key_is_rejected() {
        let resource: LiveStreamResource =
            serde_json::from_str(r#"{"id":"s1","cdn":{"ingestionInfo":{}}}"#).unwrap();
        assert!(matches!(
            resource.into_created(),
            Err(PlatformError::RemoteRejected { .. })
        ));
    }

    #[test]
    fn broadcast_summary_tolerates_sparse_items() {
        let resource: LiveBroadcastResource = serde_json::from_str(r#"{"id":"b1"}"#).unwrap();
        let summary = resource.into_summary().unwrap();
        assert_eq!(summary.watch_url, "https://www.youtube.com/watch?v=b1");
        assert!(summary.life_cycle_status.is_none());
    }

    #[test]
    fn provisioning_debug_hides_key() {
        let result = StreamProvisioning {
            stream_id: "s1".into(),
            stream_key: "abcd-1234".into(),
            ingest_url: "rtmp://ingest/abcd-1234".into(),
            broadcast_id: None,
            watch_url: None,
            studio_url: None,
        };
        assert!(!format!("{result:?}").contains("abcd-1234"));
    }
}
