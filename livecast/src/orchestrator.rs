//! Session orchestrator.
//!
//! Ties credentials, provisioning and the encoder to one session id and
//! holds the single active-session slot:
//!
//! `Idle -> Provisioning -> Streaming -> Idle` (on stop or process exit),
//! `Provisioning -> Idle` when provisioning fails.

use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tracing::{error, info, instrument, warn};

use crate::config::{EncoderConfig, OrchestratorConfig, ProvisioningMode};
use crate::credentials::CredentialStore;
use crate::domain::{
    AuthMaterial, BroadcastMetadata, ChannelCredential, LogEntry, LogQuery, StreamingSession,
};
use crate::encoder::{EncodeRequest, EncoderHandle, EncoderSupervisor, LineSink};
use crate::platform::{BroadcastSummary, OAuthConfig, PlatformApi, StreamProvisioning};
use crate::session_log::SessionLog;
use crate::{Error, Result};
use process_utils::ProcessExit;

/// Where a session's media goes.
#[derive(Clone, PartialEq, Eq)]
pub enum StreamTarget {
    /// Bare ingest endpoint on the channel, no public broadcast.
    StreamKey,
    /// Scheduled broadcast bound to a new ingest endpoint.
    Broadcast,
    /// Caller-supplied `rtmp://`/`rtmps://` URL; nothing is provisioned.
    CustomUrl(String),
}

impl std::fmt::Debug for StreamTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StreamKey => write!(f, "StreamKey"),
            Self::Broadcast => write!(f, "Broadcast"),
            Self::CustomUrl(_) => write!(f, "CustomUrl(<redacted>)"),
        }
    }
}

impl From<ProvisioningMode> for StreamTarget {
    fn from(mode: ProvisioningMode) -> Self {
        match mode {
            ProvisioningMode::StreamKey => Self::StreamKey,
            ProvisioningMode::Broadcast => Self::Broadcast,
        }
    }
}

/// Parameters for starting a session.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    /// Required unless the target is a custom URL.
    pub channel_name: Option<String>,
    pub video_file: PathBuf,
    pub metadata: BroadcastMetadata,
    /// `None` uses the configured default mode.
    pub target: Option<StreamTarget>,
    pub vertical: bool,
}

impl StreamRequest {
    pub fn new(video_file: impl Into<PathBuf>, metadata: BroadcastMetadata) -> Self {
        Self {
            channel_name: None,
            video_file: video_file.into(),
            metadata,
            target: None,
            vertical: false,
        }
    }

    pub fn with_channel(mut self, channel_name: impl Into<String>) -> Self {
        self.channel_name = Some(channel_name.into());
        self
    }

    pub fn with_target(mut self, target: StreamTarget) -> Self {
        self.target = Some(target);
        self
    }

    pub fn vertical(mut self, vertical: bool) -> Self {
        self.vertical = vertical;
        self
    }
}

/// Observable orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum OrchestratorState {
    Idle,
    Provisioning,
    Streaming,
}

/// The session currently holding the slot.
#[derive(Debug, Clone)]
pub struct ActiveStream {
    pub session: StreamingSession,
    /// `None` for custom URL targets.
    pub provisioning: Option<StreamProvisioning>,
    pub handle: EncoderHandle,
}

#[derive(Debug)]
enum Slot {
    Idle,
    /// Held by the `start` call in flight; a dropped call leaves it dead.
    Provisioning(Weak<()>),
    Streaming(Box<ActiveStream>),
}

pub struct SessionOrchestrator {
    credentials: Arc<dyn CredentialStore>,
    platform: Arc<dyn PlatformApi>,
    log: SessionLog,
    supervisor: EncoderSupervisor,
    oauth: Option<OAuthConfig>,
    config: OrchestratorConfig,
    /// Channels authorized or refreshed in this process, usable even if
    /// saving them failed.
    authorized: HashMap<String, ChannelCredential>,
    slot: Slot,
}

impl SessionOrchestrator {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        platform: Arc<dyn PlatformApi>,
        log: SessionLog,
        encoder: EncoderConfig,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            credentials,
            platform,
            supervisor: EncoderSupervisor::new(encoder, log.clone()),
            log,
            oauth: None,
            config,
            authorized: HashMap::new(),
            slot: Slot::Idle,
        }
    }

    pub fn with_oauth(mut self, oauth: OAuthConfig) -> Self {
        self.oauth = Some(oauth);
        self
    }

    pub fn state(&self) -> OrchestratorState {
        match &self.slot {
            Slot::Idle => OrchestratorState::Idle,
            Slot::Provisioning(start) if start.strong_count() > 0 => {
                OrchestratorState::Provisioning
            }
            Slot::Provisioning(_) => OrchestratorState::Idle,
            Slot::Streaming(active) if active.handle.is_finished() => OrchestratorState::Idle,
            Slot::Streaming(_) => OrchestratorState::Streaming,
        }
    }

    /// The running session, if its encoder has not exited yet.
    pub fn active(&self) -> Option<&ActiveStream> {
        match &self.slot {
            Slot::Streaming(active) if !active.handle.is_finished() => Some(active),
            _ => None,
        }
    }

    /// Provision an ingest endpoint and start encoding `request.video_file`.
    ///
    /// Every encoder output line goes to `sink` (if given) and the session
    /// log. Fails with `SessionAlreadyActive` while another session streams.
    #[instrument(skip_all, fields(channel = ?request.channel_name, video = %request.video_file.display()))]
    pub async fn start(
        &mut self,
        request: StreamRequest,
        sink: Option<LineSink>,
    ) -> Result<ActiveStream> {
        if let Slot::Streaming(active) = &self.slot
            && !active.handle.is_finished()
        {
            return Err(Error::SessionAlreadyActive {
                session_id: active.session.session_id.clone(),
            });
        }

        let in_flight = Arc::new(());
        self.slot = Slot::Provisioning(Arc::downgrade(&in_flight));
        match self.launch(request, sink).await {
            Ok(active) => {
                self.slot = Slot::Streaming(Box::new(active.clone()));
                Ok(active)
            }
            Err(e) => {
                self.slot = Slot::Idle;
                error!(error = %e, kind = %e.kind(), "Stream start failed");
                Err(e)
            }
        }
    }

    async fn launch(&mut self, request: StreamRequest, sink: Option<LineSink>) -> Result<ActiveStream> {
        if !tokio::fs::try_exists(&request.video_file).await.unwrap_or(false) {
            return Err(Error::config(format!(
                "video file not found: {}",
                request.video_file.display()
            )));
        }

        let target = request
            .target
            .clone()
            .unwrap_or_else(|| self.config.default_mode.into());

        let (key_or_url, provisioning) = match target {
            StreamTarget::CustomUrl(url) => (url, None),
            mode => {
                let channel = request.channel_name.as_deref().ok_or_else(|| {
                    Error::config("a channel is required to provision a stream")
                })?;
                let auth = self.usable_auth(channel).await?;
                let provisioning = match mode {
                    StreamTarget::Broadcast => {
                        let lead = ChronoDuration::from_std(self.config.broadcast_lead_time)
                            .unwrap_or_else(|_| ChronoDuration::seconds(30));
                        self.platform
                            .provision_broadcast(&auth, &request.metadata, Utc::now() + lead)
                            .await?
                    }
                    _ => self.platform.provision_stream_key(&auth).await?,
                };
                if let Some(url) = &provisioning.watch_url {
                    info!(watch_url = %url, studio_url = ?provisioning.studio_url, "Broadcast ready");
                }
                (provisioning.ingest_url.clone(), Some(provisioning))
            }
        };

        let session = StreamingSession::new(
            request.video_file.clone(),
            &request.metadata,
            request.channel_name.clone(),
        );
        if let Err(e) = self.log.save_session(&session).await {
            warn!(session_id = %session.session_id, error = %e, "Failed to persist session");
        }

        let handle = self
            .supervisor
            .start(
                EncodeRequest {
                    session_id: session.session_id.clone(),
                    video_file: request.video_file,
                    key_or_url,
                    vertical: request.vertical,
                    channel_name: request.channel_name,
                },
                sink,
            )
            .await?;

        info!(session_id = %session.session_id, target = %handle.redacted_target(), "Streaming");
        Ok(ActiveStream {
            session,
            provisioning,
            handle,
        })
    }

    /// Stop the active session. Returns its handle so the caller can wait for
    /// the closing log entries; `None` when idle.
    pub fn stop(&mut self) -> Option<EncoderHandle> {
        match std::mem::replace(&mut self.slot, Slot::Idle) {
            Slot::Streaming(active) => {
                self.supervisor.stop(&active.handle);
                Some(active.handle)
            }
            _ => None,
        }
    }

    /// Wait for the active encoder to exit on its own, then release the slot.
    ///
    /// An abnormal exit is reported as `EncoderRuntimeError`; the details
    /// are already in the session log.
    pub async fn wait_for_exit(&mut self) -> Result<ProcessExit> {
        let handle = match &self.slot {
            Slot::Streaming(active) => active.handle.clone(),
            _ => return Ok(ProcessExit::Unknown),
        };
        let exit = handle.wait().await;
        self.slot = Slot::Idle;
        if exit.is_clean() {
            Ok(exit)
        } else {
            Err(Error::EncoderRuntimeError(exit.to_string()))
        }
    }

    /// Authorization URL to open in a browser.
    pub fn authorization_url(&self, state: Option<&str>) -> Result<String> {
        Ok(self.oauth()?.authorization_url(state)?)
    }

    /// Exchange `code`, discover the channel and save its credential under
    /// `channel_name` (defaults to the channel title).
    ///
    /// Saving is best-effort; the channel stays usable for this process.
    pub async fn authorize(
        &mut self,
        code: &str,
        channel_name: Option<&str>,
    ) -> Result<ChannelCredential> {
        let oauth = self.oauth()?.clone();
        let auth = self.platform.exchange_code(&oauth, code).await?;
        let channel = self.platform.own_channel(&auth).await?;

        let name = channel_name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(&channel.title)
            .to_string();

        if let Err(e) = self.credentials.save(&name, &channel.id, &auth).await {
            warn!(channel = %name, error = %e, "Failed to save channel credentials");
        }
        info!(channel = %name, channel_id = %channel.id, "Channel authorized");

        let now = Utc::now();
        let credential = ChannelCredential {
            channel_name: name.clone(),
            channel_id: channel.id,
            auth_material: auth,
            created_at: now,
            last_used_at: now,
        };
        self.authorized.insert(name, credential.clone());
        Ok(credential)
    }

    /// Saved channels, most recently used first. A store failure yields only
    /// the channels authorized in this process.
    pub async fn channels(&self) -> Vec<ChannelCredential> {
        let mut channels = match self.credentials.load_all().await {
            Ok(mut saved) => {
                for (name, credential) in &self.authorized {
                    if !saved.iter().any(|c| &c.channel_name == name) {
                        saved.push(credential.clone());
                    }
                }
                saved
            }
            Err(e) => {
                warn!(error = %e, "Failed to load saved channels");
                self.authorized.values().cloned().collect()
            }
        };
        channels.sort_by(|a, b| b.last_used_at.cmp(&a.last_used_at));
        channels
    }

    pub async fn list_broadcasts(
        &mut self,
        channel_name: &str,
        max_results: u32,
    ) -> Result<Vec<BroadcastSummary>> {
        let auth = self.usable_auth(channel_name).await?;
        Ok(self.platform.list_broadcasts(&auth, max_results).await?)
    }

    pub async fn logs(&self, query: &LogQuery) -> Result<Vec<LogEntry>> {
        self.log.query(query).await
    }

    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogEntry> {
        self.log.subscribe()
    }

    pub async fn sessions(&self, limit: u32) -> Result<Vec<StreamingSession>> {
        self.log.list_sessions(limit).await
    }

    fn oauth(&self) -> Result<&OAuthConfig> {
        self.oauth
            .as_ref()
            .ok_or_else(|| Error::config("OAuth client is not configured"))
    }

    /// Credentials for `channel_name`, refreshed first if the access token
    /// has expired and a refresh token is available.
    async fn usable_auth(&mut self, channel_name: &str) -> Result<AuthMaterial> {
        let mut credential = match self.authorized.get(channel_name) {
            Some(credential) => credential.clone(),
            None => self
                .credentials
                .find(channel_name)
                .await?
                .ok_or_else(|| Error::not_found("ChannelCredential", channel_name))?,
        };

        if let Err(e) = self.credentials.touch(channel_name).await {
            warn!(channel = %channel_name, error = %e, "Failed to update channel last-used time");
        }

        let auth = &credential.auth_material;
        if auth.is_expired_at(Utc::now()) && auth.can_refresh() {
            info!(channel = %channel_name, "Access token expired; refreshing");
            let refreshed = self.platform.refresh_access_token(auth).await?;
            if let Err(e) = self
                .credentials
                .save(channel_name, &credential.channel_id, &refreshed)
                .await
            {
                warn!(channel = %channel_name, error = %e, "Failed to save refreshed credentials");
            }
            credential.auth_material = refreshed;
            credential.last_used_at = Utc::now();
            self.authorized
                .insert(channel_name.to_string(), credential.clone());
        }

        Ok(credential.auth_material)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::credentials::MockCredentialStore;
    use crate::database::test_pool;
    use crate::domain::{LogKind, SessionStatus};
    use crate::encoder::{SESSION_ENDED, test_support::fake_encoder};
    use crate::platform::{ChannelInfo, MockPlatformApi, PlatformError};

    fn auth(token: &str, expired: bool) -> AuthMaterial {
        AuthMaterial {
            access_token: token.to_string(),
            refresh_token: Some("1//refresh".to_string()),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            client_id: "cid".to_string(),
            client_secret: "secret".to_string(),
            scopes: vec![],
            expiry: Some(if expired {
                Utc::now() - ChronoDuration::minutes(5)
            } else {
                Utc::now() + ChronoDuration::hours(1)
            }),
        }
    }

    fn credential(material: AuthMaterial) -> ChannelCredential {
        ChannelCredential {
            channel_name: "demo".to_string(),
            channel_id: "UC123".to_string(),
            auth_material: material,
            created_at: Utc::now(),
            last_used_at: Utc::now(),
        }
    }

    fn demo_store() -> MockCredentialStore {
        let mut store = MockCredentialStore::new();
        store
            .expect_find()
            .withf(|name| name == "demo")
            .returning(|_| Ok(Some(credential(auth("ya29.valid", false)))));
        store.expect_touch().returning(|_| Ok(()));
        store
    }

    fn key_provisioning() -> StreamProvisioning {
        StreamProvisioning {
            stream_id: "stream-1".to_string(),
            stream_key: "abcd-1234".to_string(),
            ingest_url: "rtmp://ingest/abcd-1234".to_string(),
            broadcast_id: None,
            watch_url: None,
            studio_url: None,
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        orchestrator: SessionOrchestrator,
        log: SessionLog,
    }

    impl Fixture {
        async fn new(store: MockCredentialStore, platform: MockPlatformApi, script: &str) -> Self {
            let (dir, binary) = fake_encoder(script);
            std::fs::write(dir.path().join("clip.mp4"), b"not really a video").unwrap();
            let log = SessionLog::from_pool(test_pool().await);
            let orchestrator = SessionOrchestrator::new(
                Arc::new(store),
                Arc::new(platform),
                log.clone(),
                EncoderConfig::default().with_binary(binary),
                OrchestratorConfig::default(),
            )
            .with_oauth(OAuthConfig::new("cid", "secret", "http://localhost:8080"));
            Self {
                dir,
                orchestrator,
                log,
            }
        }

        fn request(&self, target: StreamTarget) -> StreamRequest {
            StreamRequest::new(self.dir.path().join("clip.mp4"), BroadcastMetadata::new("Demo"))
                .with_channel("demo")
                .with_target(target)
        }

        /// Entries for `session_id` in write order.
        async fn entries(&self, session_id: &str) -> Vec<LogEntry> {
            let mut entries = self
                .log
                .query(&LogQuery::new(1000).with_session_id(session_id))
                .await
                .unwrap();
            entries.reverse();
            entries
        }
    }

    #[tokio::test]
    async fn stream_key_session_logs_redacted_start_and_two_closing_entries() {
        let mut platform = MockPlatformApi::new();
        platform
            .expect_provision_stream_key()
            .times(1)
            .returning(|_| Ok(key_provisioning()));
        let mut fx = Fixture::new(
            demo_store(),
            platform,
            "echo 'frame=1'\necho 'frame=2'\nexec sleep 30\n",
        )
        .await;

        let request = fx.request(StreamTarget::StreamKey);
        let session_id = fx
            .orchestrator
            .start(request, None)
            .await
            .unwrap()
            .session
            .session_id
            .clone();
        assert_eq!(fx.orchestrator.state(), OrchestratorState::Streaming);

        // Let the encoder write its output before stopping it.
        tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        let handle = fx.orchestrator.stop().unwrap();
        assert!(fx.orchestrator.stop().is_none());
        assert_eq!(handle.wait().await, ProcessExit::Cancelled);
        assert_eq!(fx.orchestrator.state(), OrchestratorState::Idle);

        let entries = fx.entries(&session_id).await;
        assert_eq!(entries[0].kind, LogKind::Info);
        assert!(entries[0].message.contains("rtmp://ingest/****"));
        assert!(entries.iter().all(|e| !e.message.contains("abcd-1234")));

        let n = entries.len();
        assert_eq!(entries[n - 2].kind, LogKind::Info);
        assert_eq!(entries[n - 1].kind, LogKind::Info);
        assert_eq!(entries[n - 1].message, SESSION_ENDED);
        let ended = entries.iter().filter(|e| e.message == SESSION_ENDED).count();
        assert_eq!(ended, 1);

        let ffmpeg: Vec<&str> = entries
            .iter()
            .filter(|e| e.kind == LogKind::Ffmpeg)
            .map(|e| e.message.as_str())
            .collect();
        assert_eq!(ffmpeg, vec!["frame=1", "frame=2"]);

        let session = fx.log.get_session(&session_id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Ended);
        assert_eq!(session.channel_name.as_deref(), Some("demo"));
    }

    #[tokio::test]
    async fn second_start_while_streaming_is_rejected() {
        let mut platform = MockPlatformApi::new();
        platform
            .expect_provision_stream_key()
            .times(1)
            .returning(|_| Ok(key_provisioning()));
        let mut fx = Fixture::new(demo_store(), platform, "exec sleep 30\n").await;

        let first = fx.request(StreamTarget::StreamKey);
        let first_id = fx
            .orchestrator
            .start(first, None)
            .await
            .unwrap()
            .session
            .session_id
            .clone();

        let second = fx.request(StreamTarget::StreamKey);
        let err = fx.orchestrator.start(second, None).await.unwrap_err();
        match err {
            Error::SessionAlreadyActive { session_id } => assert_eq!(session_id, first_id),
            other => panic!("unexpected error: {other}"),
        }

        let active = fx.orchestrator.active().unwrap();
        assert_eq!(active.session.session_id, first_id);
        assert!(!active.handle.is_finished());

        let handle = fx.orchestrator.stop().unwrap();
        handle.wait().await;
    }

    #[tokio::test]
    async fn bind_failure_leaves_no_active_session() {
        let mut platform = MockPlatformApi::new();
        platform.expect_provision_broadcast().times(1).returning(|_, _, _| {
            Err(PlatformError::RemoteRejected {
                status: 403,
                message: "bind failed".to_string(),
            })
        });
        let mut fx = Fixture::new(demo_store(), platform, "exit 0\n").await;

        let request = fx.request(StreamTarget::Broadcast);
        let err = fx.orchestrator.start(request, None).await.unwrap_err();
        assert!(matches!(err, Error::RemoteRejected { status: 403, .. }));
        assert_eq!(fx.orchestrator.state(), OrchestratorState::Idle);
        assert!(fx.orchestrator.active().is_none());
        assert!(fx.orchestrator.sessions(10).await.unwrap().is_empty());
        assert!(fx.orchestrator.stop().is_none());
    }

    #[tokio::test]
    async fn broadcast_is_scheduled_after_lead_time() {
        let mut platform = MockPlatformApi::new();
        let before = Utc::now();
        platform
            .expect_provision_broadcast()
            .withf(move |_, metadata, scheduled| {
                metadata.title == "Demo" && *scheduled >= before + ChronoDuration::seconds(30)
            })
            .times(1)
            .returning(|_, _, _| {
                Ok(StreamProvisioning {
                    broadcast_id: Some("bc-9".to_string()),
                    watch_url: Some("https://www.youtube.com/watch?v=bc-9".to_string()),
                    studio_url: None,
                    ..key_provisioning()
                })
            });
        let mut fx = Fixture::new(demo_store(), platform, "exit 0\n").await;

        let request = fx.request(StreamTarget::Broadcast);
        let active = fx.orchestrator.start(request, None).await.unwrap();
        let provisioning = active.provisioning.clone().unwrap();
        assert_eq!(provisioning.broadcast_id.as_deref(), Some("bc-9"));
        assert_eq!(fx.orchestrator.wait_for_exit().await.unwrap(), ProcessExit::Success);
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_and_saved() {
        let mut store = MockCredentialStore::new();
        store
            .expect_find()
            .returning(|_| Ok(Some(credential(auth("ya29.stale", true)))));
        store.expect_touch().returning(|_| Ok(()));
        store
            .expect_save()
            .withf(|name, id, material| {
                name == "demo" && id == "UC123" && material.access_token == "ya29.fresh"
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut platform = MockPlatformApi::new();
        platform
            .expect_refresh_access_token()
            .times(1)
            .returning(|_| Ok(auth("ya29.fresh", false)));
        platform
            .expect_provision_stream_key()
            .withf(|material| material.access_token == "ya29.fresh")
            .times(1)
            .returning(|_| Ok(key_provisioning()));

        let mut fx = Fixture::new(store, platform, "exit 0\n").await;
        let request = fx.request(StreamTarget::StreamKey);
        fx.orchestrator.start(request, None).await.unwrap();
        fx.orchestrator.wait_for_exit().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_channel_and_missing_video_fail_before_provisioning() {
        let mut store = MockCredentialStore::new();
        store.expect_find().returning(|_| Ok(None));
        let mut fx = Fixture::new(store, MockPlatformApi::new(), "exit 0\n").await;

        let request = fx.request(StreamTarget::StreamKey);
        let err = fx.orchestrator.start(request, None).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));

        let missing = StreamRequest::new("/no/such/clip.mp4", BroadcastMetadata::new("x"))
            .with_channel("demo");
        let err = fx.orchestrator.start(missing, None).await.unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid(_)));
        assert_eq!(fx.orchestrator.state(), OrchestratorState::Idle);
    }

    #[tokio::test]
    async fn custom_url_skips_provisioning() {
        let mut fx = Fixture::new(
            MockCredentialStore::new(),
            MockPlatformApi::new(),
            "echo pushing\nexit 0\n",
        )
        .await;
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let request = StreamRequest::new(fx.dir.path().join("clip.mp4"), BroadcastMetadata::new("x"))
            .with_target(StreamTarget::CustomUrl("rtmps://live.example.com/app/sk_secret".into()));
        let active = fx.orchestrator.start(request, Some(tx)).await.unwrap();
        assert!(active.provisioning.is_none());
        assert!(active.session.channel_name.is_none());

        fx.orchestrator.wait_for_exit().await.unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("pushing"));
    }

    #[tokio::test]
    async fn failed_encoder_exit_is_reported() {
        let mut fx = Fixture::new(
            MockCredentialStore::new(),
            MockPlatformApi::new(),
            "echo 'Connection refused' >&2\nexit 1\n",
        )
        .await;
        let request = StreamRequest::new(fx.dir.path().join("clip.mp4"), BroadcastMetadata::new("x"))
            .with_target(StreamTarget::CustomUrl("rtmp://127.0.0.1/live/key".into()));
        fx.orchestrator.start(request, None).await.unwrap();

        let err = fx.orchestrator.wait_for_exit().await.unwrap_err();
        assert!(matches!(err, Error::EncoderRuntimeError(_)));
        assert_eq!(fx.orchestrator.state(), OrchestratorState::Idle);
    }

    #[tokio::test]
    async fn authorize_saves_under_channel_title() {
        let mut store = MockCredentialStore::new();
        store
            .expect_save()
            .withf(|name, id, _| name == "Demo Channel" && id == "UC123")
            .times(1)
            .returning(|_, _, _| Err(Error::Other("disk full".to_string())));
        store.expect_load_all().returning(|| Err(Error::Other("disk full".to_string())));

        let mut platform = MockPlatformApi::new();
        platform
            .expect_exchange_code()
            .withf(|_, code| code == "4/abc")
            .times(1)
            .returning(|_, _| Ok(auth("ya29.new", false)));
        platform.expect_own_channel().times(1).returning(|_| {
            Ok(ChannelInfo {
                id: "UC123".to_string(),
                title: "Demo Channel".to_string(),
            })
        });

        let mut fx = Fixture::new(store, platform, "exit 0\n").await;
        let credential = fx.orchestrator.authorize("4/abc", None).await.unwrap();
        assert_eq!(credential.channel_name, "Demo Channel");

        // Saving failed, but the channel is still listed for this process.
        let channels = fx.orchestrator.channels().await;
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].channel_id, "UC123");
    }

    #[tokio::test]
    async fn channels_list_unsaved_authorization_first() {
        let mut store = MockCredentialStore::new();
        store
            .expect_save()
            .times(1)
            .returning(|_, _, _| Err(Error::Other("disk full".to_string())));
        store.expect_load_all().returning(|| {
            let mut older = credential(auth("ya29.old", false));
            older.channel_name = "older".to_string();
            older.last_used_at = Utc::now() - ChronoDuration::hours(2);
            Ok(vec![older])
        });

        let mut platform = MockPlatformApi::new();
        platform
            .expect_exchange_code()
            .returning(|_, _| Ok(auth("ya29.new", false)));
        platform.expect_own_channel().returning(|_| {
            Ok(ChannelInfo {
                id: "UC123".to_string(),
                title: "Demo Channel".to_string(),
            })
        });

        let mut fx = Fixture::new(store, platform, "exit 0\n").await;
        fx.orchestrator.authorize("4/abc", None).await.unwrap();

        let names: Vec<String> = fx
            .orchestrator
            .channels()
            .await
            .into_iter()
            .map(|c| c.channel_name)
            .collect();
        assert_eq!(names, vec!["Demo Channel", "older"]);
    }

    #[tokio::test]
    async fn abandoned_start_releases_the_slot() {
        let mut platform = MockPlatformApi::new();
        platform
            .expect_provision_stream_key()
            .returning(|_| Ok(key_provisioning()));
        let mut fx = Fixture::new(demo_store(), platform, "exec sleep 30\n").await;

        // Polled once, then dropped.
        let request = fx.request(StreamTarget::StreamKey);
        let _ = tokio::time::timeout(
            std::time::Duration::ZERO,
            fx.orchestrator.start(request, None),
        )
        .await;
        assert_ne!(fx.orchestrator.state(), OrchestratorState::Provisioning);
        if let Some(handle) = fx.orchestrator.stop() {
            handle.wait().await;
        }

        fx.orchestrator.slot = Slot::Provisioning(Weak::new());
        assert_eq!(fx.orchestrator.state(), OrchestratorState::Idle);

        let request = fx.request(StreamTarget::StreamKey);
        fx.orchestrator.start(request, None).await.unwrap();
        assert_eq!(fx.orchestrator.state(), OrchestratorState::Streaming);
        let handle = fx.orchestrator.stop().unwrap();
        assert_eq!(handle.wait().await, ProcessExit::Cancelled);
    }

    #[tokio::test]
    async fn stop_when_idle_is_a_no_op() {
        let mut fx = Fixture::new(MockCredentialStore::new(), MockPlatformApi::new(), "exit 0\n").await;
        assert!(fx.orchestrator.stop().is_none());
        assert_eq!(fx.orchestrator.state(), OrchestratorState::Idle);
        assert_eq!(fx.orchestrator.wait_for_exit().await.unwrap(), ProcessExit::Unknown);
    }
}
