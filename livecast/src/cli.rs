//! Command-line interface.

use anyhow::{Context, anyhow};
use chrono::{DateTime, Local, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::info;

use livecast::config::{DEFAULT_DATABASE_URL, DEFAULT_INGEST_BASE};
use livecast::domain::{BroadcastMetadata, LogKind, LogQuery, PrivacyStatus};
use livecast::platform::{DEFAULT_API_BASE, OAuthConfig};
use livecast::{SessionOrchestrator, StreamRequest, StreamTarget};

#[derive(Debug, Parser)]
#[command(name = "livecast", version, about = "Stream a looping video file to a live broadcast")]
pub struct Cli {
    /// SQLite database URL.
    #[arg(long, env = "LIVECAST_DATABASE_URL", default_value = DEFAULT_DATABASE_URL, global = true)]
    pub database_url: String,

    /// Directory for diagnostic log files.
    #[arg(long, env = "LIVECAST_LOG_DIR", default_value = "logs", global = true)]
    pub log_dir: PathBuf,

    /// ffmpeg binary.
    #[arg(long, env = "LIVECAST_FFMPEG", default_value = "ffmpeg", global = true)]
    pub ffmpeg: PathBuf,

    /// Ingest base URL used with a bare stream key.
    #[arg(long, env = "LIVECAST_INGEST_BASE", default_value = DEFAULT_INGEST_BASE, global = true)]
    pub ingest_base: String,

    /// Platform API base URL.
    #[arg(long, env = "LIVECAST_API_BASE", default_value = DEFAULT_API_BASE, global = true)]
    pub api_base: String,

    /// Seconds between provisioning a broadcast and its scheduled start.
    #[arg(long, env = "LIVECAST_LEAD_TIME_SECS", default_value_t = 30, global = true)]
    pub lead_time_secs: u64,

    #[command(flatten)]
    pub oauth: OAuthArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// OAuth client settings: a `client_secrets.json` file or individual values.
#[derive(Debug, Args)]
pub struct OAuthArgs {
    #[arg(long, env = "LIVECAST_CLIENT_SECRETS", global = true)]
    pub client_secrets: Option<PathBuf>,

    #[arg(long, env = "LIVECAST_CLIENT_ID", global = true)]
    pub client_id: Option<String>,

    #[arg(long, env = "LIVECAST_CLIENT_SECRET", hide_env_values = true, global = true)]
    pub client_secret: Option<String>,

    #[arg(long, env = "LIVECAST_AUTH_URI", global = true)]
    pub auth_uri: Option<String>,

    #[arg(long, env = "LIVECAST_TOKEN_URI", global = true)]
    pub token_uri: Option<String>,

    #[arg(long, env = "LIVECAST_REDIRECT_URI", global = true)]
    pub redirect_uri: Option<String>,
}

impl OAuthArgs {
    /// `None` when no OAuth client is configured at all.
    pub fn resolve(&self) -> anyhow::Result<Option<OAuthConfig>> {
        let mut config = if let Some(path) = &self.client_secrets {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            OAuthConfig::from_client_secrets_json(&json, self.redirect_uri.as_deref())?
        } else {
            match (&self.client_id, &self.client_secret) {
                (None, None) => return Ok(None),
                (Some(id), Some(secret)) => OAuthConfig::new(
                    id.clone(),
                    secret.clone(),
                    self.redirect_uri
                        .clone()
                        .unwrap_or_else(|| "http://localhost:8080/".to_string()),
                ),
                _ => {
                    return Err(anyhow!(
                        "both --client-id and --client-secret are required"
                    ));
                }
            }
        };

        if let Some(auth_uri) = &self.auth_uri {
            config.auth_uri = auth_uri.clone();
        }
        if let Some(token_uri) = &self.token_uri {
            config.token_uri = token_uri.clone();
        }
        config.validate()?;
        Ok(Some(config))
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the URL to open for authorizing a channel.
    AuthUrl {
        /// Opaque value echoed back on redirect.
        #[arg(long)]
        state: Option<String>,
    },
    /// Exchange an authorization code and save the channel.
    Authorize {
        code: String,
        /// Name to save the channel under; defaults to its title.
        #[arg(long)]
        name: Option<String>,
    },
    /// List saved channels.
    Channels,
    /// List a channel's broadcasts.
    Broadcasts {
        channel: String,
        #[arg(long, default_value_t = 10)]
        max: u32,
    },
    /// Stream a video file until it is stopped with Ctrl-C.
    Stream(StreamArgs),
    /// List recent sessions.
    Sessions {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Show session log entries, newest first.
    Logs {
        #[arg(long)]
        session: Option<String>,
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
        #[arg(long, default_value_t = 100)]
        limit: u32,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    StreamKey,
    Broadcast,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KindArg {
    Info,
    Error,
    Ffmpeg,
}

impl From<KindArg> for LogKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Info => LogKind::Info,
            KindArg::Error => LogKind::Error,
            KindArg::Ffmpeg => LogKind::Ffmpeg,
        }
    }
}

#[derive(Debug, Args)]
pub struct StreamArgs {
    pub video: PathBuf,

    /// Saved channel to provision on.
    #[arg(long)]
    pub channel: Option<String>,

    /// Push to this rtmp:// or rtmps:// URL instead of provisioning.
    #[arg(long, conflicts_with_all = ["channel", "mode"])]
    pub url: Option<String>,

    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Broadcast title; defaults to the file name.
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long, default_value = "")]
    pub description: String,

    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Platform category id.
    #[arg(long)]
    pub category: Option<String>,

    #[arg(long, default_value_t = PrivacyStatus::Public)]
    pub privacy: PrivacyStatus,

    #[arg(long)]
    pub made_for_kids: bool,

    /// Crop and scale to 9:16 portrait.
    #[arg(long)]
    pub vertical: bool,

    /// Do not echo encoder output.
    #[arg(long, short)]
    pub quiet: bool,
}

impl StreamArgs {
    fn into_request(self) -> StreamRequest {
        let title = self.title.unwrap_or_else(|| {
            self.video
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "Live".to_string())
        });
        let metadata = BroadcastMetadata {
            title,
            description: self.description,
            tags: self.tags,
            category: self.category,
            privacy: self.privacy,
            made_for_kids: self.made_for_kids,
        };

        let target = match (self.url, self.mode) {
            (Some(url), _) => Some(StreamTarget::CustomUrl(url)),
            (None, Some(ModeArg::StreamKey)) => Some(StreamTarget::StreamKey),
            (None, Some(ModeArg::Broadcast)) => Some(StreamTarget::Broadcast),
            (None, None) => None,
        };

        StreamRequest {
            channel_name: self.channel,
            video_file: self.video,
            metadata,
            target,
            vertical: self.vertical,
        }
    }
}

/// Render a library error as "<kind>: <message>".
fn display(err: livecast::Error) -> anyhow::Error {
    anyhow!("{}: {}", err.kind(), err.user_message())
}

fn local(time: DateTime<Utc>) -> String {
    time.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

pub async fn run(command: Command, orchestrator: &mut SessionOrchestrator) -> anyhow::Result<()> {
    match command {
        Command::AuthUrl { state } => {
            let url = orchestrator
                .authorization_url(state.as_deref())
                .map_err(display)?;
            println!("{url}");
        }
        Command::Authorize { code, name } => {
            let credential = orchestrator
                .authorize(&code, name.as_deref())
                .await
                .map_err(display)?;
            println!(
                "Authorized '{}' ({})",
                credential.channel_name, credential.channel_id
            );
        }
        Command::Channels => {
            let channels = orchestrator.channels().await;
            if channels.is_empty() {
                println!("No saved channels");
            }
            for channel in channels {
                println!(
                    "{:<30} {:<26} last used {}",
                    channel.channel_name,
                    channel.channel_id,
                    local(channel.last_used_at)
                );
            }
        }
        Command::Broadcasts { channel, max } => {
            let broadcasts = orchestrator
                .list_broadcasts(&channel, max)
                .await
                .map_err(display)?;
            for b in broadcasts {
                println!(
                    "{:<14} {:<10} {:<9} {}  {}",
                    b.id,
                    b.life_cycle_status.as_deref().unwrap_or("-"),
                    b.privacy_status.as_deref().unwrap_or("-"),
                    b.title,
                    b.watch_url
                );
            }
        }
        Command::Stream(args) => stream(orchestrator, args).await?,
        Command::Sessions { limit } => {
            for s in orchestrator.sessions(limit).await.map_err(display)? {
                println!(
                    "{}  {:<6} {}  {}  {}",
                    s.session_id,
                    s.status,
                    local(s.start_time),
                    s.channel_name.as_deref().unwrap_or("-"),
                    s.title
                );
            }
        }
        Command::Logs {
            session,
            kind,
            limit,
        } => {
            let mut query = LogQuery::new(limit);
            query.session_id = session;
            query.kind = kind.map(LogKind::from);
            for entry in orchestrator.logs(&query).await.map_err(display)? {
                println!(
                    "{} [{:<6}] {} {}",
                    local(entry.timestamp),
                    entry.kind,
                    entry.session_id,
                    entry.message
                );
            }
        }
    }
    Ok(())
}

async fn stream(orchestrator: &mut SessionOrchestrator, args: StreamArgs) -> anyhow::Result<()> {
    let quiet = args.quiet;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let active = orchestrator
        .start(args.into_request(), Some(tx))
        .await
        .map_err(display)?;
    println!("Session {}", active.session.session_id);
    println!("Pushing to {}", active.handle.redacted_target());
    if let Some(p) = &active.provisioning {
        if let Some(url) = &p.watch_url {
            println!("Watch: {url}");
        }
        if let Some(url) = &p.studio_url {
            println!("Studio: {url}");
        }
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let stopped = loop {
        tokio::select! {
            line = rx.recv() => match line {
                Some(line) if !quiet => println!("{line}"),
                Some(_) => {}
                None => break None,
            },
            _ = &mut ctrl_c => {
                info!("Interrupted; stopping stream");
                break orchestrator.stop();
            }
        }
    };

    match stopped {
        Some(handle) => println!("Encoder {}", handle.wait().await),
        None => {
            let exit = orchestrator.wait_for_exit().await.map_err(display)?;
            println!("Encoder {exit}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn stream_args_build_request() {
        let cli = Cli::try_parse_from([
            "livecast",
            "stream",
            "/videos/lofi.mp4",
            "--channel",
            "demo",
            "--mode",
            "stream-key",
            "--tag",
            "music",
            "--tag",
            "lofi",
            "--privacy",
            "unlisted",
            "--vertical",
        ])
        .unwrap();

        let Command::Stream(args) = cli.command else {
            panic!("expected stream command");
        };
        let request = args.into_request();
        assert_eq!(request.metadata.title, "lofi");
        assert_eq!(request.metadata.tags, vec!["music", "lofi"]);
        assert_eq!(request.metadata.privacy, PrivacyStatus::Unlisted);
        assert_eq!(request.target, Some(StreamTarget::StreamKey));
        assert!(request.vertical);
    }

    #[test]
    fn url_conflicts_with_channel() {
        let result = Cli::try_parse_from([
            "livecast",
            "stream",
            "clip.mp4",
            "--url",
            "rtmp://x/live/key",
            "--channel",
            "demo",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn oauth_requires_id_and_secret_together() {
        let args = OAuthArgs {
            client_secrets: None,
            client_id: Some("cid".into()),
            client_secret: None,
            auth_uri: None,
            token_uri: None,
            redirect_uri: None,
        };
        assert!(args.resolve().is_err());

        let args = OAuthArgs {
            client_id: None,
            ..args
        };
        assert!(args.resolve().unwrap().is_none());
    }
}
