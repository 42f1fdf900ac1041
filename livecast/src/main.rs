mod cli;

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use livecast::config::{EncoderConfig, OrchestratorConfig};
use livecast::database::{self, repositories::SqlxCredentialStore};
use livecast::logging::init_logging;
use livecast::platform::PlatformClient;
use livecast::{SessionLog, SessionOrchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before clap reads LIVECAST_* variables.
    dotenvy::dotenv().ok();
    let cli = cli::Cli::parse();

    let (logging, _guard) = init_logging(&cli.log_dir)?;
    let shutdown = CancellationToken::new();
    logging.start_retention_cleanup(shutdown.clone());

    let pool = database::connect(&cli.database_url).await?;
    let log = SessionLog::from_pool(pool.clone());
    let credentials = Arc::new(SqlxCredentialStore::new(pool.clone()));
    let platform = Arc::new(PlatformClient::with_api_base(cli.api_base.clone())?);

    let encoder = EncoderConfig {
        binary: cli.ffmpeg.clone(),
        ingest_base_url: cli.ingest_base.clone(),
        ..EncoderConfig::default()
    };
    let config = OrchestratorConfig {
        broadcast_lead_time: Duration::from_secs(cli.lead_time_secs),
        ..OrchestratorConfig::default()
    };

    let mut orchestrator = SessionOrchestrator::new(credentials, platform, log, encoder, config);
    if let Some(oauth) = cli.oauth.resolve()? {
        orchestrator = orchestrator.with_oauth(oauth);
    }

    tracing::debug!("livecast initialized");
    let result = cli::run(cli.command, &mut orchestrator).await;

    shutdown.cancel();
    pool.close().await;
    result
}
