use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use channel_digest::brand::{FfmpegTranscoder, MediaBrander, Transcoder};
use channel_digest::config::AppConfig;
use channel_digest::cursor::CursorStore;
use channel_digest::pipeline::Pipeline;
use channel_digest::pipeline::types::{CountingProgress, PostSink};
use channel_digest::source::JsonDumpSource;
use channel_digest::store::{LibSqlSink, MemorySink};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config_path = std::env::var("CHANNEL_DIGEST_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.json"));
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;

    eprintln!("📰 channel-digest v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Mode: {:?}", config.mode);
    eprintln!("   Channels: {}", config.channels.join(", "));
    eprintln!("   Dumps: {}\n", config.dump_dir.display());

    let source = Arc::new(JsonDumpSource::new(config.dump_dir.clone()));

    let sink: Arc<dyn PostSink> = match &config.db_path {
        Some(path) => Arc::new(
            LibSqlSink::new_local(path)
                .await
                .with_context(|| format!("opening post database at {}", path.display()))?,
        ),
        None => {
            warn!("No db_path configured, posts will not be persisted");
            Arc::new(MemorySink::new())
        }
    };

    let transcoder = FfmpegTranscoder::default();
    if !transcoder.available() {
        warn!("ffmpeg not found in PATH, videos will pass through unbranded");
    }
    let brander = MediaBrander::new(
        config.branding.clone(),
        config.scratch_dir.clone(),
        Box::new(transcoder),
    )
    .context("creating scratch directory")?;

    let cursors = CursorStore::load(config.cursor_path.clone()).context("loading cursor file")?;

    let progress = Arc::new(CountingProgress::default());
    let mut pipeline = Pipeline::new(
        config,
        source,
        sink,
        progress.clone(),
        brander,
        cursors,
    );

    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    pipeline.run(&token).await?;

    let (processed, total) = progress.totals();
    info!(processed, total, "Run complete");
    Ok(())
}
