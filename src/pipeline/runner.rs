//! Run orchestration: one pass over the configured channels.
//!
//! Channels are processed strictly one after another. A failure in one
//! channel is logged and never stops the others. Cancellation is observed
//! between posts, never mid-append.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::brand::MediaBrander;
use crate::config::{AppConfig, RunMode};
use crate::cursor::CursorStore;
use crate::error::{PipelineError, Result};
use crate::pipeline::merge::MergeRun;
use crate::pipeline::rank::RankingSelector;
use crate::pipeline::types::{MergedPost, MessageSource, PostSink, ProgressTracker};

/// Upper bound on messages pulled per channel in top-posts mode.
const COLLECT_LIMIT: usize = 2_000;

pub struct Pipeline {
    config: AppConfig,
    source: Arc<dyn MessageSource>,
    sink: Arc<dyn PostSink>,
    progress: Arc<dyn ProgressTracker>,
    brander: MediaBrander,
    selector: RankingSelector,
    cursors: CursorStore,
}

impl Pipeline {
    pub fn new(
        config: AppConfig,
        source: Arc<dyn MessageSource>,
        sink: Arc<dyn PostSink>,
        progress: Arc<dyn ProgressTracker>,
        brander: MediaBrander,
        cursors: CursorStore,
    ) -> Self {
        let selector = RankingSelector::new(config.top_posts.clone());
        Self {
            config,
            source,
            sink,
            progress,
            brander,
            selector,
            cursors,
        }
    }

    /// Process every configured channel once. Per-channel failures are
    /// logged and isolated; only cancellation ends the pass early.
    pub async fn run(&mut self, token: &CancellationToken) -> Result<()> {
        let channels = self.config.channels.clone();
        for channel in channels {
            if token.is_cancelled() {
                info!("Cancellation requested, stopping run");
                break;
            }
            info!(channel = channel.as_str(), mode = ?self.config.mode, "Processing channel");
            let outcome = match self.config.mode {
                RunMode::Sequential => self.run_sequential(&channel, token).await,
                RunMode::TopPosts => self.run_top_posts(&channel, token).await,
            };
            if let Err(e) = outcome {
                error!(channel = channel.as_str(), error = %e, "Channel run failed");
            }
        }
        Ok(())
    }

    /// Chronological merge of the channel's recent messages.
    async fn run_sequential(&mut self, channel: &str, token: &CancellationToken) -> Result<()> {
        let mut messages = self
            .source
            .fetch_recent(channel, self.config.limit)
            .await
            .map_err(PipelineError::Fetch)?;
        self.progress.set_total(messages.len());
        // Oldest first for the merge scan.
        messages.reverse();

        let watermark = self.cursors.get(channel);
        let mut kept = Vec::with_capacity(messages.len());
        for message in messages {
            if message.id <= watermark || message.has_excluded_media() {
                self.progress.increment_processed();
                continue;
            }
            kept.push(message);
        }

        let mut run = MergeRun::new(&self.config.merge, channel, &kept, &self.brander, watermark);
        // The cursor tracks delivered posts only. The engine's own watermark
        // runs ahead of delivery the moment a post is built, so persisting it
        // could strand messages that were never appended.
        let mut delivered = watermark;
        let outcome = loop {
            if token.is_cancelled() {
                info!(channel, "Cancellation requested, stopping channel");
                break Ok(());
            }
            tokio::task::yield_now().await;
            let Some(post) = run.next_post() else {
                break Ok(());
            };
            if let Err(e) = self.sink.append(&post).await {
                break Err(PipelineError::Append(e).into());
            }
            remove_scratch_files(&self.config.scratch_dir, &post.media_paths);
            self.progress.increment_processed();
            if let Some(&last) = post.original_ids.last() {
                delivered = delivered.max(last);
            }
        };

        if let Err(e) = self.cursors.advance(channel, delivered) {
            warn!(channel, error = %e, "Failed to persist cursor");
        }
        outcome
    }

    /// Quota-ranked selection over the channel's recent window.
    async fn run_top_posts(&mut self, channel: &str, token: &CancellationToken) -> Result<()> {
        let period_days = self.config.top_posts.period_days.max(0.001);
        let since = Utc::now() - Duration::milliseconds((period_days * 86_400_000.0) as i64);
        let messages = self
            .source
            .fetch_since(channel, since, COLLECT_LIMIT)
            .await
            .map_err(PipelineError::Fetch)?;

        // The source already stops at the bound; re-check here so a
        // generous source cannot widen the window.
        let pool: Vec<_> = messages
            .into_iter()
            .filter(|m| m.timestamp >= since && !m.has_excluded_media())
            .collect();

        let selections = self
            .selector
            .select(&pool, self.source.as_ref(), channel, Some(self.config.limit))
            .await
            .map_err(PipelineError::Fetch)?;
        self.progress.set_total(selections.len());

        for selection in selections {
            if token.is_cancelled() {
                info!(channel, "Cancellation requested, stopping channel");
                break;
            }
            tokio::task::yield_now().await;
            let media_paths = self.brander.brand_all(&selection.message.media);
            let post = MergedPost {
                source_channel: channel.to_string(),
                original_ids: vec![selection.message.id],
                timestamp: selection.message.timestamp,
                text: selection.message.text.trim().to_string(),
                media_paths,
                is_merged: false,
                is_top_post: true,
                metrics: Some(selection.metrics),
            };
            self.sink
                .append(&post)
                .await
                .map_err(PipelineError::Append)?;
            remove_scratch_files(&self.config.scratch_dir, &post.media_paths);
            self.progress.increment_processed();
        }
        Ok(())
    }
}

/// Delete branded files once their post is durably stored. Paths outside
/// the scratch directory are left alone.
fn remove_scratch_files(scratch: &Path, paths: &[PathBuf]) {
    for path in paths {
        if !path.starts_with(scratch) {
            continue;
        }
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove scratch file");
            }
        }
    }
}
