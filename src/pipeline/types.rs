//! Shared types and trait seams for the ingest pipeline.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SinkError, SourceError};

// ── Message ─────────────────────────────────────────────────────────

/// A single message fetched from a channel-like content source.
///
/// Immutable once fetched. Media handles are opaque paths to already
/// downloaded attachment files; classification happens by extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Source-assigned id, monotonically increasing within a channel.
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    /// Body text, possibly empty.
    #[serde(default)]
    pub text: String,
    /// Attachment handles, possibly empty.
    #[serde(default)]
    pub media: Vec<PathBuf>,
    /// Provider-assigned album id. Albums are atomic multi-attachment
    /// units: a grouped message never triggers nor joins a merge.
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub views: u64,
    /// Sum of all reaction counts.
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub comments: u64,
}

impl Message {
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    pub fn has_media(&self) -> bool {
        !self.media.is_empty()
    }

    /// True when any attachment is a video or animation. Such posts are
    /// excluded from both processing modes.
    pub fn has_excluded_media(&self) -> bool {
        self.media.iter().any(|p| {
            matches!(
                MediaKind::from_path(p),
                MediaKind::Video | MediaKind::Animation
            )
        })
    }

    /// Snapshot the engagement metrics carried by this message.
    pub fn metrics(&self) -> PostMetrics {
        PostMetrics {
            views: self.views,
            likes: self.likes,
            comments: self.comments,
        }
    }
}

/// Attachment classification by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Animation,
    Other,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "jpg" | "jpeg" | "png" | "webp" | "bmp" | "tiff" => Self::Image,
            "mp4" | "mov" | "mkv" | "webm" | "m4v" => Self::Video,
            "gif" => Self::Animation,
            _ => Self::Other,
        }
    }
}

// ── Finalized post ──────────────────────────────────────────────────

/// Engagement metrics captured once, at selection time. Never re-read later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMetrics {
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
}

/// A finalized post record.
///
/// Created by the merge engine or the top-post emission step; never mutated
/// after creation; handed once to the sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedPost {
    pub source_channel: String,
    /// Source ids of every absorbed message, strictly increasing.
    pub original_ids: Vec<i64>,
    /// Timestamp of the leading absorbed message.
    pub timestamp: DateTime<Utc>,
    /// Concatenated body text.
    pub text: String,
    /// Branded media in scratch, in absorption order.
    pub media_paths: Vec<PathBuf>,
    pub is_merged: bool,
    pub is_top_post: bool,
    pub metrics: Option<PostMetrics>,
}

impl MergedPost {
    pub fn has_media(&self) -> bool {
        !self.media_paths.is_empty()
    }

    pub fn media_count(&self) -> usize {
        self.media_paths.len()
    }
}

// ── External collaborators ──────────────────────────────────────────

/// Channel-like content source — pure I/O, no pipeline logic.
///
/// Both fetches return newest-first sequences; the consumer reverses to
/// chronological order before merging and applies its own date cutoff.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fetch up to `limit` most recent messages.
    async fn fetch_recent(&self, channel: &str, limit: usize)
    -> Result<Vec<Message>, SourceError>;

    /// Fetch messages no older than `since`, stopping early at the date
    /// bound. `limit` caps the scan.
    async fn fetch_since(
        &self,
        channel: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Message>, SourceError>;
}

/// Durable store for finalized posts. Create-only at this layer: no update
/// or upsert contract.
#[async_trait]
pub trait PostSink: Send + Sync {
    async fn append(&self, post: &MergedPost) -> Result<(), SinkError>;
}

/// Fire-and-forget run progress, invoked once per emitted-or-skipped
/// message. Not part of the merge or ranking contract; may be a no-op.
pub trait ProgressTracker: Send + Sync {
    fn set_total(&self, total: usize);
    fn increment_processed(&self);
}

/// Progress tracker that does nothing.
#[derive(Debug, Default)]
pub struct NoopProgress;

impl ProgressTracker for NoopProgress {
    fn set_total(&self, _total: usize) {}
    fn increment_processed(&self) {}
}

/// Atomic counter tracker, used by the binary for run summaries and by tests.
#[derive(Debug, Default)]
pub struct CountingProgress {
    total: AtomicUsize,
    processed: AtomicUsize,
}

impl CountingProgress {
    /// (processed, total) as last reported.
    pub fn totals(&self) -> (usize, usize) {
        (
            self.processed.load(Ordering::Relaxed),
            self.total.load(Ordering::Relaxed),
        )
    }
}

impl ProgressTracker for CountingProgress {
    fn set_total(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
    }

    fn increment_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }
}
