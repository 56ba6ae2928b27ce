//! libSQL sink — append-only `posts` table in a local database file.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Connection, Database, params};
use tracing::{debug, info};

use crate::error::SinkError;
use crate::pipeline::types::{MergedPost, PostSink};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_channel TEXT NOT NULL,
    original_ids TEXT NOT NULL,
    original_date TEXT NOT NULL,
    content TEXT NOT NULL,
    has_media INTEGER NOT NULL,
    media_count INTEGER NOT NULL,
    is_merged INTEGER NOT NULL,
    is_top_post INTEGER NOT NULL,
    original_views INTEGER,
    original_likes INTEGER,
    original_comments INTEGER,
    saved_at TEXT NOT NULL DEFAULT (datetime('now'))
);
";

/// libSQL-backed post sink.
///
/// Holds a single connection reused for all appends. `libsql::Connection`
/// is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlSink {
    #[allow(dead_code)]
    db: Arc<Database>,
    conn: Connection,
}

impl LibSqlSink {
    /// Open (or create) a local database file and ensure the schema.
    pub async fn new_local(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SinkError::Database(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| SinkError::Database(format!("Failed to open database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| SinkError::Database(format!("Failed to create connection: {e}")))?;

        conn.execute_batch(SCHEMA)
            .await
            .map_err(|e| SinkError::Database(format!("Failed to initialize schema: {e}")))?;

        info!(path = %path.display(), "Post database opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// In-memory database, for tests.
    pub async fn new_memory() -> Result<Self, SinkError> {
        Self::new_local(Path::new(":memory:")).await
    }

    /// Number of stored posts.
    pub async fn count(&self) -> Result<u64, SinkError> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM posts", ())
            .await
            .map_err(|e| SinkError::Database(e.to_string()))?;
        let row = rows
            .next()
            .await
            .map_err(|e| SinkError::Database(e.to_string()))?
            .ok_or_else(|| SinkError::Database("count query returned no rows".into()))?;
        let count: i64 = row
            .get(0)
            .map_err(|e| SinkError::Database(e.to_string()))?;
        Ok(count as u64)
    }
}

#[async_trait]
impl PostSink for LibSqlSink {
    async fn append(&self, post: &MergedPost) -> Result<(), SinkError> {
        let original_ids = serde_json::to_string(&post.original_ids)?;
        let metrics = post.metrics;
        self.conn
            .execute(
                "INSERT INTO posts (
                    source_channel, original_ids, original_date, content,
                    has_media, media_count, is_merged, is_top_post,
                    original_views, original_likes, original_comments
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    post.source_channel.as_str(),
                    original_ids.clone(),
                    post.timestamp.to_rfc3339(),
                    post.text.as_str(),
                    post.has_media() as i64,
                    post.media_count() as i64,
                    post.is_merged as i64,
                    post.is_top_post as i64,
                    metrics.map(|m| m.views as i64),
                    metrics.map(|m| m.likes as i64),
                    metrics.map(|m| m.comments as i64),
                ],
            )
            .await
            .map_err(|e| SinkError::Database(e.to_string()))?;
        debug!(
            channel = post.source_channel.as_str(),
            ids = original_ids.as_str(),
            "Post saved"
        );
        Ok(())
    }
}
