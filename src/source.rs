//! Message source backed by exported channel dumps.
//!
//! Each channel is a single JSON file `<dump_dir>/<channel>.json` holding an
//! array of messages in any order. Fetches present them newest first, the
//! way a live channel API pages history.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::SourceError;
use crate::pipeline::types::{Message, MessageSource};

#[derive(Debug, Clone)]
pub struct JsonDumpSource {
    dump_dir: PathBuf,
}

impl JsonDumpSource {
    pub fn new(dump_dir: PathBuf) -> Self {
        Self { dump_dir }
    }

    /// Read and sort a channel dump, newest first.
    fn load(&self, channel: &str) -> Result<Vec<Message>, SourceError> {
        let path = self.dump_dir.join(format!("{channel}.json"));
        let raw = std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SourceError::DumpNotFound {
                    channel: channel.to_string(),
                    path: path.display().to_string(),
                }
            } else {
                SourceError::Read {
                    channel: channel.to_string(),
                    source,
                }
            }
        })?;
        let mut messages: Vec<Message> =
            serde_json::from_str(&raw).map_err(|source| SourceError::Malformed {
                channel: channel.to_string(),
                source,
            })?;
        messages.sort_by(|a, b| b.id.cmp(&a.id));
        debug!(channel, count = messages.len(), "Loaded channel dump");
        Ok(messages)
    }
}

#[async_trait]
impl MessageSource for JsonDumpSource {
    async fn fetch_recent(
        &self,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<Message>, SourceError> {
        let mut messages = self.load(channel)?;
        messages.truncate(limit);
        Ok(messages)
    }

    async fn fetch_since(
        &self,
        channel: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Message>, SourceError> {
        let messages = self.load(channel)?;
        let mut within = Vec::new();
        for message in messages {
            if message.timestamp < since {
                break;
            }
            within.push(message);
            if within.len() >= limit {
                break;
            }
        }
        Ok(within)
    }
}
