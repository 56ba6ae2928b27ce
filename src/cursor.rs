//! Per-channel merge watermarks, persisted as a small JSON file.
//!
//! The watermark is the id of the last message absorbed into an emitted
//! post. It only ever moves forward; re-running over the same dump never
//! re-absorbs a message.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use tracing::debug;

use crate::error::{ConfigError, Result};

#[derive(Debug)]
pub struct CursorStore {
    path: PathBuf,
    cursors: HashMap<String, i64>,
}

impl CursorStore {
    /// Load cursors from `path`. A missing file starts every channel at zero.
    pub fn load(path: PathBuf) -> Result<Self> {
        let cursors = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).map_err(ConfigError::Parse)?,
            Err(e) if e.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                }
                .into());
            }
        };
        Ok(Self { path, cursors })
    }

    /// Current watermark for a channel, zero when unseen.
    pub fn get(&self, channel: &str) -> i64 {
        self.cursors.get(channel).copied().unwrap_or(0)
    }

    /// Move a channel's watermark forward and persist. A value at or below
    /// the current watermark is ignored without touching the file.
    pub fn advance(&mut self, channel: &str, watermark: i64) -> Result<()> {
        if watermark <= self.get(channel) {
            return Ok(());
        }
        debug!(channel, watermark, "Advancing cursor");
        self.cursors.insert(channel.to_string(), watermark);
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.cursors).map_err(ConfigError::Parse)?;
        std::fs::write(&self.path, raw).map_err(|source| ConfigError::Read {
            path: self.path.display().to_string(),
            source,
        })?;
        Ok(())
    }
}
