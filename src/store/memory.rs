//! In-memory sink, used when no database path is configured and by tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::SinkError;
use crate::pipeline::types::{MergedPost, PostSink};

#[derive(Debug, Default)]
pub struct MemorySink {
    posts: Mutex<Vec<MergedPost>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything appended so far, in order.
    pub fn posts(&self) -> Vec<MergedPost> {
        match self.posts.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl PostSink for MemorySink {
    async fn append(&self, post: &MergedPost) -> Result<(), SinkError> {
        match self.posts.lock() {
            Ok(mut guard) => {
                guard.push(post.clone());
                Ok(())
            }
            Err(_) => Err(SinkError::Database("memory sink mutex poisoned".into())),
        }
    }
}
