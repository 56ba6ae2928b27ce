//! Adjacent-message merge engine.
//!
//! Decides when temporally close messages in one channel belong together as
//! a single logical post. A `MergeRun` walks a chronologically ordered slice
//! and steps one finalized post at a time, so the caller can persist, clean
//! up, and observe cancellation between units of work. A merge group is
//! always decided in full within a single step — no post is ever half-built
//! at a yield point.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use tracing::debug;

use crate::brand::MediaBrander;
use crate::config::MergeConfig;
use crate::pipeline::types::{MergedPost, Message};

/// One merge pass over a channel's chronological message slice.
pub struct MergeRun<'a> {
    config: &'a MergeConfig,
    channel: &'a str,
    messages: &'a [Message],
    brander: &'a MediaBrander,
    index: usize,
    /// Last-absorbed message id; candidates at or below it are skipped.
    watermark: i64,
    /// Ids absorbed during this run, never re-visited as leading messages.
    absorbed: HashSet<i64>,
    /// Branding results cached per message id. A candidate augmented during
    /// a failed scan keeps its scratch files for when it leads its own post.
    branded: HashMap<i64, Vec<PathBuf>>,
}

impl<'a> MergeRun<'a> {
    /// `messages` must be ordered old to new; `watermark` is the channel's
    /// high-water processed id from a previous run (0 for none).
    pub fn new(
        config: &'a MergeConfig,
        channel: &'a str,
        messages: &'a [Message],
        brander: &'a MediaBrander,
        watermark: i64,
    ) -> Self {
        Self {
            config,
            channel,
            messages,
            brander,
            index: 0,
            watermark,
            absorbed: HashSet::new(),
            branded: HashMap::new(),
        }
    }

    /// The advanced watermark after the steps taken so far.
    pub fn watermark(&self) -> i64 {
        self.watermark
    }

    /// Produce the next finalized post, or `None` when the slice is
    /// exhausted. Absorbed messages are skipped, never emitted twice.
    pub fn next_post(&mut self) -> Option<MergedPost> {
        while self.index < self.messages.len() {
            let lead = self.index;
            self.index += 1;
            if self.absorbed.contains(&self.messages[lead].id) {
                continue;
            }
            return Some(self.build_post(lead));
        }
        None
    }

    fn build_post(&mut self, lead: usize) -> MergedPost {
        let messages = self.messages;
        let m = &messages[lead];
        let mut text = m.text.trim().to_string();
        let mut media = self.branded_media(lead);
        let mut ids = vec![m.id];

        if self.triggers(&text, &media, m) {
            for j in 1..=self.config.lookahead {
                let candidate = lead + j;
                if candidate >= messages.len() {
                    break;
                }
                let n = &messages[candidate];
                if n.id <= self.watermark {
                    continue;
                }
                let delta = (n.timestamp - m.timestamp).num_seconds().abs();
                // The window bound is inclusive: delta == window still merges.
                if delta > self.config.window_seconds {
                    break;
                }
                // Album boundaries are never crossed.
                if n.group_id.is_some() {
                    break;
                }

                let candidate_text = n.text.trim().to_string();
                let candidate_media = self.branded_media(candidate);
                if !self.complements(&text, &media, &candidate_text, &candidate_media) {
                    continue;
                }

                if !candidate_text.is_empty() {
                    if text.is_empty() {
                        text = candidate_text;
                    } else {
                        text = format!("{text}\n\n{candidate_text}");
                    }
                }
                media.extend(candidate_media);
                ids.push(n.id);
                self.absorbed.insert(n.id);
                self.watermark = n.id;
                debug!(
                    channel = self.channel,
                    lead = m.id,
                    absorbed = n.id,
                    "Absorbed neighbouring message"
                );
            }
        }

        // Emission covers the leading id too, so a standalone post is not
        // reprocessed by a later incremental run.
        self.watermark = self.watermark.max(m.id);

        let is_merged = ids.len() > 1;
        MergedPost {
            source_channel: self.channel.to_string(),
            original_ids: ids,
            timestamp: m.timestamp,
            text,
            media_paths: media,
            is_merged,
            is_top_post: false,
            metrics: None,
        }
    }

    /// Merge-trigger predicate for a leading message. Grouped (album)
    /// messages never trigger. An all-empty message never triggers under
    /// either mode.
    fn triggers(&self, text: &str, media: &[PathBuf], m: &Message) -> bool {
        if m.group_id.is_some() {
            return false;
        }
        let has_text = !text.is_empty();
        let has_media = !media.is_empty();
        if self.config.only_if_one_has_no_text {
            has_text ^ has_media
        } else {
            has_text || has_media
        }
    }

    /// Complementarity test against the accumulated post state. Strict mode
    /// merges only when exactly one side supplies the missing field; relaxed
    /// mode merges whenever the candidate contributes something new.
    fn complements(
        &self,
        text: &str,
        media: &[PathBuf],
        candidate_text: &str,
        candidate_media: &[PathBuf],
    ) -> bool {
        let has_text = !text.is_empty();
        let has_media = !media.is_empty();
        let cand_text = !candidate_text.is_empty();
        let cand_media = !candidate_media.is_empty();
        if self.config.only_if_one_has_no_text {
            (has_text && !cand_text && cand_media) || (has_media && !has_text && cand_text)
        } else {
            (has_text && cand_media) || (has_media && cand_text)
        }
    }

    fn branded_media(&mut self, index: usize) -> Vec<PathBuf> {
        let message = &self.messages[index];
        let brander = self.brander;
        self.branded
            .entry(message.id)
            .or_insert_with(|| brander.brand_all(&message.media))
            .clone()
    }
}
