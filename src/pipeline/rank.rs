//! Quota-based top-post selection.
//!
//! Picks a bounded, de-duplicated set of messages across competing
//! engagement metrics. Selection is an ordered ladder of strategies — quota
//! ranking, recency, expanded-window re-query — where the first non-empty
//! result wins. Quota shortfalls are not errors.

use std::collections::HashSet;

use tracing::info;

use crate::config::{Quotas, TopPostConfig};
use crate::error::SourceError;
use crate::pipeline::types::{Message, MessageSource, PostMetrics};

/// Fixed metric priority order for quota selection.
pub const METRIC_PRIORITY: [Metric; 3] = [Metric::Likes, Metric::Comments, Metric::Views];

/// Most recent messages pulled when the expanded-window fallback fires.
const EXPANDED_FETCH_CEILING: usize = 500;

/// A ranking key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Likes,
    Comments,
    Views,
}

impl Metric {
    fn value(self, message: &Message) -> u64 {
        match self {
            Self::Likes => message.likes,
            Self::Comments => message.comments,
            Self::Views => message.views,
        }
    }

    fn quota(self, quotas: &Quotas) -> usize {
        let quota = match self {
            Self::Likes => quotas.likes,
            Self::Comments => quotas.comments,
            Self::Views => quotas.views,
        };
        quota as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Likes => "likes",
            Self::Comments => "comments",
            Self::Views => "views",
        }
    }
}

/// A selected message with its metrics captured at selection time.
#[derive(Debug, Clone)]
pub struct Selection {
    pub message: Message,
    pub metrics: PostMetrics,
}

impl Selection {
    fn capture(message: Message) -> Self {
        let metrics = message.metrics();
        Self { message, metrics }
    }
}

/// Quota walk in fixed priority order. A message selected under an earlier
/// metric is skipped under later ones, never double-counted.
pub fn select_by_quotas(pool: &[Message], quotas: &Quotas) -> Vec<Selection> {
    let mut seen: HashSet<i64> = HashSet::new();
    let mut selected = Vec::new();
    for metric in METRIC_PRIORITY {
        let quota = metric.quota(quotas);
        if quota == 0 {
            continue;
        }
        let mut taken = 0;
        for message in ranked_by(pool, metric) {
            if taken >= quota {
                break;
            }
            if !seen.insert(message.id) {
                continue;
            }
            selected.push(Selection::capture(message.clone()));
            taken += 1;
        }
    }
    selected
}

/// The pool ordered descending by one metric. When any member is strictly
/// positive the ordering is restricted to positive values; otherwise the
/// full ordering is kept so a quota can still be filled from an all-zero
/// pool. Ties preserve pool order.
fn ranked_by(pool: &[Message], metric: Metric) -> Vec<&Message> {
    let mut ranked: Vec<&Message> = pool.iter().collect();
    ranked.sort_by(|a, b| metric.value(b).cmp(&metric.value(a)));
    if ranked.iter().any(|m| metric.value(m) > 0) {
        ranked.retain(|m| metric.value(m) > 0);
    }
    ranked
}

/// Window-filtered candidates ordered by timestamp descending, truncated to
/// the cap.
pub fn select_by_recency(pool: &[Message], cap: Option<usize>) -> Vec<Selection> {
    let mut ordered: Vec<&Message> = pool.iter().collect();
    ordered.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    ordered
        .into_iter()
        .take(cap.unwrap_or(usize::MAX))
        .map(|m| Selection::capture(m.clone()))
        .collect()
}

/// Applies the selection ladder over a pre-filtered candidate pool.
pub struct RankingSelector {
    config: TopPostConfig,
}

impl RankingSelector {
    pub fn new(config: TopPostConfig) -> Self {
        Self { config }
    }

    /// Select from `pool`, falling back to recency and then to an
    /// expanded-window re-query of the source. The pool must already be
    /// window-filtered and stripped of excluded media kinds, newest first.
    pub async fn select(
        &self,
        pool: &[Message],
        source: &dyn MessageSource,
        channel: &str,
        desired_total: Option<usize>,
    ) -> Result<Vec<Selection>, SourceError> {
        let mut selected = select_by_quotas(pool, &self.config.quotas);
        if let Some(cap) = desired_total {
            selected.truncate(cap);
        }
        if !selected.is_empty() {
            return Ok(selected);
        }

        info!(channel, "Quota selection empty, falling back to recency");
        let selected = select_by_recency(pool, desired_total);
        if !selected.is_empty() {
            return Ok(selected);
        }

        info!(channel, "Recency fallback empty, expanding search window");
        let recent = source.fetch_recent(channel, EXPANDED_FETCH_CEILING).await?;
        let cap = desired_total.unwrap_or(EXPANDED_FETCH_CEILING);
        Ok(recent
            .into_iter()
            .filter(|m| !m.has_excluded_media())
            .take(cap)
            .map(Selection::capture)
            .collect())
    }
}
