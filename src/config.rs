//! Configuration types.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Source channels, processed strictly one after another.
    pub channels: Vec<String>,
    /// Recent-fetch bound in sequential mode; emission cap in top-posts mode.
    pub limit: usize,
    /// Processing mode.
    pub mode: RunMode,
    pub merge: MergeConfig,
    pub top_posts: TopPostConfig,
    pub branding: BrandingConfig,
    /// Directory of exported channel dumps (`<channel>.json`).
    pub dump_dir: PathBuf,
    /// Ephemeral scratch directory for branded media. Safe to clear between runs.
    pub scratch_dir: PathBuf,
    /// Per-channel watermark file.
    pub cursor_path: PathBuf,
    /// Local database file for the durable sink; in-memory sink when absent.
    pub db_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            channels: Vec::new(),
            limit: 100,
            mode: RunMode::Sequential,
            merge: MergeConfig::default(),
            top_posts: TopPostConfig::default(),
            branding: BrandingConfig::default(),
            dump_dir: PathBuf::from("dumps"),
            scratch_dir: PathBuf::from("scratch"),
            cursor_path: PathBuf::from("cursors.json"),
            db_path: None,
        }
    }
}

impl AppConfig {
    /// Load and validate configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "channels".into(),
                message: "at least one source channel is required".into(),
            });
        }
        if self.limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "limit".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.merge.window_seconds < 0 {
            return Err(ConfigError::InvalidValue {
                key: "merge.window_seconds".into(),
                message: "must not be negative".into(),
            });
        }
        if self.top_posts.period_days <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "top_posts.period_days".into(),
                message: "must be positive".into(),
            });
        }
        Ok(())
    }
}

/// Processing mode for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Chronological merge of every fetched message.
    Sequential,
    /// Quota-based selection of top messages by engagement metrics.
    TopPosts,
}

/// Adjacent-message merge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Maximum time between a leading message and a merge candidate.
    /// The bound is inclusive: a candidate exactly this far away still merges.
    pub window_seconds: i64,
    /// How many following messages a leading message may scan (and absorb).
    pub lookahead: usize,
    /// Strict mode: merge only when exactly one side supplies the missing
    /// field. When false, any complementary contribution merges.
    pub only_if_one_has_no_text: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            window_seconds: 600,
            lookahead: 2,
            only_if_one_has_no_text: true,
        }
    }
}

/// Top-posts selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopPostConfig {
    /// Selection window in days. Fractional values are supported
    /// (0.5 = 12 hours); clamped to a 0.001-day floor at use.
    pub period_days: f64,
    pub quotas: Quotas,
}

impl Default for TopPostConfig {
    fn default() -> Self {
        Self {
            period_days: 7.0,
            quotas: Quotas::default(),
        }
    }
}

/// Per-metric selection quotas. Priority order is fixed:
/// likes, then comments, then views.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Quotas {
    pub likes: u32,
    pub comments: u32,
    pub views: u32,
}

impl Default for Quotas {
    fn default() -> Self {
        Self {
            likes: 2,
            comments: 2,
            views: 2,
        }
    }
}

/// Logo overlay settings for media branding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandingConfig {
    /// Logo asset. A missing file is a normal condition: media passes
    /// through unbranded.
    pub logo_path: PathBuf,
    pub position: LogoPosition,
    /// Offset from both anchored edges, in pixels.
    pub margin_pixels: u32,
}

impl Default for BrandingConfig {
    fn default() -> Self {
        Self {
            logo_path: PathBuf::from("assets/logo.png"),
            position: LogoPosition::BottomRight,
            margin_pixels: 24,
        }
    }
}

/// Corner anchor for the image logo overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogoPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl LogoPosition {
    pub fn is_left(self) -> bool {
        matches!(self, Self::TopLeft | Self::BottomLeft)
    }

    pub fn is_top(self) -> bool {
        matches!(self, Self::TopLeft | Self::TopRight)
    }
}
