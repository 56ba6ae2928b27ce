//! Error types for channel-digest.

/// Top-level error type for the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Message source errors. Fatal to the current channel's run only.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("No dump found for channel {channel} at {path}")]
    DumpNotFound { channel: String, path: String },

    #[error("Failed to read dump for channel {channel}: {source}")]
    Read {
        channel: String,
        source: std::io::Error,
    },

    #[error("Malformed dump for channel {channel}: {source}")]
    Malformed {
        channel: String,
        source: serde_json::Error,
    },
}

/// Post sink errors.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Media branding errors. These never escape the brander — every failure
/// path degrades to a passthrough copy or relocation.
#[derive(Debug, thiserror::Error)]
pub enum BrandError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Overlay tool exited with {status}")]
    ToolFailed { status: std::process::ExitStatus },

    #[error("No overlay tool available")]
    ToolUnavailable,
}

/// Channel run errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Channel fetch failed: {0}")]
    Fetch(#[from] SourceError),

    #[error("Post append failed: {0}")]
    Append(#[from] SinkError),
}

/// Result type alias for the pipeline.
pub type Result<T> = std::result::Result<T, Error>;
