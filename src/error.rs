//! Error types for Pivizion

use thiserror::Error;

/// Result type alias for Pivizion operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during a visualize run
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (unreadable file, bad boolean, missing key)
    #[error("configuration error: {0}")]
    Config(String),

    /// Camera could not be opened or produced no frame
    #[error("capture error: {0}")]
    Capture(String),

    /// Image analysis request failed or returned an error
    #[error("analysis error: {0}")]
    Analysis(String),

    /// Speech synthesis request failed or was rejected
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Audio output error
    #[error("playback error: {0}")]
    Playback(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Name of the pipeline stage the error belongs to
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Config(_) | Self::Toml(_) => "config",
            Self::Capture(_) => "capture",
            Self::Analysis(_) => "analysis",
            Self::Synthesis(_) => "synthesis",
            Self::Playback(_) => "playback",
            Self::Io(_) => "io",
        }
    }
}
