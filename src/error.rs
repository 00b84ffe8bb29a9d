//! Error types for Vapord.

use thiserror::Error;

/// Library-level error type for Vapord operations.
#[derive(Error, Debug)]
pub enum VaporError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I need a bigger query!")]
    QueryTooShort,

    #[error("Could not find a video that fits the maximum duration for {0}")]
    NoSuitableVideo(String),

    #[error("Could not find the chorus of {0}")]
    NoChorusFound(String),

    #[error("Video lookup failed: {0}")]
    Lookup(String),

    #[error("Audio download failed: {0}")]
    Download(String),

    #[error("Chorus extraction failed: {0}")]
    ChorusTool(String),

    #[error("Audio effect failed: {0}")]
    Effect(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl VaporError {
    /// Whether this error should be shown to the requesting user verbatim.
    ///
    /// Domain failures carry a diagnostic title and are safe to surface;
    /// everything else gets a generic reply and a server-side log entry.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            VaporError::QueryTooShort
                | VaporError::NoSuitableVideo(_)
                | VaporError::NoChorusFound(_)
        )
    }
}

/// Result type alias for Vapord operations.
pub type Result<T> = std::result::Result<T, VaporError>;
