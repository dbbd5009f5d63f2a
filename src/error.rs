//! Error types for Undertone.

use thiserror::Error;

/// Library-level error type for Undertone operations.
#[derive(Error, Debug)]
pub enum UndertoneError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Audio decode failed: {0}")]
    Decode(String),

    #[error("Audio encode failed: {0}")]
    Encode(String),

    #[error("Resampling failed: {0}")]
    Resample(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Classification failed: {0}")]
    Classification(String),

    #[error("BGM catalog error: {0}")]
    Catalog(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type alias for Undertone operations.
pub type Result<T> = std::result::Result<T, UndertoneError>;
