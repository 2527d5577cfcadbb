//! Error types for MediCore.

use thiserror::Error;

/// Library-level error type for MediCore operations.
#[derive(Error, Debug)]
pub enum MediCoreError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Sandbox error: {0}")]
    Sandbox(String),

    #[error("Import of '{module}' is not allowed. Authorized imports are: {allowed}")]
    ImportNotAllowed { module: String, allowed: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Agent exceeded maximum steps ({0})")]
    MaxSteps(usize),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Result type alias for MediCore operations.
pub type Result<T> = std::result::Result<T, MediCoreError>;
