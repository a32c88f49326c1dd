//! Error types for the financial canvas agent

use thiserror::Error;

/// Result type alias for canvas operations
pub type Result<T> = std::result::Result<T, CanvasError>;

#[derive(Error, Debug)]
pub enum CanvasError {

    // =============================
    // Domain Errors
    // =============================

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Upload error: {0}")]
    UploadError(String),

    #[error("Extraction error: {0}")]
    ExtractionError(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("Tool error: {0}")]
    ToolError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Readline error: {0}")]
    ReadlineError(#[from] rustyline::error::ReadlineError),
}
