//! Error types for raster-core.

use thiserror::Error;

/// Result type alias using RasterError.
pub type Result<T> = std::result::Result<T, RasterError>;

/// Errors surfaced by the configuration and persistence layers.
///
/// Per-pixel and per-tile operations never produce these; they report
/// "no data" through `Option` or null pixel values instead.
#[derive(Debug, Error)]
pub enum RasterError {
    #[error("malformed keyword list line {line}: {message}")]
    KeywordSyntax { line: usize, message: String },

    #[error("invalid value for keyword '{key}': {message}")]
    KeywordValue { key: String, message: String },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("unsupported scalar type: {0}")]
    UnsupportedScalar(String),
}

impl RasterError {
    /// Create a KeywordValue error.
    pub fn keyword(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::KeywordValue {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidState error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}
