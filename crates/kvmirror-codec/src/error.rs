//! Error types for encoding and decoding.

use thiserror::Error;

/// Errors raised while converting values to or from their text form.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The JSON codec rejected a value or a piece of text.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// `FromStr` rejected the text.
    #[error("cannot parse {input:?}: {reason}")]
    Parse { input: String, reason: String },

    /// A custom codec rejected the value or the text.
    #[error("invalid data: {0}")]
    Invalid(String),
}

impl CodecError {
    /// Build an [`CodecError::Invalid`] from anything printable.
    pub fn invalid(reason: impl std::fmt::Display) -> Self {
        Self::Invalid(reason.to_string())
    }
}

/// Convenience alias for codec operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;
