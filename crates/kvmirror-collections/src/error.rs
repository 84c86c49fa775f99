//! Error types for collection operations.

use kvmirror_codec::CodecError;
use kvmirror_store::StoreError;
use thiserror::Error;

/// Errors surfaced by collection operations.
///
/// Decode failures during a bulk refresh are not errors; they are reported
/// through [`Refresh::StaleKept`](crate::Refresh::StaleKept).
#[derive(Debug, Error)]
pub enum CollectionError {
    /// Logical names must be non-empty.
    #[error("invalid collection name: {0:?}")]
    InvalidName(String),

    /// A value could not be encoded, or a single-entry read could not be
    /// decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The store rejected the command or the connection failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Convenience alias for collection operations.
pub type CollectionResult<T> = std::result::Result<T, CollectionError>;
