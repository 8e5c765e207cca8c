//! Error types for docsync.

use thiserror::Error;

/// Errors that can occur while encoding or decoding docsync data.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A wire message with no bytes cannot carry a tag
    #[error("empty frame")]
    EmptyFrame,

    /// Tag byte outside the known frame kinds
    #[error("unknown frame tag: {0}")]
    UnknownTag(u8),

    /// Invalid data format
    #[error("invalid data: {0}")]
    InvalidData(String),
}
