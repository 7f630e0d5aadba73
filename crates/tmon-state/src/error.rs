//! Error types for the availability codec.
//!
//! The store itself is infallible; only decoding foreign bytes and
//! reading persisted snapshots can fail.

use std::path::PathBuf;

use thiserror::Error;

/// A serialized `CRStates` payload could not be decoded.
///
/// Wraps the underlying JSON error, which carries line/column and the
/// missing or mistyped field.
#[derive(Debug, Error)]
#[error("malformed crstates payload: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

impl DecodeError {
    /// True if the input ended before a complete document was read.
    pub fn is_truncated(&self) -> bool {
        self.0.is_eof()
    }
}

/// Reading a persisted snapshot file failed.
#[derive(Debug, Error)]
pub enum SnapshotFileError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
}
