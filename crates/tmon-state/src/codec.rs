//! Wire codec for `CRStates`.
//!
//! The encoding is a JSON object with two top-level fields:
//!
//! ```json
//! {
//!   "caches": { "edge-01": { "isAvailable": true } },
//!   "deliveryServices": {
//!     "ds-video": { "isAvailable": true, "disabledLocations": ["cg-east"] }
//!   }
//! }
//! ```
//!
//! Unknown fields are ignored. Missing fields and wrong value types are
//! rejected; decoding never yields a partially populated value.

use std::path::Path;

use tracing::debug;

use crate::error::{DecodeError, SnapshotFileError};
use crate::types::CRStates;

/// Encode a snapshot for publication or peer exchange.
pub fn marshal(states: &CRStates) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(states)
}

/// Encode a snapshot with indentation, for humans.
pub fn marshal_pretty(states: &CRStates) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec_pretty(states)
}

/// Decode a snapshot received from a peer or read from disk.
pub fn unmarshal(bytes: &[u8]) -> Result<CRStates, DecodeError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read and decode a persisted snapshot file.
pub fn load_snapshot_file(path: &Path) -> Result<CRStates, SnapshotFileError> {
    let bytes = std::fs::read(path).map_err(|source| SnapshotFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let states = unmarshal(&bytes).map_err(|source| SnapshotFileError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        ?path,
        caches = states.cache_count(),
        delivery_services = states.delivery_service_count(),
        "snapshot file loaded"
    );
    Ok(states)
}
