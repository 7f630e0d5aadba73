//! tmon-state — availability state for a traffic monitor node.
//!
//! Holds the live view of which caches and delivery services are
//! available (`CRStates`), behind a single lock in [`CRStatesThreadsafe`].
//!
//! # Architecture
//!
//! ```text
//! CRStatesThreadsafe (Arc<RwLock<CRStates>>)
//!   ├── health pipeline   → set_cache / set_delivery_service
//!   ├── config reloader   → *_if_not_exists / delete_*_not_in (apply_topology)
//!   └── publishers, peers → snapshot() → codec::marshal
//! ```
//!
//! Every operation is a single critical section. Callers never compose a
//! check and a mutation themselves; the compound operations
//! (`set_cache_if_not_exists`, `delete_caches_not_in`, ...) exist so they
//! don't have to. Encoding and I/O happen on `snapshot()` copies, outside
//! the lock.

pub mod codec;
pub mod error;
pub mod store;
pub mod topology;
pub mod types;

pub use codec::{load_snapshot_file, marshal, marshal_pretty, unmarshal};
pub use error::{DecodeError, SnapshotFileError};
pub use store::CRStatesThreadsafe;
pub use topology::{apply_topology, Topology, TopologyChange};
pub use types::*;
