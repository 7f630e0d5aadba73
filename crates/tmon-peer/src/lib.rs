//! tmon-peer — availability exchange between monitor instances.
//!
//! Each monitor publishes its own `CRStates` and pulls its peers'. Peer
//! snapshots land in a [`PeerStates`] view that sits beside, never on
//! top of, the local store.
//!
//! # Architecture
//!
//! ```text
//! PeerPoller
//!   ├── Per-peer background task
//!   │   ├── PollTracker (consecutive failures, backoff)
//!   │   ├── fetch_crstates() → CRStates | PeerError
//!   │   └── PeerStates::set(peer, snapshot)
//!   └── sync_peers() on config reload
//! ```
//!
//! A peer snapshot replaces the previous one for that peer wholesale.
//! Failed polls leave the last snapshot in place; once it ages past the
//! freshness threshold the peer reads as unknown, not as "everything
//! unavailable". Quorum over peer views belongs to downstream consumers.

pub mod error;
pub mod fetch;
pub mod poller;
pub mod states;

pub use error::PeerError;
pub use fetch::fetch_crstates;
pub use poller::{PeerPoller, PollConfig, PollTracker};
pub use states::{PeerAvailability, PeerName, PeerStates, PeerStatus, PeerView};
