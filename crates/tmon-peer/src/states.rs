//! Peer-view cache — the most recent snapshot received from each peer.
//!
//! Kept separate from the local `CRStatesThreadsafe`; nothing here ever
//! writes into the local store.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use tmon_state::CRStates;

/// Identity of a peer monitor.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct PeerName(String);

impl PeerName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PeerName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// What we currently know about one peer.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerView {
    /// A snapshot received within the freshness threshold.
    Known(CRStates),
    /// Never heard from, or the last snapshot is stale.
    Unknown,
}

/// One peer's opinion about a single entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerAvailability {
    Available,
    Unavailable,
    /// Peer is stale or does not report this entity.
    Unknown,
}

/// Per-peer status for publication.
#[derive(Debug, Clone, Serialize)]
pub struct PeerStatus {
    pub name: PeerName,
    pub fresh: bool,
    /// Milliseconds since the last snapshot arrived.
    pub age_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub states: Option<CRStates>,
}

struct PeerSnapshot {
    states: CRStates,
    received_at: Instant,
}

/// Thread-safe map of peer name → most recent snapshot.
#[derive(Clone)]
pub struct PeerStates {
    snapshots: Arc<RwLock<BTreeMap<PeerName, PeerSnapshot>>>,
    freshness: Duration,
}

impl PeerStates {
    /// Create an empty view; snapshots older than `freshness` read as unknown.
    pub fn new(freshness: Duration) -> Self {
        Self {
            snapshots: Arc::new(RwLock::new(BTreeMap::new())),
            freshness,
        }
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    /// Record a peer's snapshot, replacing whatever it sent before.
    pub fn set(&self, peer: PeerName, states: CRStates) {
        let snapshot = PeerSnapshot {
            states,
            received_at: Instant::now(),
        };
        let mut snapshots = self.snapshots.write().expect("peer states lock");
        snapshots.insert(peer, snapshot);
    }

    /// The peer's snapshot if it is fresh.
    pub fn get(&self, peer: &PeerName) -> PeerView {
        let snapshots = self.snapshots.read().expect("peer states lock");
        match snapshots.get(peer) {
            Some(snap) if self.is_fresh(snap) => PeerView::Known(snap.states.clone()),
            _ => PeerView::Unknown,
        }
    }

    /// Copies of every fresh snapshot.
    pub fn fresh_snapshots(&self) -> BTreeMap<PeerName, CRStates> {
        let snapshots = self.snapshots.read().expect("peer states lock");
        snapshots
            .iter()
            .filter(|(_, snap)| self.is_fresh(snap))
            .map(|(name, snap)| (name.clone(), snap.states.clone()))
            .collect()
    }

    /// Each tracked peer's view of one cache.
    pub fn cache_availability(&self, cache: &str) -> BTreeMap<PeerName, PeerAvailability> {
        let snapshots = self.snapshots.read().expect("peer states lock");
        snapshots
            .iter()
            .map(|(name, snap)| {
                let availability = if !self.is_fresh(snap) {
                    PeerAvailability::Unknown
                } else {
                    match snap.states.caches.get(cache) {
                        Some(state) if state.is_available => PeerAvailability::Available,
                        Some(_) => PeerAvailability::Unavailable,
                        None => PeerAvailability::Unknown,
                    }
                };
                (name.clone(), availability)
            })
            .collect()
    }

    /// Status of every tracked peer.
    pub fn statuses(&self) -> Vec<PeerStatus> {
        let snapshots = self.snapshots.read().expect("peer states lock");
        snapshots
            .iter()
            .map(|(name, snap)| {
                let fresh = self.is_fresh(snap);
                PeerStatus {
                    name: name.clone(),
                    fresh,
                    age_ms: as_millis_u64(snap.received_at.elapsed()),
                    states: fresh.then(|| snap.states.clone()),
                }
            })
            .collect()
    }

    /// Forget peers that are no longer configured. Returns the removed names.
    pub fn remove_peers_not_in(&self, keep: &HashSet<PeerName>) -> Vec<PeerName> {
        let removed: Vec<PeerName> = {
            let mut snapshots = self.snapshots.write().expect("peer states lock");
            let stale: Vec<PeerName> = snapshots
                .keys()
                .filter(|name| !keep.contains(*name))
                .cloned()
                .collect();
            for name in &stale {
                snapshots.remove(name);
            }
            stale
        };
        if !removed.is_empty() {
            debug!(removed = removed.len(), "forgot unconfigured peers");
        }
        removed
    }

    fn is_fresh(&self, snap: &PeerSnapshot) -> bool {
        snap.received_at.elapsed() <= self.freshness
    }
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
pub(crate) fn as_millis_u64(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tmon_state::{CacheState, DeliveryServiceState};

    fn states_with(cache: &str, available: bool) -> CRStates {
        let mut states = CRStates::new();
        states.caches.insert(cache.into(), CacheState { is_available: available });
        states
    }

    #[test]
    fn unknown_until_first_snapshot() {
        let peers = PeerStates::new(Duration::from_secs(30));
        assert_eq!(peers.get(&"tm-02".into()), PeerView::Unknown);
        assert!(peers.fresh_snapshots().is_empty());
    }

    #[test]
    fn snapshot_replaces_previous_wholesale() {
        let peers = PeerStates::new(Duration::from_secs(30));
        let mut first = states_with("edge-01", true);
        first
            .delivery_services
            .insert("ds".into(), DeliveryServiceState::new(true));
        peers.set("tm-02".into(), first);
        peers.set("tm-02".into(), states_with("edge-02", false));

        match peers.get(&"tm-02".into()) {
            PeerView::Known(states) => {
                assert_eq!(states.cache_count(), 1);
                assert!(states.caches.contains_key("edge-02"));
                assert_eq!(states.delivery_service_count(), 0);
            }
            PeerView::Unknown => panic!("expected a fresh snapshot"),
        }
    }

    #[test]
    fn stale_snapshot_reads_as_unknown() {
        let peers = PeerStates::new(Duration::from_millis(10));
        peers.set("tm-02".into(), states_with("edge-01", true));
        std::thread::sleep(Duration::from_millis(30));

        assert_eq!(peers.get(&"tm-02".into()), PeerView::Unknown);
        assert!(peers.fresh_snapshots().is_empty());
        assert_eq!(
            peers.cache_availability("edge-01")[&PeerName::from("tm-02")],
            PeerAvailability::Unknown
        );

        let statuses = peers.statuses();
        assert_eq!(statuses.len(), 1);
        assert!(!statuses[0].fresh);
        assert!(statuses[0].states.is_none());
    }

    #[test]
    fn cache_availability_per_peer() {
        let peers = PeerStates::new(Duration::from_secs(30));
        peers.set("tm-02".into(), states_with("edge-01", true));
        peers.set("tm-03".into(), states_with("edge-01", false));
        peers.set("tm-04".into(), states_with("edge-99", true));

        let view = peers.cache_availability("edge-01");
        assert_eq!(view[&PeerName::from("tm-02")], PeerAvailability::Available);
        assert_eq!(view[&PeerName::from("tm-03")], PeerAvailability::Unavailable);
        assert_eq!(view[&PeerName::from("tm-04")], PeerAvailability::Unknown);
    }

    #[test]
    fn remove_peers_not_in_forgets_unconfigured() {
        let peers = PeerStates::new(Duration::from_secs(30));
        peers.set("tm-02".into(), CRStates::new());
        peers.set("tm-03".into(), CRStates::new());

        let keep: HashSet<PeerName> = [PeerName::from("tm-02")].into_iter().collect();
        assert_eq!(peers.remove_peers_not_in(&keep), vec![PeerName::from("tm-03")]);
        assert_eq!(peers.statuses().len(), 1);
    }

    #[test]
    fn millis_conversion_saturates() {
        assert_eq!(as_millis_u64(Duration::from_millis(1500)), 1500);
        assert_eq!(as_millis_u64(Duration::MAX), u64::MAX);
    }
}
