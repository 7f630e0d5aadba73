//! CRStatesThreadsafe — the shared, lock-guarded availability store.
//!
//! One instance exists per monitor process and is handed (cloned) to
//! every collaborator at startup. All reads and writes take the same
//! `RwLock`; every method is one critical section and returns owned
//! copies, never references into the live maps.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::types::*;

/// Thread-safe handle to one `CRStates` aggregate.
///
/// Cloning the handle shares the underlying state.
#[derive(Clone, Default)]
pub struct CRStatesThreadsafe {
    states: Arc<RwLock<CRStates>>,
}

impl CRStatesThreadsafe {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with an existing snapshot.
    pub fn from_states(states: CRStates) -> Self {
        Self {
            states: Arc::new(RwLock::new(states)),
        }
    }

    // ── Caches ─────────────────────────────────────────────────────

    /// Look up one cache.
    pub fn get_cache(&self, name: &str) -> Option<CacheState> {
        let states = self.states.read().expect("crstates lock");
        states.caches.get(name).copied()
    }

    /// Insert or overwrite a cache's state.
    pub fn set_cache(&self, name: CacheName, state: CacheState) {
        let mut states = self.states.write().expect("crstates lock");
        states.caches.insert(name, state);
    }

    /// Insert a cache only if no entry exists yet.
    ///
    /// Returns `true` if this call inserted the entry. An existing entry
    /// is left exactly as it was.
    pub fn set_cache_if_not_exists(&self, name: CacheName, state: CacheState) -> bool {
        let mut states = self.states.write().expect("crstates lock");
        if states.caches.contains_key(&name) {
            return false;
        }
        states.caches.insert(name, state);
        true
    }

    /// Remove one cache. Returns true if it existed.
    pub fn delete_cache(&self, name: &str) -> bool {
        let existed = {
            let mut states = self.states.write().expect("crstates lock");
            states.caches.remove(name).is_some()
        };
        debug!(cache = %name, existed, "cache state deleted");
        existed
    }

    /// Remove every cache whose name is not in `keep`.
    ///
    /// Returns the removed names in key order. The scan and the removal
    /// happen under one write lock.
    pub fn delete_caches_not_in(&self, keep: &HashSet<CacheName>) -> Vec<CacheName> {
        let removed = {
            let mut states = self.states.write().expect("crstates lock");
            prune_not_in(&mut states.caches, keep)
        };
        if !removed.is_empty() {
            debug!(removed = removed.len(), "pruned cache states");
        }
        removed
    }

    /// Copy of every cache state.
    pub fn caches(&self) -> BTreeMap<CacheName, CacheState> {
        let states = self.states.read().expect("crstates lock");
        states.caches.clone()
    }

    // ── Delivery services ──────────────────────────────────────────

    /// Look up one delivery service.
    pub fn get_delivery_service(&self, name: &str) -> Option<DeliveryServiceState> {
        let states = self.states.read().expect("crstates lock");
        states.delivery_services.get(name).cloned()
    }

    /// Insert or overwrite a delivery service's state.
    pub fn set_delivery_service(&self, name: DeliveryServiceName, state: DeliveryServiceState) {
        let mut states = self.states.write().expect("crstates lock");
        states.delivery_services.insert(name, state);
    }

    /// Insert a delivery service only if no entry exists yet.
    ///
    /// Returns `true` if this call inserted the entry.
    pub fn set_delivery_service_if_not_exists(
        &self,
        name: DeliveryServiceName,
        state: DeliveryServiceState,
    ) -> bool {
        let mut states = self.states.write().expect("crstates lock");
        if states.delivery_services.contains_key(&name) {
            return false;
        }
        states.delivery_services.insert(name, state);
        true
    }

    /// Remove one delivery service. Returns true if it existed.
    pub fn delete_delivery_service(&self, name: &str) -> bool {
        let existed = {
            let mut states = self.states.write().expect("crstates lock");
            states.delivery_services.remove(name).is_some()
        };
        debug!(delivery_service = %name, existed, "delivery service state deleted");
        existed
    }

    /// Remove every delivery service whose name is not in `keep`.
    ///
    /// Returns the removed names in key order.
    pub fn delete_delivery_services_not_in(
        &self,
        keep: &HashSet<DeliveryServiceName>,
    ) -> Vec<DeliveryServiceName> {
        let removed = {
            let mut states = self.states.write().expect("crstates lock");
            prune_not_in(&mut states.delivery_services, keep)
        };
        if !removed.is_empty() {
            debug!(removed = removed.len(), "pruned delivery service states");
        }
        removed
    }

    /// Copy of every delivery service state.
    pub fn delivery_services(&self) -> BTreeMap<DeliveryServiceName, DeliveryServiceState> {
        let states = self.states.read().expect("crstates lock");
        states.delivery_services.clone()
    }

    // ── Whole aggregate ────────────────────────────────────────────

    /// Independent point-in-time copy of the whole aggregate.
    pub fn snapshot(&self) -> CRStates {
        let states = self.states.read().expect("crstates lock");
        states.clone()
    }

    /// Replace the whole aggregate (full re-initialization).
    pub fn replace(&self, new_states: CRStates) {
        let mut states = self.states.write().expect("crstates lock");
        *states = new_states;
    }
}

/// Remove entries whose key is absent from `keep`, returning the removed keys.
fn prune_not_in<K, V>(map: &mut BTreeMap<K, V>, keep: &HashSet<K>) -> Vec<K>
where
    K: Ord + std::hash::Hash + Clone,
{
    let removed: Vec<K> = map.keys().filter(|k| !keep.contains(*k)).cloned().collect();
    for key in &removed {
        map.remove(key);
    }
    removed
}
