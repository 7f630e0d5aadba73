//! Topology reconciliation — applies a desired set of caches and
//! delivery services to the store.
//!
//! This is what a configuration (re)load does: register newly discovered
//! entries with a default state without touching entries that already
//! exist, then prune everything no longer desired.

use std::collections::HashSet;

use tracing::info;

use crate::store::CRStatesThreadsafe;
use crate::types::*;

/// Desired set of monitored entities, as discovered from configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topology {
    pub caches: HashSet<CacheName>,
    pub delivery_services: HashSet<DeliveryServiceName>,
}

impl Topology {
    pub fn new<C, D>(caches: C, delivery_services: D) -> Self
    where
        C: IntoIterator,
        C::Item: Into<CacheName>,
        D: IntoIterator,
        D::Item: Into<DeliveryServiceName>,
    {
        Self {
            caches: caches.into_iter().map(Into::into).collect(),
            delivery_services: delivery_services.into_iter().map(Into::into).collect(),
        }
    }
}

/// What a reconcile pass changed.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TopologyChange {
    pub caches_added: Vec<CacheName>,
    pub caches_removed: Vec<CacheName>,
    pub delivery_services_added: Vec<DeliveryServiceName>,
    pub delivery_services_removed: Vec<DeliveryServiceName>,
}

impl TopologyChange {
    pub fn is_empty(&self) -> bool {
        self.caches_added.is_empty()
            && self.caches_removed.is_empty()
            && self.delivery_services_added.is_empty()
            && self.delivery_services_removed.is_empty()
    }
}

/// Reconcile the store against `topology`.
///
/// New entries start unavailable until the health pipeline reports
/// otherwise. Removed lists are exactly what the prune operations
/// returned.
pub fn apply_topology(store: &CRStatesThreadsafe, topology: &Topology) -> TopologyChange {
    let mut change = TopologyChange::default();

    let mut caches: Vec<&CacheName> = topology.caches.iter().collect();
    caches.sort();
    for name in caches {
        if store.set_cache_if_not_exists(name.clone(), CacheState::unavailable()) {
            change.caches_added.push(name.clone());
        }
    }

    let mut delivery_services: Vec<&DeliveryServiceName> =
        topology.delivery_services.iter().collect();
    delivery_services.sort();
    for name in delivery_services {
        if store.set_delivery_service_if_not_exists(name.clone(), DeliveryServiceState::new(false)) {
            change.delivery_services_added.push(name.clone());
        }
    }

    change.caches_removed = store.delete_caches_not_in(&topology.caches);
    change.delivery_services_removed =
        store.delete_delivery_services_not_in(&topology.delivery_services);

    info!(
        caches_added = change.caches_added.len(),
        caches_removed = change.caches_removed.len(),
        delivery_services_added = change.delivery_services_added.len(),
        delivery_services_removed = change.delivery_services_removed.len(),
        "topology applied"
    );

    change
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_new_entries_as_unavailable() {
        let store = CRStatesThreadsafe::new();
        let topology = Topology::new(["edge-02", "edge-01"], ["ds-video"]);

        let change = apply_topology(&store, &topology);

        assert_eq!(
            change.caches_added,
            vec![CacheName::from("edge-01"), CacheName::from("edge-02")]
        );
        assert_eq!(change.delivery_services_added, vec![DeliveryServiceName::from("ds-video")]);
        assert_eq!(store.get_cache("edge-01"), Some(CacheState::unavailable()));
        assert_eq!(
            store.get_delivery_service("ds-video"),
            Some(DeliveryServiceState::new(false))
        );
    }

    #[test]
    fn keeps_values_reported_before_registration() {
        let store = CRStatesThreadsafe::new();
        store.set_cache("edge-01".into(), CacheState::available());

        let change = apply_topology(&store, &Topology::new(["edge-01"], Vec::<&str>::new()));

        assert!(change.caches_added.is_empty());
        assert_eq!(store.get_cache("edge-01"), Some(CacheState::available()));
    }

    #[test]
    fn prunes_entries_no_longer_desired() {
        let store = CRStatesThreadsafe::new();
        apply_topology(&store, &Topology::new(["edge-01", "edge-02"], ["ds-a", "ds-b"]));

        let change = apply_topology(&store, &Topology::new(["edge-01"], ["ds-b"]));

        assert_eq!(change.caches_removed, vec![CacheName::from("edge-02")]);
        assert_eq!(change.delivery_services_removed, vec![DeliveryServiceName::from("ds-a")]);
        assert!(store.get_cache("edge-02").is_none());
        assert!(store.get_delivery_service("ds-a").is_none());
    }

    #[test]
    fn reapplying_same_topology_is_a_no_op() {
        let store = CRStatesThreadsafe::new();
        let topology = Topology::new(["edge-01"], ["ds-a"]);
        apply_topology(&store, &topology);

        assert!(apply_topology(&store, &topology).is_empty());
    }
}
