//! Domain types for traffic monitor availability state.
//!
//! `CRStates` is the full snapshot one monitor holds: every cache it
//! knows about and every delivery service, each with an availability
//! flag. Maps are ordered so encoded output and prune results come out
//! in a stable order.

use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Define an opaque string identifier usable as a map key.
///
/// `Borrow<str>` lets sets of names be probed with plain `&str`.
macro_rules! name_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

name_type!(
    /// Name of an individual content-serving cache.
    CacheName
);

name_type!(
    /// Name of a delivery service.
    DeliveryServiceName
);

name_type!(
    /// Name of a cache group (an administrative grouping of caches).
    CacheGroupName
);

// ── Records ────────────────────────────────────────────────────────

/// Last-known health of one cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheState {
    pub is_available: bool,
}

impl CacheState {
    pub fn available() -> Self {
        Self { is_available: true }
    }

    pub fn unavailable() -> Self {
        Self { is_available: false }
    }
}

/// Availability of a delivery service and the cache groups excluded from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryServiceState {
    pub is_available: bool,
    /// Encoded as a list; duplicates collapse on decode.
    pub disabled_locations: BTreeSet<CacheGroupName>,
}

impl DeliveryServiceState {
    pub fn new(is_available: bool) -> Self {
        Self {
            is_available,
            disabled_locations: BTreeSet::new(),
        }
    }

    /// Builder-style helper to exclude a cache group.
    pub fn with_disabled_location(mut self, group: impl Into<CacheGroupName>) -> Self {
        self.disabled_locations.insert(group.into());
        self
    }
}

// ── Aggregate ──────────────────────────────────────────────────────

/// Complete availability snapshot for one monitor at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CRStates {
    pub caches: BTreeMap<CacheName, CacheState>,
    pub delivery_services: BTreeMap<DeliveryServiceName, DeliveryServiceState>,
}

impl CRStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_count(&self) -> usize {
        self.caches.len()
    }

    pub fn delivery_service_count(&self) -> usize {
        self.delivery_services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caches.is_empty() && self.delivery_services.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn names_compare_by_value() {
        assert_eq!(CacheName::from("edge-01"), CacheName::new("edge-01".to_string()));
        assert!(CacheName::from("a") < CacheName::from("b"));
        assert_eq!(DeliveryServiceName::from("ds").to_string(), "ds");
    }

    #[test]
    fn name_sets_probe_with_str() {
        let keep: HashSet<CacheName> = [CacheName::from("edge-01"), CacheName::from("edge-02")]
            .into_iter()
            .collect();
        assert!(keep.contains("edge-01"));
        assert!(!keep.contains("edge-03"));
    }

    #[test]
    fn disabled_locations_have_set_semantics() {
        let ds = DeliveryServiceState::new(true)
            .with_disabled_location("cg-east")
            .with_disabled_location("cg-east")
            .with_disabled_location("cg-west");
        assert_eq!(ds.disabled_locations.len(), 2);
    }

    #[test]
    fn empty_aggregate() {
        let states = CRStates::new();
        assert!(states.is_empty());
        assert_eq!(states.cache_count(), 0);
        assert_eq!(states.delivery_service_count(), 0);
    }
}
