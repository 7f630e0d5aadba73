//! tmon-api — publication endpoints for a traffic monitor.
//!
//! Serves the local availability snapshot to routers and peer monitors,
//! and the peer-view cache for inspection.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/publish/CrStates` | Local `CRStates` in wire format |
//! | GET | `/publish/CrStates/caches/{name}` | One cache's local state |
//! | GET | `/publish/PeerStates` | Per-peer freshness and last snapshot |
//! | GET | `/health` | Liveness |

pub mod handlers;

use axum::routing::get;
use axum::Router;
use tmon_peer::PeerStates;
use tmon_state::CRStatesThreadsafe;

/// Shared state for publication handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: CRStatesThreadsafe,
    pub peers: PeerStates,
}

/// Build the publication router.
pub fn build_router(store: CRStatesThreadsafe, peers: PeerStates) -> Router {
    let state = ApiState { store, peers };

    Router::new()
        .route("/publish/CrStates", get(handlers::get_crstates))
        .route("/publish/CrStates/caches/{name}", get(handlers::get_cache))
        .route("/publish/PeerStates", get(handlers::get_peer_states))
        .route("/health", get(handlers::health))
        .with_state(state)
}
