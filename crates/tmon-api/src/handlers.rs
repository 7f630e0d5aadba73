//! Publication handlers.
//!
//! Each handler takes a `snapshot()` (or a single-entry copy) from the
//! store and encodes it after the lock is released.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use tracing::error;

use crate::ApiState;

/// Error body for non-2xx responses.
#[derive(serde::Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ErrorBody {
            error: msg.to_string(),
        }),
    )
}

/// GET /publish/CrStates
pub async fn get_crstates(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.store.snapshot();
    match tmon_state::marshal(&snapshot) {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode crstates");
            error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}

/// GET /publish/CrStates/caches/{name}
pub async fn get_cache(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.store.get_cache(&name) {
        Some(cache) => Json(cache).into_response(),
        None => error_response("cache not found", StatusCode::NOT_FOUND).into_response(),
    }
}

/// GET /publish/PeerStates
pub async fn get_peer_states(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.peers.statuses())
}

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}
