//! Peer exchange transport errors.

use std::time::Duration;

use thiserror::Error;

/// Why a peer snapshot could not be obtained.
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("connect to {address} failed: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http handshake failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("invalid request: {0}")]
    Request(#[from] http::Error),

    #[error("request failed: {0}")]
    Send(#[source] hyper::Error),

    #[error("peer responded with status {0}")]
    Status(http::StatusCode),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Decode(#[from] tmon_state::DecodeError),
}
