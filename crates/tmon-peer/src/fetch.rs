//! HTTP fetch of a peer's published `CRStates`.

use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Limited};
use tracing::debug;

use tmon_state::CRStates;

use crate::error::PeerError;

/// Upper bound on a peer payload.
pub const MAX_PEER_PAYLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Fetch and decode a peer's snapshot from `http://{address}{path}`.
///
/// The whole exchange (connect, request, body, decode) is bounded by
/// `timeout`. Nothing is returned unless the payload decodes completely.
pub async fn fetch_crstates(
    address: &str,
    path: &str,
    timeout: Duration,
) -> Result<CRStates, PeerError> {
    let uri = format!("http://{address}{path}");

    let result = tokio::time::timeout(timeout, async {
        let stream = tokio::net::TcpStream::connect(address)
            .await
            .map_err(|source| PeerError::Connect {
                address: address.to_string(),
                source,
            })?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(PeerError::Handshake)?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(&uri)
            .header("host", address)
            .header("accept", "application/json")
            .header("user-agent", "tmon-peer/0.1")
            .body(Empty::<Bytes>::new())?;

        let resp = sender.send_request(req).await.map_err(PeerError::Send)?;
        if !resp.status().is_success() {
            return Err(PeerError::Status(resp.status()));
        }

        let body = Limited::new(resp.into_body(), MAX_PEER_PAYLOAD_BYTES)
            .collect()
            .await
            .map_err(|e| PeerError::Body(e.to_string()))?
            .to_bytes();

        Ok::<CRStates, PeerError>(tmon_state::unmarshal(&body)?)
    })
    .await;

    match result {
        Ok(Ok(states)) => {
            debug!(
                %uri,
                caches = states.cache_count(),
                delivery_services = states.delivery_service_count(),
                "peer snapshot fetched"
            );
            Ok(states)
        }
        Ok(Err(e)) => Err(e),
        Err(_) => Err(PeerError::Timeout(timeout)),
    }
}
