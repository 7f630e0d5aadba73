//! Peer poller — background tasks that pull peer snapshots.
//!
//! `PeerPoller` spawns one task per peer. Each task periodically fetches
//! the peer's published `CRStates` and records it in `PeerStates`.
//! Failures back off exponentially and leave the last snapshot alone.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::PeerError;
use crate::fetch::fetch_crstates;
use crate::states::{as_millis_u64, PeerName, PeerStates};

/// Default path peers publish their local snapshot on.
pub const DEFAULT_PEER_PATH: &str = "/publish/CrStates";

/// How peers are polled.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub timeout: Duration,
    pub path: String,
    pub max_backoff: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(2),
            path: DEFAULT_PEER_PATH.to_string(),
            max_backoff: Duration::from_secs(60),
        }
    }
}

/// Tracks consecutive poll outcomes for one peer.
#[derive(Debug)]
pub struct PollTracker {
    consecutive_failures: u32,
    current_backoff: Duration,
    base_interval: Duration,
    max_backoff: Duration,
}

impl PollTracker {
    pub fn new(base_interval: Duration, max_backoff: Duration) -> Self {
        Self {
            consecutive_failures: 0,
            current_backoff: base_interval,
            base_interval,
            max_backoff,
        }
    }

    /// A snapshot arrived: reset backoff.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.current_backoff = self.base_interval;
    }

    /// A poll failed: double the interval up to the cap.
    ///
    /// The cap never pulls the delay below the base interval.
    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        let cap = self.max_backoff.max(self.base_interval);
        self.current_backoff = self.current_backoff.saturating_mul(2).min(cap);
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Delay before the next poll.
    pub fn next_interval(&self) -> Duration {
        self.current_backoff
    }
}

struct PollSlot {
    address: String,
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl PollSlot {
    fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        self.handle.abort();
    }
}

/// Manages poll tasks for all configured peers.
pub struct PeerPoller {
    peers: PeerStates,
    config: PollConfig,
    /// Active pollers: peer name → slot.
    slots: Arc<RwLock<HashMap<PeerName, PollSlot>>>,
}

impl PeerPoller {
    pub fn new(peers: PeerStates, config: PollConfig) -> Self {
        Self {
            peers,
            config,
            slots: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The peer-view cache this poller writes into.
    pub fn peer_states(&self) -> &PeerStates {
        &self.peers
    }

    /// Start polling a peer at `address` (`host:port`).
    ///
    /// Replaces an existing poller for the same peer.
    pub async fn start_peer(&self, name: PeerName, address: &str) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run_poll_loop(
            name.clone(),
            address.to_string(),
            self.config.clone(),
            self.peers.clone(),
            shutdown_rx,
        ));

        let mut slots = self.slots.write().await;
        let slot = PollSlot {
            address: address.to_string(),
            handle,
            shutdown_tx,
        };
        if let Some(old) = slots.insert(name.clone(), slot) {
            old.stop();
        }

        info!(peer = %name, %address, "peer poller started");
    }

    /// Stop polling a peer. Its last snapshot stays until pruned.
    pub async fn stop_peer(&self, name: &PeerName) {
        let mut slots = self.slots.write().await;
        if let Some(slot) = slots.remove(name) {
            slot.stop();
            info!(peer = %name, "peer poller stopped");
        }
    }

    /// Stop all pollers (for graceful shutdown).
    pub async fn stop_all(&self) {
        let mut slots = self.slots.write().await;
        for (name, slot) in slots.drain() {
            slot.stop();
            debug!(peer = %name, "peer poller stopped");
        }
        info!("all peer pollers stopped");
    }

    /// Names of peers currently being polled.
    pub async fn active_peers(&self) -> Vec<PeerName> {
        let slots = self.slots.read().await;
        let mut names: Vec<PeerName> = slots.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn is_polling(&self, name: &PeerName) -> bool {
        let slots = self.slots.read().await;
        slots.contains_key(name)
    }

    /// Converge the running pollers on `desired` (peer name → address).
    ///
    /// Starts new peers, restarts peers whose address changed, stops
    /// peers no longer desired and forgets their snapshots.
    pub async fn sync_peers(&self, desired: &HashMap<PeerName, String>) {
        let (to_stop, to_start): (Vec<PeerName>, Vec<(PeerName, String)>) = {
            let slots = self.slots.read().await;
            let to_stop = slots
                .keys()
                .filter(|name| !desired.contains_key(*name))
                .cloned()
                .collect();
            let to_start = desired
                .iter()
                .filter(|(name, address)| {
                    slots.get(*name).is_none_or(|slot| &slot.address != *address)
                })
                .map(|(name, address)| (name.clone(), address.clone()))
                .collect();
            (to_stop, to_start)
        };

        for name in &to_stop {
            self.stop_peer(name).await;
        }
        for (name, address) in to_start {
            self.start_peer(name, &address).await;
        }

        let keep: HashSet<PeerName> = desired.keys().cloned().collect();
        self.peers.remove_peers_not_in(&keep);
    }
}

/// The poll loop for a single peer.
async fn run_poll_loop(
    name: PeerName,
    address: String,
    config: PollConfig,
    peers: PeerStates,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tracker = PollTracker::new(config.interval, config.max_backoff);
    // First poll goes out right away; later ones follow the tracker.
    let mut delay = Duration::ZERO;

    debug!(peer = %name, %address, "peer poll loop starting");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                match fetch_crstates(&address, &config.path, config.timeout).await {
                    Ok(states) => {
                        if tracker.consecutive_failures() > 0 {
                            info!(peer = %name, "peer reachable again");
                        }
                        tracker.record_success();
                        peers.set(name.clone(), states);
                    }
                    Err(e) => {
                        tracker.record_failure();
                        log_poll_failure(&name, &e, &tracker);
                    }
                }
                delay = tracker.next_interval();
            }
            _ = shutdown.changed() => {
                debug!(peer = %name, "peer poll loop shutting down");
                break;
            }
        }
    }
}

fn log_poll_failure(name: &PeerName, error: &PeerError, tracker: &PollTracker) {
    warn!(
        peer = %name,
        error = %error,
        failures = tracker.consecutive_failures(),
        retry_in_ms = as_millis_u64(tracker.next_interval()),
        "peer poll failed, keeping last snapshot"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config() -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(50),
            timeout: Duration::from_millis(100),
            ..PollConfig::default()
        }
    }

    #[test]
    fn tracker_backoff_doubles_and_caps() {
        let mut tracker = PollTracker::new(Duration::from_secs(1), Duration::from_secs(60));
        assert_eq!(tracker.next_interval(), Duration::from_secs(1));

        tracker.record_failure();
        assert_eq!(tracker.next_interval(), Duration::from_secs(2));
        tracker.record_failure();
        assert_eq!(tracker.next_interval(), Duration::from_secs(4));

        for _ in 0..10 {
            tracker.record_failure();
        }
        assert_eq!(tracker.next_interval(), Duration::from_secs(60));
        assert_eq!(tracker.consecutive_failures(), 12);
    }

    #[test]
    fn tracker_backoff_saturates_on_huge_interval() {
        let huge = Duration::from_secs(u64::MAX);
        let mut tracker = PollTracker::new(huge, Duration::from_secs(60));

        tracker.record_failure();
        tracker.record_failure();
        assert_eq!(tracker.next_interval(), huge);
        assert_eq!(tracker.consecutive_failures(), 2);
    }

    #[test]
    fn tracker_backoff_never_drops_below_base() {
        let mut tracker = PollTracker::new(Duration::from_secs(90), Duration::from_secs(60));
        tracker.record_failure();
        assert_eq!(tracker.next_interval(), Duration::from_secs(90));
    }

    #[test]
    fn tracker_resets_on_success() {
        let mut tracker = PollTracker::new(Duration::from_secs(1), Duration::from_secs(60));
        tracker.record_failure();
        tracker.record_failure();

        tracker.record_success();
        assert_eq!(tracker.next_interval(), Duration::from_secs(1));
        assert_eq!(tracker.consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn poller_starts_and_stops() {
        let poller = PeerPoller::new(PeerStates::new(Duration::from_secs(30)), fast_config());
        assert!(poller.active_peers().await.is_empty());

        // Nothing listens on port 1; lifecycle only.
        poller.start_peer("tm-02".into(), "127.0.0.1:1").await;
        assert!(poller.is_polling(&"tm-02".into()).await);

        poller.stop_peer(&"tm-02".into()).await;
        assert!(!poller.is_polling(&"tm-02".into()).await);
    }

    #[tokio::test]
    async fn restarting_a_peer_replaces_its_poller() {
        let poller = PeerPoller::new(PeerStates::new(Duration::from_secs(30)), fast_config());
        poller.start_peer("tm-02".into(), "127.0.0.1:1").await;
        poller.start_peer("tm-02".into(), "127.0.0.1:2").await;

        assert_eq!(poller.active_peers().await.len(), 1);
        poller.stop_all().await;
        assert!(poller.active_peers().await.is_empty());
    }

    #[tokio::test]
    async fn failed_polls_record_nothing() {
        let poller = PeerPoller::new(PeerStates::new(Duration::from_secs(30)), fast_config());
        poller.start_peer("tm-02".into(), "127.0.0.1:1").await;

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert!(poller.peer_states().statuses().is_empty());
        poller.stop_all().await;
    }

    #[tokio::test]
    async fn first_poll_does_not_wait_for_interval() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let body = r#"{"caches":{"edge-01":{"isAvailable":true}},"deliveryServices":{}}"#;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });

        let peers = PeerStates::new(Duration::from_secs(30));
        let config = PollConfig {
            interval: Duration::from_secs(3600),
            ..PollConfig::default()
        };
        let poller = PeerPoller::new(peers.clone(), config);
        poller.start_peer("tm-02".into(), &addr).await;

        let mut known = false;
        for _ in 0..50 {
            if matches!(peers.get(&"tm-02".into()), crate::PeerView::Known(_)) {
                known = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(known, "peer snapshot should arrive without waiting an interval");
        poller.stop_all().await;
    }

    #[tokio::test]
    async fn sync_peers_converges_on_desired_set() {
        let peers = PeerStates::new(Duration::from_secs(30));
        let poller = PeerPoller::new(peers.clone(), fast_config());
        poller.start_peer("tm-02".into(), "127.0.0.1:1").await;
        poller.start_peer("tm-03".into(), "127.0.0.1:1").await;
        peers.set("tm-03".into(), tmon_state::CRStates::new());

        let desired: HashMap<PeerName, String> = [
            (PeerName::from("tm-02"), "127.0.0.1:1".to_string()),
            (PeerName::from("tm-04"), "127.0.0.1:1".to_string()),
        ]
        .into_iter()
        .collect();
        poller.sync_peers(&desired).await;

        assert_eq!(
            poller.active_peers().await,
            vec![PeerName::from("tm-02"), PeerName::from("tm-04")]
        );
        // Snapshot of the dropped peer is forgotten.
        assert!(peers.statuses().iter().all(|s| s.name.as_str() != "tm-03"));
        poller.stop_all().await;
    }
}
