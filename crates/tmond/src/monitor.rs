//! Monitor mode — the long-running traffic monitor process.
//!
//! In this mode, the daemon:
//! 1. Creates the availability store (optionally seeded from a snapshot file)
//! 2. Applies the configured topology
//! 3. Starts one poller per configured peer
//! 4. Serves the publication API until Ctrl-C
//! 5. Re-reads the config on SIGHUP (topology and peer set)

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{error, info, warn};

use tmon_peer::{PeerPoller, PeerStates};
use tmon_state::{apply_topology, load_snapshot_file, CRStatesThreadsafe};

use crate::config::MonitorConfig;

/// Run the monitor until shutdown.
pub async fn run_monitor(config_path: PathBuf) -> anyhow::Result<()> {
    let config = MonitorConfig::from_file(&config_path)?;
    let addr = config.listen_addr()?;
    info!(name = %config.monitor.name, %addr, "traffic monitor starting");

    // ── Availability store ───────────────────────────────────────
    let store = open_store(config.monitor.initial_states.as_deref());
    if let Some(topology) = config.topology() {
        apply_topology(&store, &topology);
    }

    // ── Peer exchange ────────────────────────────────────────────
    let peers = PeerStates::new(config.freshness()?);
    let poller = Arc::new(PeerPoller::new(peers.clone(), config.poll_config()?));
    poller.sync_peers(&config.peer_addresses()).await;

    // ── Shutdown signal ──────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reload_handle = tokio::spawn(reload_on_hangup(
        config_path,
        config.monitor.name.clone(),
        store.clone(),
        Arc::clone(&poller),
        shutdown_rx,
    ));

    // ── Publication API ──────────────────────────────────────────
    let router = tmon_api::build_router(store, peers);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "publication API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl-C");
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    poller.stop_all().await;
    let _ = reload_handle.await;

    info!("traffic monitor stopped");
    Ok(())
}

/// Create the store, seeded from `initial_states` when it can be read.
///
/// A missing or malformed snapshot file is not fatal: the monitor
/// starts empty and fills in from topology and health results.
fn open_store(initial_states: Option<&Path>) -> CRStatesThreadsafe {
    let Some(path) = initial_states else {
        return CRStatesThreadsafe::new();
    };
    match load_snapshot_file(path) {
        Ok(states) => {
            info!(
                ?path,
                caches = states.cache_count(),
                delivery_services = states.delivery_service_count(),
                "store seeded from snapshot file"
            );
            CRStatesThreadsafe::from_states(states)
        }
        Err(e) => {
            warn!(error = %e, "ignoring initial snapshot, starting empty");
            CRStatesThreadsafe::new()
        }
    }
}

/// Re-read the config file and converge topology and peers on it.
///
/// On failure the previous configuration stays in effect.
async fn reload(config_path: &Path, local_name: &str, store: &CRStatesThreadsafe, poller: &PeerPoller) {
    let config = match MonitorConfig::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            let error = format!("{e:#}");
            warn!(%error, "config reload failed, keeping current config");
            return;
        }
    };

    if config.monitor.name != local_name {
        warn!(
            current = %local_name,
            configured = %config.monitor.name,
            "monitor name changes take effect on restart"
        );
    }

    let topology_changed = config
        .topology()
        .is_some_and(|topology| !apply_topology(store, &topology).is_empty());
    poller.sync_peers(&config.peer_addresses()).await;
    info!(topology_changed, "config reloaded");
}

#[cfg(unix)]
async fn reload_on_hangup(
    config_path: PathBuf,
    local_name: String,
    store: CRStatesThreadsafe,
    poller: Arc<PeerPoller>,
    mut shutdown: watch::Receiver<bool>,
) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "SIGHUP handler unavailable, config reload disabled");
            return;
        }
    };

    loop {
        tokio::select! {
            received = hangup.recv() => {
                if received.is_none() {
                    break;
                }
                info!(path = ?config_path, "SIGHUP received, reloading config");
                reload(&config_path, &local_name, &store, &poller).await;
            }
            _ = shutdown.changed() => break,
        }
    }
}

#[cfg(not(unix))]
async fn reload_on_hangup(
    _config_path: PathBuf,
    _local_name: String,
    _store: CRStatesThreadsafe,
    _poller: Arc<PeerPoller>,
    mut shutdown: watch::Receiver<bool>,
) {
    let _ = shutdown.changed().await;
}
