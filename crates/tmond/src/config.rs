//! tmond.toml configuration parser.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use serde::Deserialize;

use tmon_peer::{PeerName, PollConfig};
use tmon_state::Topology;

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    pub monitor: MonitorSection,
    #[serde(default)]
    pub peers: PeersSection,
    /// Absent: topology is not managed from this file and nothing is pruned.
    pub topology: Option<TopologySection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSection {
    /// This monitor's identity among its peers.
    pub name: String,
    pub listen: String,
    /// Snapshot file to seed the store from at startup.
    pub initial_states: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PeersSection {
    pub poll_interval: Option<String>,
    pub timeout: Option<String>,
    pub freshness: Option<String>,
    pub path: Option<String>,
    #[serde(default)]
    pub members: Vec<PeerMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PeerMember {
    pub name: String,
    /// `host:port` the peer serves its snapshot on.
    pub address: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TopologySection {
    #[serde(default)]
    pub caches: Vec<String>,
    #[serde(default)]
    pub delivery_services: Vec<String>,
}

const DEFAULT_FRESHNESS: Duration = Duration::from_secs(30);

impl MonitorConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("loading config {}", path.display()))
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: MonitorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.listen_addr()?;
        self.poll_config()?;
        self.freshness()?;

        let mut seen = HashSet::new();
        for member in &self.peers.members {
            if member.name == self.monitor.name {
                bail!("peer {:?} has the same name as this monitor", member.name);
            }
            if !seen.insert(member.name.as_str()) {
                bail!("duplicate peer name {:?}", member.name);
            }
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        self.monitor
            .listen
            .parse()
            .with_context(|| format!("invalid listen address {:?}", self.monitor.listen))
    }

    pub fn poll_config(&self) -> anyhow::Result<PollConfig> {
        let mut config = PollConfig::default();
        if let Some(interval) = &self.peers.poll_interval {
            config.interval = duration_field("peers.poll_interval", interval)?;
        }
        if let Some(timeout) = &self.peers.timeout {
            config.timeout = duration_field("peers.timeout", timeout)?;
        }
        if let Some(path) = &self.peers.path {
            if !path.starts_with('/') {
                bail!("peers.path must start with '/': {path:?}");
            }
            config.path = path.clone();
        }
        Ok(config)
    }

    /// How long a peer snapshot counts as current.
    pub fn freshness(&self) -> anyhow::Result<Duration> {
        match &self.peers.freshness {
            Some(s) => duration_field("peers.freshness", s),
            None => Ok(DEFAULT_FRESHNESS),
        }
    }

    /// Configured peers as name → address.
    pub fn peer_addresses(&self) -> HashMap<PeerName, String> {
        self.peers
            .members
            .iter()
            .map(|m| (PeerName::from(m.name.as_str()), m.address.clone()))
            .collect()
    }

    /// Desired set of monitored caches and delivery services, if configured.
    pub fn topology(&self) -> Option<Topology> {
        self.topology.as_ref().map(|t| {
            Topology::new(
                t.caches.iter().map(String::as_str),
                t.delivery_services.iter().map(String::as_str),
            )
        })
    }
}

fn duration_field(field: &str, value: &str) -> anyhow::Result<Duration> {
    let duration =
        parse_duration(value).with_context(|| format!("invalid duration for {field}: {value:?}"))?;
    if duration.is_zero() {
        bail!("{field} must be greater than zero: {value:?}");
    }
    Ok(duration)
}

/// Parse a duration string like "5s", "500ms", "1m".
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok()?.checked_mul(60).map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
