//! Cluster configuration, as supplied by an external config loader.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::host::HostDetails;

/// Everything needed to build an engine cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Cluster name, unique within the grid
    pub name: String,
    /// Member hosts
    #[serde(default)]
    pub hosts: Vec<HostDetails>,
    /// How often members exchange heartbeats (milliseconds)
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Silence after which a member is considered gone (milliseconds)
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
}

fn default_heartbeat_interval_ms() -> u64 {
    ClusterConfig::DEFAULT_HEARTBEAT_INTERVAL.as_millis() as u64
}

fn default_heartbeat_timeout_ms() -> u64 {
    ClusterConfig::DEFAULT_HEARTBEAT_TIMEOUT.as_millis() as u64
}

impl ClusterConfig {
    pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
    pub const DEFAULT_HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Empty cluster with default heartbeats.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hosts: Vec::new(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            heartbeat_timeout_ms: default_heartbeat_timeout_ms(),
        }
    }

    pub fn with_host(mut self, host: HostDetails) -> Self {
        self.hosts.push(host);
        self
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".into());
        }
        if self.heartbeat_interval_ms == 0 {
            return Err("heartbeat_interval_ms must be > 0".into());
        }
        if self.heartbeat_timeout_ms <= self.heartbeat_interval_ms {
            return Err("heartbeat_timeout_ms must exceed heartbeat_interval_ms".into());
        }
        let mut seen = HashSet::new();
        for host in &self.hosts {
            if !seen.insert(host.host_id) {
                return Err(format!("duplicate host_id {}", host.host_id));
            }
            if host.connect_uri.is_empty() {
                return Err(format!("host {} has no connect_uri", host.host_id));
            }
        }
        Ok(())
    }
}
