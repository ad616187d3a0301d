//! Per-host identity and connection settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_TCP_BUFFER_SIZE: usize = 64 << 10;
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

/// What a cluster needs to know about each member host.
pub trait HostRecord: Clone + Send + Sync {
    /// Unique within one cluster.
    fn host_id(&self) -> u32;

    fn connect_uri(&self) -> &str;
}

/// Identity and address of one remote participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDetails {
    pub host_id: u32,
    /// `host:port` the cluster connects to
    pub connect_uri: String,
    #[serde(default = "default_tcp_buffer_size")]
    pub tcp_buffer_size: usize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_tcp_buffer_size() -> usize {
    DEFAULT_TCP_BUFFER_SIZE
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl HostDetails {
    pub fn new(host_id: u32, connect_uri: impl Into<String>) -> Self {
        Self {
            host_id,
            connect_uri: connect_uri.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for HostDetails {
    /// Empty record, as handed out by `new_host_details`.
    fn default() -> Self {
        Self {
            host_id: 0,
            connect_uri: String::new(),
            tcp_buffer_size: DEFAULT_TCP_BUFFER_SIZE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl HostRecord for HostDetails {
    fn host_id(&self) -> u32 {
        self.host_id
    }

    fn connect_uri(&self) -> &str {
        &self.connect_uri
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied_when_deserializing() {
        let host: HostDetails =
            serde_json::from_str(r#"{"host_id": 2, "connect_uri": "10.0.0.2:8088"}"#).unwrap();
        assert_eq!(host, HostDetails::new(2, "10.0.0.2:8088"));
        assert_eq!(host.tcp_buffer_size, DEFAULT_TCP_BUFFER_SIZE);
        assert_eq!(host.timeout(), Duration::from_secs(5));
    }
}
