//! GridKV cluster membership
//!
//! Binds a named group of hosts to the storage root they serve, so
//! cluster-aware routing and replication can find it.
//!
//! # Architecture
//!
//! - [`Cluster`] is generic: a host registry plus one context, frozen on
//!   activation. A [`ClusterKind`] decides the host record type through
//!   `new_host_details()`.
//! - [`EngineCluster`] uses [`HostDetails`] and an
//!   [`EngineClusterContext`] holding a weak, set-once reference to the
//!   storage root. Activation fails until the root is bound.
//!
//! Host-to-host wire formats and failure detection live elsewhere.

pub mod cluster;
pub mod config;
pub mod engine;
pub mod error;
pub mod host;

pub use cluster::{Cluster, ClusterContext, ClusterKind};
pub use config::ClusterConfig;
pub use engine::{EngineCluster, EngineClusterContext, EngineHosts};
pub use error::{ClusterError, ClusterResult};
pub use host::{HostDetails, HostRecord};
