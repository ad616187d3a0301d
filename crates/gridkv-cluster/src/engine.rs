//! Engine cluster: a named host group fronting one storage root.
//!
//! The root is bound through the cluster's context so a generic cluster
//! manager can find it with `cluster_context()`. The cluster holds only a
//! weak reference; the root's creator owns it.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;

use gridkv_core::Asset;

use crate::cluster::{Cluster, ClusterContext, ClusterKind};
use crate::config::ClusterConfig;
use crate::error::{ClusterError, ClusterResult};
use crate::host::HostDetails;

/// Context of an engine cluster: heartbeat settings and the storage root.
#[derive(Debug)]
pub struct EngineClusterContext {
    heartbeat_interval: Duration,
    heartbeat_timeout: Duration,
    root: RwLock<Option<Weak<dyn Asset>>>,
}

impl EngineClusterContext {
    pub fn new(heartbeat_interval: Duration, heartbeat_timeout: Duration) -> Self {
        Self {
            heartbeat_interval,
            heartbeat_timeout,
            root: RwLock::new(None),
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    pub fn heartbeat_timeout(&self) -> Duration {
        self.heartbeat_timeout
    }

    /// The bound root, if one is bound and still alive.
    pub fn asset_root(&self) -> Option<Arc<dyn Asset>> {
        self.root.read().as_ref().and_then(Weak::upgrade)
    }

    pub fn is_root_bound(&self) -> bool {
        self.root.read().is_some()
    }

    /// Set the root once. Binding the same root again is a no-op; any
    /// other root is rejected, even if the first one has been dropped.
    fn assign_root(&self, cluster: &str, root: &Arc<dyn Asset>) -> ClusterResult<()> {
        let mut bound = self.root.write();
        if let Some(existing) = bound.as_ref() {
            if existing.as_ptr() as *const () == Arc::as_ptr(root) as *const () {
                return Ok(());
            }
            let bound_name = existing
                .upgrade()
                .map(|a| a.full_name())
                .unwrap_or_else(|| "<dropped>".to_string());
            return Err(ClusterError::RootAlreadyBound {
                cluster: cluster.to_string(),
                bound: bound_name,
            });
        }
        *bound = Some(Arc::downgrade(root));
        Ok(())
    }
}

impl Default for EngineClusterContext {
    fn default() -> Self {
        Self::new(ClusterConfig::DEFAULT_HEARTBEAT_INTERVAL, ClusterConfig::DEFAULT_HEARTBEAT_TIMEOUT)
    }
}

impl ClusterContext for EngineClusterContext {
    /// Ready only while the bound root is still alive.
    fn check_ready(&self, cluster: &str) -> ClusterResult<()> {
        if self.asset_root().is_some() {
            Ok(())
        } else {
            Err(ClusterError::RootNotBound { cluster: cluster.to_string() })
        }
    }
}

/// Kind marker for engine clusters: plain [`HostDetails`] per host.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineHosts;

impl ClusterKind for EngineHosts {
    type Details = HostDetails;
    type Context = EngineClusterContext;

    fn new_host_details(&self) -> HostDetails {
        HostDetails::default()
    }
}

/// A named cluster serving one storage root.
pub type EngineCluster = Cluster<EngineHosts>;

impl Cluster<EngineHosts> {
    /// Build a cluster from configuration: context with the configured
    /// heartbeats, plus every listed host.
    pub fn from_config(config: &ClusterConfig) -> ClusterResult<Self> {
        config.validate().map_err(ClusterError::InvalidConfig)?;
        let cluster = Self::new(config.name.clone());
        cluster.install_context(Arc::new(EngineClusterContext::new(
            config.heartbeat_interval(),
            config.heartbeat_timeout(),
        )))?;
        for host in &config.hosts {
            cluster.add_host(host.clone())?;
        }
        Ok(cluster)
    }

    /// Bind the storage root this cluster serves.
    ///
    /// Silently ignored when no context is installed yet.
    pub fn bind_root(&self, root: &Arc<dyn Asset>) -> ClusterResult<()> {
        let Some(context) = self.cluster_context() else {
            tracing::debug!(cluster = %self.name(), "no cluster context, root binding ignored");
            return Ok(());
        };
        context.assign_root(self.name(), root)?;
        tracing::debug!(cluster = %self.name(), root = %root.full_name(), "storage root bound");
        Ok(())
    }

    /// The storage root, if bound and alive.
    pub fn asset_root(&self) -> Option<Arc<dyn Asset>> {
        self.cluster_context().and_then(|c| c.asset_root())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridkv_core::AssetNode;

    fn root() -> Arc<dyn Asset> {
        AssetNode::root()
    }

    #[test]
    fn test_bind_without_context_ignored() {
        let cluster = EngineCluster::new("grid");
        let r = root();
        cluster.bind_root(&r).unwrap();
        assert!(cluster.asset_root().is_none());
    }

    #[test]
    fn test_bind_idempotent_for_same_root() {
        let cluster = EngineCluster::new("grid");
        cluster.install_context(Arc::new(EngineClusterContext::default())).unwrap();
        let r = root();
        cluster.bind_root(&r).unwrap();
        cluster.bind_root(&r).unwrap();
        assert!(Arc::ptr_eq(&cluster.asset_root().unwrap(), &r));
    }

    #[test]
    fn test_rebind_rejected() {
        let cluster = EngineCluster::new("grid");
        cluster.install_context(Arc::new(EngineClusterContext::default())).unwrap();
        let first = root();
        let second: Arc<dyn Asset> = AssetNode::child(root(), "other");
        cluster.bind_root(&first).unwrap();

        let err = cluster.bind_root(&second).unwrap_err();
        assert!(matches!(err, ClusterError::RootAlreadyBound { .. }));
        assert!(Arc::ptr_eq(&cluster.asset_root().unwrap(), &first));
    }

    #[test]
    fn test_context_swap_cannot_rebind() {
        let cluster = EngineCluster::new("grid");
        cluster.install_context(Arc::new(EngineClusterContext::default())).unwrap();
        let first = root();
        cluster.bind_root(&first).unwrap();

        let err = cluster.install_context(Arc::new(EngineClusterContext::default())).unwrap_err();
        assert!(matches!(err, ClusterError::ContextAlreadyInstalled { .. }));

        let second = root();
        assert!(matches!(cluster.bind_root(&second), Err(ClusterError::RootAlreadyBound { .. })));
        assert!(Arc::ptr_eq(&cluster.asset_root().unwrap(), &first));
    }

    #[test]
    fn test_activate_rejects_dropped_root() {
        let cluster = EngineCluster::new("grid");
        cluster.install_context(Arc::new(EngineClusterContext::default())).unwrap();
        let r = root();
        cluster.bind_root(&r).unwrap();
        drop(r);

        assert!(matches!(cluster.activate(), Err(ClusterError::RootNotBound { .. })));
        assert!(!cluster.is_active());
    }

    #[test]
    fn test_root_reference_is_weak() {
        let cluster = EngineCluster::new("grid");
        cluster.install_context(Arc::new(EngineClusterContext::default())).unwrap();
        let r = root();
        cluster.bind_root(&r).unwrap();
        assert_eq!(Arc::strong_count(&r), 1);

        drop(r);
        assert!(cluster.asset_root().is_none());
        // Still counts as bound: the binding is set-once
        let replacement = root();
        assert!(cluster.bind_root(&replacement).is_err());
    }

    #[test]
    fn test_activate_requires_root() {
        let cluster = EngineCluster::new("grid");
        cluster.install_context(Arc::new(EngineClusterContext::default())).unwrap();
        assert!(matches!(cluster.activate(), Err(ClusterError::RootNotBound { .. })));

        let r = root();
        cluster.bind_root(&r).unwrap();
        cluster.activate().unwrap();
        assert!(cluster.is_active());
    }

    #[test]
    fn test_new_host_details_is_empty() {
        let cluster = EngineCluster::new("grid");
        let details = cluster.new_host_details();
        assert_eq!(details, HostDetails::default());
        assert!(details.connect_uri.is_empty());
    }
}
