//! Generic named cluster.
//!
//! A [`Cluster`] owns the host records of its members and one optional
//! context. What a host record holds and what the context must provide
//! before activation is decided by the [`ClusterKind`]. Once active, the
//! membership and context are frozen.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::error::{ClusterError, ClusterResult};
use crate::host::HostRecord;

/// Context a cluster needs before it can be activated.
pub trait ClusterContext: Send + Sync {
    /// Fail if anything required for activation is missing.
    fn check_ready(&self, cluster: &str) -> ClusterResult<()>;
}

/// Customizes a generic cluster for one use.
pub trait ClusterKind: Send + Sync {
    type Details: HostRecord;
    type Context: ClusterContext;

    /// Fresh, empty record for a host joining the cluster.
    fn new_host_details(&self) -> Self::Details;
}

/// Named collection of hosts plus an installable context.
#[derive(Debug)]
pub struct Cluster<K: ClusterKind> {
    name: String,
    kind: K,
    hosts: RwLock<HashMap<u32, K::Details>>,
    context: RwLock<Option<Arc<K::Context>>>,
    active: AtomicBool,
}

impl<K: ClusterKind> Cluster<K> {
    /// Empty cluster with a default kind.
    pub fn new(name: impl Into<String>) -> Self
    where
        K: Default,
    {
        Self::with_kind(name, K::default())
    }

    pub fn with_kind(name: impl Into<String>, kind: K) -> Self {
        Self {
            name: name.into(),
            kind,
            hosts: RwLock::new(HashMap::new()),
            context: RwLock::new(None),
            active: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn new_host_details(&self) -> K::Details {
        self.kind.new_host_details()
    }

    /// Build a record with `new_host_details`, let `configure` fill it in,
    /// and add it. Returns the host id.
    pub fn register_host(&self, configure: impl FnOnce(&mut K::Details)) -> ClusterResult<u32> {
        let mut details = self.new_host_details();
        configure(&mut details);
        let host_id = details.host_id();
        self.add_host(details)?;
        Ok(host_id)
    }

    pub fn add_host(&self, details: K::Details) -> ClusterResult<()> {
        let mut hosts = self.hosts.write();
        self.ensure_inactive()?;
        let host_id = details.host_id();
        if hosts.contains_key(&host_id) {
            return Err(ClusterError::DuplicateHost { cluster: self.name.clone(), host_id });
        }
        tracing::debug!(cluster = %self.name, host_id, uri = details.connect_uri(), "host added");
        hosts.insert(host_id, details);
        Ok(())
    }

    pub fn remove_host(&self, host_id: u32) -> ClusterResult<Option<K::Details>> {
        let mut hosts = self.hosts.write();
        self.ensure_inactive()?;
        Ok(hosts.remove(&host_id))
    }

    pub fn host(&self, host_id: u32) -> Option<K::Details> {
        self.hosts.read().get(&host_id).cloned()
    }

    /// Every member, ordered by host id.
    pub fn hosts(&self) -> Vec<K::Details> {
        let mut hosts: Vec<_> = self.hosts.read().values().cloned().collect();
        hosts.sort_by_key(|h| h.host_id());
        hosts
    }

    pub fn host_count(&self) -> usize {
        self.hosts.read().len()
    }

    /// Install the cluster context. Allowed once, before activation.
    pub fn install_context(&self, context: Arc<K::Context>) -> ClusterResult<()> {
        let _members = self.hosts.write();
        self.ensure_inactive()?;
        let mut installed = self.context.write();
        if installed.is_some() {
            return Err(ClusterError::ContextAlreadyInstalled { cluster: self.name.clone() });
        }
        *installed = Some(context);
        Ok(())
    }

    pub fn cluster_context(&self) -> Option<Arc<K::Context>> {
        self.context.read().clone()
    }

    /// Freeze membership. Requires a context that passes its readiness
    /// check. Activating twice is a no-op.
    pub fn activate(&self) -> ClusterResult<()> {
        // Membership changes take the host lock first, so none can race
        // the readiness check and the flag
        let hosts = self.hosts.write();
        if self.is_active() {
            return Ok(());
        }
        let context = self.cluster_context().ok_or_else(|| ClusterError::NoContext {
            cluster: self.name.clone(),
        })?;
        context.check_ready(&self.name)?;
        self.active.store(true, Ordering::Release);
        tracing::info!(cluster = %self.name, hosts = hosts.len(), "cluster activated");
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn ensure_inactive(&self) -> ClusterResult<()> {
        if self.is_active() {
            return Err(ClusterError::AlreadyActive { cluster: self.name.clone() });
        }
        Ok(())
    }
}
