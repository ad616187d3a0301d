//! Asset handles: the minimal view of the naming hierarchy the core needs.
//!
//! The asset tree itself (path resolution, view registration) lives outside
//! this crate. Stores are constructed under a parent asset, and clusters bind
//! to the root asset, so both only need identity and a full path.

use std::fmt;
use std::sync::Arc;

/// A node in the storage hierarchy.
pub trait Asset: Send + Sync + fmt::Debug {
    /// Last path component; empty for the root.
    fn name(&self) -> &str;

    /// Parent node, `None` for the root.
    fn parent(&self) -> Option<Arc<dyn Asset>>;

    /// Slash-separated path from the root, e.g. `/grid/prices`.
    fn full_name(&self) -> String {
        match self.parent() {
            Some(parent) => format!("{}/{}", parent.full_name(), self.name()),
            None => self.name().to_string(),
        }
    }

    fn is_root(&self) -> bool {
        self.parent().is_none()
    }
}

/// Plain in-memory asset node.
#[derive(Debug)]
pub struct AssetNode {
    name: String,
    parent: Option<Arc<dyn Asset>>,
}

impl AssetNode {
    /// Create a storage root.
    pub fn root() -> Arc<Self> {
        Arc::new(Self {
            name: String::new(),
            parent: None,
        })
    }

    /// Create a child of `parent`.
    pub fn child(parent: Arc<dyn Asset>, name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            parent: Some(parent),
        })
    }
}

impl Asset for AssetNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn parent(&self) -> Option<Arc<dyn Asset>> {
        self.parent.clone()
    }
}
