//! Error types for cluster membership.

use thiserror::Error;

/// Cluster membership error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    /// A different storage root is already bound
    #[error("cluster {cluster} is already bound to root {bound:?}")]
    RootAlreadyBound {
        cluster: String,
        /// Full name of the root already bound
        bound: String,
    },

    /// Activation requires a bound storage root
    #[error("cluster {cluster} has no storage root bound")]
    RootNotBound { cluster: String },

    /// Activation requires an installed cluster context
    #[error("cluster {cluster} has no context installed")]
    NoContext { cluster: String },

    /// A context is installed at most once
    #[error("cluster {cluster} already has a context installed")]
    ContextAlreadyInstalled { cluster: String },

    /// Membership and context are frozen once active
    #[error("cluster {cluster} is active; membership is frozen")]
    AlreadyActive { cluster: String },

    #[error("host {host_id} is already a member of cluster {cluster}")]
    DuplicateHost { cluster: String, host_id: u32 },

    #[error("invalid cluster config: {0}")]
    InvalidConfig(String),
}

/// Result type alias for cluster operations
pub type ClusterResult<T> = Result<T, ClusterError>;
