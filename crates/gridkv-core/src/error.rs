//! Error types for GridKV store operations
//!
//! Absence is never an error: failed lookups, no-op removes and failed
//! conditional operations return `None`/`false`. Errors cover subscriber
//! rejection, access control and backend faults.

use thiserror::Error;

/// Raised by a consumer or subscriber that can no longer accept items.
///
/// During segment enumeration this propagates to the caller of
/// `keys_for`/`entries_for`. Surfacing from a committed event emission it
/// is an internal-consistency violation and aborts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("subscriber rejected further delivery")]
pub struct InvalidSubscriber;

/// GridKV store error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A pushed-to consumer rejected an item during enumeration
    #[error(transparent)]
    InvalidSubscriber(#[from] InvalidSubscriber),

    /// Mutation attempted on a read-only store
    #[error("store {name} is read-only")]
    ReadOnly {
        /// Full name of the store that rejected the write
        name: String,
    },

    /// An authentication wrapper denied the operation
    #[error("access denied for {access} on {name}")]
    AccessDenied {
        /// Store the operation targeted
        name: String,
        /// The kind of access that was refused
        access: &'static str,
    },

    /// Failure inside a storage backend
    #[error("backend failure: {message}")]
    Backend {
        /// Human-readable description
        message: String,
    },
}

impl StoreError {
    /// True when the error is a consumer-side backpressure signal rather
    /// than a store fault.
    pub fn is_subscriber_rejection(&self) -> bool {
        matches!(self, StoreError::InvalidSubscriber(_))
    }
}

/// Result type alias for GridKV store operations
pub type StoreResult<T> = Result<T, StoreError>;
