//! GridKV Core: Segmented Key-Value Store Contract
//!
//! The storage layer of a distributed data grid: a minimal store contract,
//! operations derived from it, and decorators that layer cross-cutting
//! behavior over any backend.
//!
//! # Architecture
//!
//! - **Contract**: [`KeyValueStore`], a few primitives plus derived
//!   operations (replace, compare-and-swap, put-if-absent, bulk iteration)
//! - **Backend**: [`SegmentedMemoryStore`], RAM segments with per-segment
//!   locks and atomic conditional operations
//! - **Decorators**: [`SubscriptionStore`] emits one [`ChangeEvent`] per
//!   mutation; [`AuthenticatedStore`] gates access. Both wrap any store,
//!   including each other.
//!
//! # Out of Scope
//!
//! Persistence formats, replication, wire protocols and the asset tree
//! live in other crates. [`Asset`] is the only view of the hierarchy kept
//! here.

pub mod asset;
pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod memory;
pub mod sink;
pub mod store;
pub mod subscription;

// Re-export key types for convenience
pub use asset::{Asset, AssetNode};
pub use auth::{Access, AuthenticatedStore, Authenticator};
pub use config::StoreConfig;
pub use context::RequestContext;
pub use error::{InvalidSubscriber, StoreError, StoreResult};
pub use event::{ChangeEvent, EventKind};
pub use memory::SegmentedMemoryStore;
pub use sink::{EventSink, Subscriber, SubscriptionCollection, SubscriptionId};
pub use store::{EntryConsumer, KeyConsumer, KeyValueStore};
pub use subscription::SubscriptionStore;
