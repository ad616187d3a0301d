//! Segmented in-memory backend.
//!
//! The key space is split into N segments, each a `RwLock<HashMap>`.
//! Writers to different segments never contend; readers of one segment run
//! concurrently. Conditional operations hold the segment write lock across
//! check and act, so `replace_if_equal` and `remove_if_equal` are true
//! compare-and-swap here rather than the weak default derivation.
//!
//! `len` is adjusted while the owning segment's write lock is held, so it
//! never runs ahead of or behind the entries it counts.

use std::hash::{BuildHasher, Hash};
use std::sync::atomic::{AtomicU64, Ordering};

use hashbrown::hash_map::DefaultHashBuilder;
use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::store::{fill_using, EntryConsumer, KeyConsumer, KeyValueStore};

/// RAM key-value store partitioned into independently locked segments.
pub struct SegmentedMemoryStore<K, V> {
    name: String,
    segments: Vec<RwLock<HashMap<K, V>>>,
    /// Fixed per instance so segment assignment is stable for the store's
    /// lifetime.
    hasher: DefaultHashBuilder,
    /// Live entries across all segments
    len: AtomicU64,
    read_only: bool,
}

impl<K, V> SegmentedMemoryStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + PartialEq + Send + Sync,
{
    /// Create an empty store. Fails if the configuration is invalid.
    pub fn new(name: impl Into<String>, config: StoreConfig) -> StoreResult<Self> {
        let name = name.into();
        config.validate().map_err(|message| StoreError::Backend {
            message: format!("invalid config for {}: {}", name, message),
        })?;

        let segments = (0..config.segments).map(|_| RwLock::new(HashMap::new())).collect();
        tracing::debug!(store = %name, segments = config.segments, read_only = config.read_only, "created segmented store");

        Ok(Self {
            name,
            segments,
            hasher: DefaultHashBuilder::default(),
            len: AtomicU64::new(0),
            read_only: config.read_only,
        })
    }

    /// Store name used in error messages.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn segment(&self, key: &K) -> &RwLock<HashMap<K, V>> {
        &self.segments[self.segment_index(key)]
    }

    fn segment_index(&self, key: &K) -> usize {
        (self.hasher.hash_one(key) % self.segments.len() as u64) as usize
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.read_only {
            return Err(StoreError::ReadOnly { name: self.name.clone() });
        }
        Ok(())
    }

    fn checked_segment(&self, segment: usize) -> StoreResult<&RwLock<HashMap<K, V>>> {
        self.segments.get(segment).ok_or_else(|| StoreError::Backend {
            message: format!(
                "segment {} out of range for {} ({} segments)",
                segment,
                self.name,
                self.segments.len()
            ),
        })
    }
}

impl<K, V> KeyValueStore for SegmentedMemoryStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + PartialEq + Send + Sync,
{
    type Key = K;
    type Value = V;

    fn get_and_put(&self, key: K, value: V) -> StoreResult<Option<V>> {
        self.check_writable()?;
        let mut segment = self.segment(&key).write();
        let previous = segment.insert(key, value);
        if previous.is_none() {
            self.len.fetch_add(1, Ordering::Relaxed);
        }
        Ok(previous)
    }

    fn get_and_remove(&self, key: &K) -> StoreResult<Option<V>> {
        self.check_writable()?;
        let mut segment = self.segment(key).write();
        let removed = segment.remove(key);
        if removed.is_some() {
            self.len.fetch_sub(1, Ordering::Relaxed);
        }
        Ok(removed)
    }

    fn get_using(&self, key: &K, using: &mut Option<V>) -> StoreResult<bool> {
        let segment = self.segment(key).read();
        match segment.get(key) {
            Some(value) => {
                fill_using(using, value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn long_size(&self) -> u64 {
        self.len.load(Ordering::Relaxed)
    }

    fn segments(&self) -> usize {
        self.segments.len()
    }

    fn segment_for(&self, key: &K) -> usize {
        self.segment_index(key)
    }

    fn keys_for(&self, segment: usize, consumer: &mut KeyConsumer<'_, K>) -> StoreResult<()> {
        let segment = self.checked_segment(segment)?.read();
        for key in segment.keys() {
            consumer(key)?;
        }
        Ok(())
    }

    fn entries_for(&self, segment: usize, consumer: &mut EntryConsumer<'_, K, V>) -> StoreResult<()> {
        let segment = self.checked_segment(segment)?.read();
        for (key, value) in segment.iter() {
            consumer(key, value)?;
        }
        Ok(())
    }

    fn clear(&self) -> StoreResult<()> {
        self.check_writable()?;
        for segment in &self.segments {
            let mut segment = segment.write();
            let removed = segment.len() as u64;
            segment.clear();
            self.len.fetch_sub(removed, Ordering::Relaxed);
        }
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn replace(&self, key: K, value: V) -> StoreResult<Option<V>> {
        self.check_writable()?;
        let mut segment = self.segment(&key).write();
        Ok(segment.get_mut(&key).map(|current| std::mem::replace(current, value)))
    }

    fn replace_if_equal(&self, key: K, old_value: &V, new_value: V) -> StoreResult<bool> {
        self.check_writable()?;
        let mut segment = self.segment(&key).write();
        match segment.get_mut(&key) {
            Some(current) if *current == *old_value => {
                *current = new_value;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn remove_if_equal(&self, key: &K, value: &V) -> StoreResult<bool> {
        if !self.is_key_type(key) {
            return Ok(false);
        }
        self.check_writable()?;
        let mut segment = self.segment(key).write();
        if segment.get(key) == Some(value) {
            segment.remove(key);
            self.len.fetch_sub(1, Ordering::Relaxed);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn put_if_absent(&self, key: K, value: V) -> StoreResult<Option<V>> {
        self.check_writable()?;
        let mut segment = self.segment(&key).write();
        if let Some(existing) = segment.get(&key) {
            return Ok(Some(existing.clone()));
        }
        segment.insert(key, value);
        self.len.fetch_add(1, Ordering::Relaxed);
        Ok(None)
    }
}
