//! The key-value store contract.
//!
//! A backend implements a handful of primitives (`get_and_put`,
//! `get_and_remove`, `get_using`, `long_size`, segment enumeration, `clear`)
//! and inherits every derived operation as a default method. Decorators
//! (subscription, authentication) implement the same trait over an inner
//! store and delegate inward.
//!
//! The default conditional operations are check-then-act and therefore
//! racy under concurrent writers to the same key. Backends that promise
//! compare-and-swap semantics override them.

use std::hash::Hash;
use std::sync::Arc;

use crate::error::{InvalidSubscriber, StoreError, StoreResult};

/// Receives keys pushed during segment enumeration. Returning
/// `Err(InvalidSubscriber)` stops delivery for the segment.
pub type KeyConsumer<'a, K> = dyn FnMut(&K) -> Result<(), InvalidSubscriber> + 'a;

/// Receives key/value pairs pushed during segment enumeration.
pub type EntryConsumer<'a, K, V> = dyn FnMut(&K, &V) -> Result<(), InvalidSubscriber> + 'a;

/// Segmented key-value store.
///
/// All methods take `&self`; implementations are shared across threads.
pub trait KeyValueStore: Send + Sync {
    type Key: Clone + Eq + Hash + Send + Sync;
    type Value: Clone + PartialEq + Send + Sync;

    /// Insert or replace, returning the value present before the call.
    fn get_and_put(&self, key: Self::Key, value: Self::Value) -> StoreResult<Option<Self::Value>>;

    /// Remove if present, returning the removed value.
    fn get_and_remove(&self, key: &Self::Key) -> StoreResult<Option<Self::Value>>;

    /// Look up `key`, writing the value into `using`.
    ///
    /// When `using` already holds a value it is overwritten in place with
    /// `clone_from`, reusing its allocation. Returns `false` and leaves
    /// `using` untouched when the key is absent.
    fn get_using(&self, key: &Self::Key, using: &mut Option<Self::Value>) -> StoreResult<bool>;

    /// Live entries across all segments.
    fn long_size(&self) -> u64;

    fn segments(&self) -> usize {
        1
    }

    /// Segment owning `key`. Stable for the lifetime of the store.
    fn segment_for(&self, _key: &Self::Key) -> usize {
        0
    }

    /// Push every key of `segment` to `consumer`, one at a time.
    fn keys_for(&self, segment: usize, consumer: &mut KeyConsumer<'_, Self::Key>) -> StoreResult<()>;

    /// Push every entry of `segment` to `consumer`, one at a time.
    fn entries_for(
        &self,
        segment: usize,
        consumer: &mut EntryConsumer<'_, Self::Key, Self::Value>,
    ) -> StoreResult<()>;

    /// Remove every entry. Not atomic across segments.
    fn clear(&self) -> StoreResult<()>;

    fn is_read_only(&self) -> bool {
        false
    }

    /// Release resources held by this store and its decorators.
    fn close(&self) {}

    /// Guard for `remove_if_equal`: a store that knows a key can never be
    /// held here answers `false` and the removal fails without touching
    /// the backend.
    fn is_key_type(&self, _key: &Self::Key) -> bool {
        true
    }

    // -----------------------------------------------------------------------
    // Derived operations
    // -----------------------------------------------------------------------

    /// Insert or replace. Returns `true` if an existing value was replaced.
    fn put(&self, key: Self::Key, value: Self::Value) -> StoreResult<bool> {
        Ok(self.get_and_put(key, value)?.is_some())
    }

    /// Returns `true` if a value was removed.
    fn remove(&self, key: &Self::Key) -> StoreResult<bool> {
        Ok(self.get_and_remove(key)?.is_some())
    }

    fn get(&self, key: &Self::Key) -> StoreResult<Option<Self::Value>> {
        let mut slot = None;
        self.get_using(key, &mut slot)?;
        Ok(slot)
    }

    fn contains_key(&self, key: &Self::Key) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Replace only if `key` is present; returns the old value.
    fn replace(&self, key: Self::Key, value: Self::Value) -> StoreResult<Option<Self::Value>> {
        if self.contains_key(&key)? {
            self.get_and_put(key, value)
        } else {
            Ok(None)
        }
    }

    /// Put `new_value` only if the current value equals `old_value`.
    fn replace_if_equal(
        &self,
        key: Self::Key,
        old_value: &Self::Value,
        new_value: Self::Value,
    ) -> StoreResult<bool> {
        match self.get(&key)? {
            Some(current) if current == *old_value => {
                self.put(key, new_value)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Remove only if the current value equals `value`.
    fn remove_if_equal(&self, key: &Self::Key, value: &Self::Value) -> StoreResult<bool> {
        if !self.is_key_type(key) {
            return Ok(false);
        }
        match self.get(key)? {
            Some(current) if current == *value => {
                self.remove(key)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Returns the existing value untouched, or inserts and returns `None`.
    fn put_if_absent(&self, key: Self::Key, value: Self::Value) -> StoreResult<Option<Self::Value>> {
        match self.get(&key)? {
            Some(existing) => Ok(Some(existing)),
            None => self.get_and_put(key, value),
        }
    }

    /// Every entry, segment by segment in index order.
    ///
    /// Drains the whole store into a buffer; use `entries_for` per segment
    /// on hot paths.
    fn entry_set_iterator(&self) -> StoreResult<std::vec::IntoIter<(Self::Key, Self::Value)>> {
        let mut entries = Vec::new();
        for segment in 0..self.segments() {
            let drained = self.entries_for(segment, &mut |k, v| {
                entries.push((k.clone(), v.clone()));
                Ok(())
            });
            never_rejected(drained)?;
        }
        Ok(entries.into_iter())
    }

    fn key_set_iterator(&self) -> StoreResult<std::vec::IntoIter<Self::Key>> {
        let mut keys = Vec::new();
        for segment in 0..self.segments() {
            let drained = self.keys_for(segment, &mut |k| {
                keys.push(k.clone());
                Ok(())
            });
            never_rejected(drained)?;
        }
        Ok(keys.into_iter())
    }

    fn values_iterator(&self) -> StoreResult<std::vec::IntoIter<Self::Value>> {
        let mut values = Vec::new();
        for segment in 0..self.segments() {
            let drained = self.entries_for(segment, &mut |_, v| {
                values.push(v.clone());
                Ok(())
            });
            never_rejected(drained)?;
        }
        Ok(values.into_iter())
    }
}

/// Write `value` into a `get_using` buffer, reusing its allocation when
/// one is present.
pub fn fill_using<V: Clone>(using: &mut Option<V>, value: &V) {
    match using {
        Some(buf) => buf.clone_from(value),
        None => *using = Some(value.clone()),
    }
}

/// Drain consumers never reject, so a rejection here is a bug.
fn never_rejected(result: StoreResult<()>) -> StoreResult<()> {
    match result {
        Err(StoreError::InvalidSubscriber(_)) => {
            tracing::error!("buffering consumer reported rejection");
            panic!("internal consistency violation: a buffering consumer cannot reject");
        }
        other => other,
    }
}

/// A shared store is a store: decorators may hold their inner store behind
/// an `Arc` and every call, overridden derivations included, is forwarded.
impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    type Key = S::Key;
    type Value = S::Value;

    fn get_and_put(&self, key: Self::Key, value: Self::Value) -> StoreResult<Option<Self::Value>> {
        (**self).get_and_put(key, value)
    }

    fn get_and_remove(&self, key: &Self::Key) -> StoreResult<Option<Self::Value>> {
        (**self).get_and_remove(key)
    }

    fn get_using(&self, key: &Self::Key, using: &mut Option<Self::Value>) -> StoreResult<bool> {
        (**self).get_using(key, using)
    }

    fn long_size(&self) -> u64 {
        (**self).long_size()
    }

    fn segments(&self) -> usize {
        (**self).segments()
    }

    fn segment_for(&self, key: &Self::Key) -> usize {
        (**self).segment_for(key)
    }

    fn keys_for(&self, segment: usize, consumer: &mut KeyConsumer<'_, Self::Key>) -> StoreResult<()> {
        (**self).keys_for(segment, consumer)
    }

    fn entries_for(
        &self,
        segment: usize,
        consumer: &mut EntryConsumer<'_, Self::Key, Self::Value>,
    ) -> StoreResult<()> {
        (**self).entries_for(segment, consumer)
    }

    fn clear(&self) -> StoreResult<()> {
        (**self).clear()
    }

    fn is_read_only(&self) -> bool {
        (**self).is_read_only()
    }

    fn close(&self) {
        (**self).close()
    }

    fn is_key_type(&self, key: &Self::Key) -> bool {
        (**self).is_key_type(key)
    }

    fn put(&self, key: Self::Key, value: Self::Value) -> StoreResult<bool> {
        (**self).put(key, value)
    }

    fn remove(&self, key: &Self::Key) -> StoreResult<bool> {
        (**self).remove(key)
    }

    fn get(&self, key: &Self::Key) -> StoreResult<Option<Self::Value>> {
        (**self).get(key)
    }

    fn contains_key(&self, key: &Self::Key) -> StoreResult<bool> {
        (**self).contains_key(key)
    }

    fn replace(&self, key: Self::Key, value: Self::Value) -> StoreResult<Option<Self::Value>> {
        (**self).replace(key, value)
    }

    fn replace_if_equal(
        &self,
        key: Self::Key,
        old_value: &Self::Value,
        new_value: Self::Value,
    ) -> StoreResult<bool> {
        (**self).replace_if_equal(key, old_value, new_value)
    }

    fn remove_if_equal(&self, key: &Self::Key, value: &Self::Value) -> StoreResult<bool> {
        (**self).remove_if_equal(key, value)
    }

    fn put_if_absent(&self, key: Self::Key, value: Self::Value) -> StoreResult<Option<Self::Value>> {
        (**self).put_if_absent(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Implements only the primitives, so every derived method under test
    /// is the trait default.
    #[derive(Default)]
    struct VecStore {
        entries: Mutex<Vec<(String, String)>>,
        reject_prefix: Option<&'static str>,
    }

    impl KeyValueStore for VecStore {
        type Key = String;
        type Value = String;

        fn get_and_put(&self, key: String, value: String) -> StoreResult<Option<String>> {
            let mut entries = self.entries.lock();
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some((_, v)) => Ok(Some(std::mem::replace(v, value))),
                None => {
                    entries.push((key, value));
                    Ok(None)
                }
            }
        }

        fn get_and_remove(&self, key: &String) -> StoreResult<Option<String>> {
            let mut entries = self.entries.lock();
            let pos = entries.iter().position(|(k, _)| k == key);
            Ok(pos.map(|i| entries.remove(i).1))
        }

        fn get_using(&self, key: &String, using: &mut Option<String>) -> StoreResult<bool> {
            let entries = self.entries.lock();
            match entries.iter().find(|(k, _)| k == key) {
                Some((_, v)) => {
                    fill_using(using, v);
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        fn long_size(&self) -> u64 {
            self.entries.lock().len() as u64
        }

        fn keys_for(&self, _segment: usize, consumer: &mut KeyConsumer<'_, String>) -> StoreResult<()> {
            for (k, _) in self.entries.lock().iter() {
                consumer(k)?;
            }
            Ok(())
        }

        fn entries_for(
            &self,
            _segment: usize,
            consumer: &mut EntryConsumer<'_, String, String>,
        ) -> StoreResult<()> {
            for (k, v) in self.entries.lock().iter() {
                consumer(k, v)?;
            }
            Ok(())
        }

        fn clear(&self) -> StoreResult<()> {
            self.entries.lock().clear();
            Ok(())
        }

        fn is_key_type(&self, key: &String) -> bool {
            self.reject_prefix.map_or(true, |p| !key.starts_with(p))
        }
    }

    fn s(v: &str) -> String {
        v.to_string()
    }

    #[test]
    fn test_put_remove_report_previous_state() {
        let store = VecStore::default();
        assert!(!store.put(s("a"), s("1")).unwrap());
        assert!(store.put(s("a"), s("2")).unwrap());
        assert_eq!(store.get(&s("a")).unwrap(), Some(s("2")));
        assert!(store.remove(&s("a")).unwrap());
        assert!(!store.remove(&s("a")).unwrap());
        assert_eq!(store.long_size(), 0);
    }

    #[test]
    fn test_get_using_reuses_buffer() {
        let store = VecStore::default();
        store.put(s("k"), s("value")).unwrap();

        let mut buf = Some(String::with_capacity(64));
        assert!(store.get_using(&s("k"), &mut buf).unwrap());
        let buf = buf.unwrap();
        assert_eq!(buf, "value");
        assert!(buf.capacity() >= 64);

        let mut untouched = Some(s("keep"));
        assert!(!store.get_using(&s("missing"), &mut untouched).unwrap());
        assert_eq!(untouched, Some(s("keep")));
    }

    #[test]
    fn test_replace_requires_presence() {
        let store = VecStore::default();
        assert_eq!(store.replace(s("k"), s("v")).unwrap(), None);
        assert!(!store.contains_key(&s("k")).unwrap());

        store.put(s("k"), s("v1")).unwrap();
        assert_eq!(store.replace(s("k"), s("v2")).unwrap(), Some(s("v1")));
        assert_eq!(store.get(&s("k")).unwrap(), Some(s("v2")));
    }

    #[test]
    fn test_replace_if_equal() {
        let store = VecStore::default();
        assert!(!store.replace_if_equal(s("k"), &s("v1"), s("v2")).unwrap());

        store.put(s("k"), s("v1")).unwrap();
        assert!(!store.replace_if_equal(s("k"), &s("other"), s("v2")).unwrap());
        assert_eq!(store.get(&s("k")).unwrap(), Some(s("v1")));
        assert!(store.replace_if_equal(s("k"), &s("v1"), s("v2")).unwrap());
        assert_eq!(store.get(&s("k")).unwrap(), Some(s("v2")));
    }

    #[test]
    fn test_remove_if_equal_and_key_type_guard() {
        let store = VecStore { reject_prefix: Some("sys."), ..Default::default() };
        store.put(s("k"), s("v")).unwrap();
        store.put(s("sys.k"), s("v")).unwrap();

        assert!(!store.remove_if_equal(&s("k"), &s("other")).unwrap());
        assert!(store.remove_if_equal(&s("k"), &s("v")).unwrap());
        assert!(!store.contains_key(&s("k")).unwrap());

        // Guarded keys are never removed, even on a value match
        assert!(!store.remove_if_equal(&s("sys.k"), &s("v")).unwrap());
        assert!(store.contains_key(&s("sys.k")).unwrap());
    }

    #[test]
    fn test_put_if_absent() {
        let store = VecStore::default();
        assert_eq!(store.put_if_absent(s("k"), s("v1")).unwrap(), None);
        assert_eq!(store.put_if_absent(s("k"), s("v2")).unwrap(), Some(s("v1")));
        assert_eq!(store.get(&s("k")).unwrap(), Some(s("v1")));
    }

    #[test]
    fn test_iterators_drain_everything() {
        let store = VecStore::default();
        for i in 0..5 {
            store.put(format!("k{}", i), format!("v{}", i)).unwrap();
        }
        let mut keys: Vec<_> = store.key_set_iterator().unwrap().collect();
        keys.sort();
        assert_eq!(keys, vec!["k0", "k1", "k2", "k3", "k4"]);
        assert_eq!(store.entry_set_iterator().unwrap().count(), 5);
        assert_eq!(store.values_iterator().unwrap().filter(|v| v.starts_with('v')).count(), 5);

        // One-shot: a second call re-enumerates current state
        store.remove(&s("k0")).unwrap();
        assert_eq!(store.key_set_iterator().unwrap().count(), 4);
    }

    #[test]
    fn test_rejecting_consumer_propagates() {
        let store = VecStore::default();
        store.put(s("a"), s("1")).unwrap();
        store.put(s("b"), s("2")).unwrap();

        let mut seen = 0;
        let result = store.keys_for(0, &mut |_| {
            seen += 1;
            Err(InvalidSubscriber)
        });
        assert_eq!(result, Err(StoreError::InvalidSubscriber(InvalidSubscriber)));
        assert_eq!(seen, 1);
    }

    /// Rejects enumeration no matter what the consumer says.
    struct BrokenEnumeration(VecStore);

    impl KeyValueStore for BrokenEnumeration {
        type Key = String;
        type Value = String;

        fn get_and_put(&self, key: String, value: String) -> StoreResult<Option<String>> {
            self.0.get_and_put(key, value)
        }

        fn get_and_remove(&self, key: &String) -> StoreResult<Option<String>> {
            self.0.get_and_remove(key)
        }

        fn get_using(&self, key: &String, using: &mut Option<String>) -> StoreResult<bool> {
            self.0.get_using(key, using)
        }

        fn long_size(&self) -> u64 {
            self.0.long_size()
        }

        fn keys_for(&self, _segment: usize, _consumer: &mut KeyConsumer<'_, String>) -> StoreResult<()> {
            Err(InvalidSubscriber.into())
        }

        fn entries_for(
            &self,
            segment: usize,
            consumer: &mut EntryConsumer<'_, String, String>,
        ) -> StoreResult<()> {
            self.0.entries_for(segment, consumer)
        }

        fn clear(&self) -> StoreResult<()> {
            self.0.clear()
        }
    }

    #[test]
    #[should_panic(expected = "internal consistency violation")]
    fn test_rejection_inside_iterator_aborts() {
        let store = BrokenEnumeration(VecStore::default());
        store.put(s("a"), s("1")).unwrap();
        let _ = store.key_set_iterator();
    }

    #[test]
    fn test_iterator_passes_other_errors_through() {
        struct Failing;

        impl KeyValueStore for Failing {
            type Key = String;
            type Value = String;

            fn get_and_put(&self, _key: String, _value: String) -> StoreResult<Option<String>> {
                Ok(None)
            }

            fn get_and_remove(&self, _key: &String) -> StoreResult<Option<String>> {
                Ok(None)
            }

            fn get_using(&self, _key: &String, _using: &mut Option<String>) -> StoreResult<bool> {
                Ok(false)
            }

            fn long_size(&self) -> u64 {
                0
            }

            fn keys_for(&self, _segment: usize, _consumer: &mut KeyConsumer<'_, String>) -> StoreResult<()> {
                Ok(())
            }

            fn entries_for(
                &self,
                _segment: usize,
                _consumer: &mut EntryConsumer<'_, String, String>,
            ) -> StoreResult<()> {
                Err(StoreError::Backend { message: "segment lost".into() })
            }

            fn clear(&self) -> StoreResult<()> {
                Ok(())
            }
        }

        let err = Failing.entry_set_iterator().unwrap_err();
        assert_eq!(err, StoreError::Backend { message: "segment lost".into() });
    }

    #[test]
    fn test_arc_forwards() {
        let store: Arc<dyn KeyValueStore<Key = String, Value = String>> = Arc::new(VecStore::default());
        assert!(!store.put(s("a"), s("1")).unwrap());
        assert_eq!(store.get(&s("a")).unwrap(), Some(s("1")));
        assert_eq!(store.long_size(), 1);
        assert_eq!(store.segments(), 1);
    }
}
