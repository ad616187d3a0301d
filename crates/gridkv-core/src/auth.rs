//! Authentication extension point.
//!
//! [`AuthenticatedStore`] asks an [`Authenticator`] before delegating each
//! call. How credentials are established is left to the authenticator; this
//! layer only turns a refusal into `StoreError::AccessDenied`. It composes
//! with the subscription overlay in either order.

use crate::error::{StoreError, StoreResult};
use crate::store::{EntryConsumer, KeyConsumer, KeyValueStore};

/// Kind of access an operation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
}

impl Access {
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Read => "read",
            Access::Write => "write",
        }
    }
}

/// Decides whether an operation may proceed. `key` is `None` for
/// whole-store operations such as enumeration and `clear`.
pub trait Authenticator<K>: Send + Sync {
    fn check(&self, access: Access, key: Option<&K>) -> bool;
}

impl<K, F> Authenticator<K> for F
where
    F: Fn(Access, Option<&K>) -> bool + Send + Sync,
{
    fn check(&self, access: Access, key: Option<&K>) -> bool {
        self(access, key)
    }
}

/// Store decorator enforcing an [`Authenticator`].
pub struct AuthenticatedStore<S, A> {
    name: String,
    inner: S,
    authenticator: A,
}

impl<S, A> AuthenticatedStore<S, A>
where
    S: KeyValueStore,
    A: Authenticator<S::Key>,
{
    pub fn new(name: impl Into<String>, inner: S, authenticator: A) -> Self {
        Self {
            name: name.into(),
            inner,
            authenticator,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn authorize(&self, access: Access, key: Option<&S::Key>) -> StoreResult<()> {
        if self.authenticator.check(access, key) {
            return Ok(());
        }
        tracing::debug!(store = %self.name, access = access.as_str(), "access denied");
        Err(StoreError::AccessDenied {
            name: self.name.clone(),
            access: access.as_str(),
        })
    }
}

impl<S, A> KeyValueStore for AuthenticatedStore<S, A>
where
    S: KeyValueStore,
    A: Authenticator<S::Key>,
{
    type Key = S::Key;
    type Value = S::Value;

    fn get_and_put(&self, key: S::Key, value: S::Value) -> StoreResult<Option<S::Value>> {
        self.authorize(Access::Write, Some(&key))?;
        self.inner.get_and_put(key, value)
    }

    fn get_and_remove(&self, key: &S::Key) -> StoreResult<Option<S::Value>> {
        self.authorize(Access::Write, Some(key))?;
        self.inner.get_and_remove(key)
    }

    fn get_using(&self, key: &S::Key, using: &mut Option<S::Value>) -> StoreResult<bool> {
        self.authorize(Access::Read, Some(key))?;
        self.inner.get_using(key, using)
    }

    fn long_size(&self) -> u64 {
        self.inner.long_size()
    }

    fn segments(&self) -> usize {
        self.inner.segments()
    }

    fn segment_for(&self, key: &S::Key) -> usize {
        self.inner.segment_for(key)
    }

    fn keys_for(&self, segment: usize, consumer: &mut KeyConsumer<'_, S::Key>) -> StoreResult<()> {
        self.authorize(Access::Read, None)?;
        self.inner.keys_for(segment, consumer)
    }

    fn entries_for(
        &self,
        segment: usize,
        consumer: &mut EntryConsumer<'_, S::Key, S::Value>,
    ) -> StoreResult<()> {
        self.authorize(Access::Read, None)?;
        self.inner.entries_for(segment, consumer)
    }

    fn clear(&self) -> StoreResult<()> {
        self.authorize(Access::Write, None)?;
        self.inner.clear()
    }

    fn is_read_only(&self) -> bool {
        self.inner.is_read_only()
    }

    fn close(&self) {
        self.inner.close()
    }

    fn is_key_type(&self, key: &S::Key) -> bool {
        self.inner.is_key_type(key)
    }

    fn put(&self, key: S::Key, value: S::Value) -> StoreResult<bool> {
        self.authorize(Access::Write, Some(&key))?;
        self.inner.put(key, value)
    }

    fn remove(&self, key: &S::Key) -> StoreResult<bool> {
        self.authorize(Access::Write, Some(key))?;
        self.inner.remove(key)
    }

    fn get(&self, key: &S::Key) -> StoreResult<Option<S::Value>> {
        self.authorize(Access::Read, Some(key))?;
        self.inner.get(key)
    }

    fn contains_key(&self, key: &S::Key) -> StoreResult<bool> {
        self.authorize(Access::Read, Some(key))?;
        self.inner.contains_key(key)
    }

    fn replace(&self, key: S::Key, value: S::Value) -> StoreResult<Option<S::Value>> {
        self.authorize(Access::Write, Some(&key))?;
        self.inner.replace(key, value)
    }

    fn replace_if_equal(&self, key: S::Key, old_value: &S::Value, new_value: S::Value) -> StoreResult<bool> {
        self.authorize(Access::Write, Some(&key))?;
        self.inner.replace_if_equal(key, old_value, new_value)
    }

    fn remove_if_equal(&self, key: &S::Key, value: &S::Value) -> StoreResult<bool> {
        self.authorize(Access::Write, Some(key))?;
        self.inner.remove_if_equal(key, value)
    }

    fn put_if_absent(&self, key: S::Key, value: S::Value) -> StoreResult<Option<S::Value>> {
        self.authorize(Access::Write, Some(&key))?;
        self.inner.put_if_absent(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::memory::SegmentedMemoryStore;

    fn guarded() -> AuthenticatedStore<SegmentedMemoryStore<String, u32>, impl Authenticator<String>> {
        let inner = SegmentedMemoryStore::new("/secure", StoreConfig::default()).unwrap();
        AuthenticatedStore::new("/secure", inner, |access: Access, key: Option<&String>| {
            match (access, key) {
                (Access::Read, _) => true,
                (Access::Write, Some(k)) => !k.starts_with("admin."),
                (Access::Write, None) => false,
            }
        })
    }

    #[test]
    fn test_writes_checked_per_key() {
        let store = guarded();
        assert!(!store.put("user.1".into(), 1).unwrap());
        let err = store.put("admin.1".into(), 1).unwrap_err();
        assert_eq!(err, StoreError::AccessDenied { name: "/secure".into(), access: "write" });
        assert!(!store.contains_key(&"admin.1".into()).unwrap());
        assert_eq!(store.get(&"user.1".into()).unwrap(), Some(1));
    }

    #[test]
    fn test_whole_store_ops() {
        let store = guarded();
        store.put("user.1".into(), 1).unwrap();
        assert!(matches!(store.clear(), Err(StoreError::AccessDenied { .. })));
        assert_eq!(store.key_set_iterator().unwrap().count(), 1);
    }

    #[test]
    fn test_reads_denied() {
        let inner = SegmentedMemoryStore::<String, u32>::new("/sealed", StoreConfig::default()).unwrap();
        let store = AuthenticatedStore::new("/sealed", inner, |access: Access, _key: Option<&String>| {
            access == Access::Write
        });
        store.put("k".into(), 7).unwrap();
        assert!(store.get(&"k".into()).is_err());
        assert!(store.keys_for(0, &mut |_| Ok(())).is_err());
        assert_eq!(store.inner().get(&"k".into()).unwrap(), Some(7));
    }
}
