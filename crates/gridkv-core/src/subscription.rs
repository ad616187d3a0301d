//! Change-notification decorator.
//!
//! [`SubscriptionStore`] wraps any [`KeyValueStore`] and reports every
//! successful mutation to its [`EventSink`] as exactly one [`ChangeEvent`],
//! before the mutating call returns.
//!
//! Ordering: mutations are serialized per segment of the inner store while
//! the event is delivered, so for any key the event for mutation N reaches
//! subscribers before mutation N+1 commits. Keys in different segments are
//! not ordered against each other. A subscriber must not write back into
//! the same store from inside `on_event`.
//!
//! `put` and `remove` take a fast path when the sink reports that nobody
//! needs previous values: the event is built from the inner boolean result
//! and carries no old value. Only `get_and_put`/`get_and_remove` (and the
//! precise path) guarantee the true old value.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::asset::Asset;
use crate::context::RequestContext;
use crate::error::StoreResult;
use crate::event::ChangeEvent;
use crate::sink::{EventSink, SubscriptionCollection, Subscriber, SubscriptionId};
use crate::store::{EntryConsumer, KeyConsumer, KeyValueStore};

/// Store decorator that emits a change event per successful mutation.
pub struct SubscriptionStore<S, E = SubscriptionCollection<<S as KeyValueStore>::Key, <S as KeyValueStore>::Value>>
where
    S: KeyValueStore,
{
    name: String,
    asset: Option<Arc<dyn Asset>>,
    inner: S,
    sink: E,
    /// One lock per inner segment, held across commit and notify
    ordering: Vec<Mutex<()>>,
}

impl<S> SubscriptionStore<S>
where
    S: KeyValueStore,
    S::Key: fmt::Debug,
{
    /// Naming-layer construction: `(context, parent, inner) -> decorated`.
    pub fn new(context: &RequestContext, parent: Arc<dyn Asset>, inner: S) -> Self {
        let name = format!("{}/{}", parent.full_name(), context.name());
        let sink = SubscriptionCollection::new(name.clone());
        let mut store = Self::with_sink(name, inner, sink);
        store.asset = Some(parent);
        store
    }

    /// Register a subscriber on this store's collection.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber<S::Key, S::Value>>) -> SubscriptionId {
        self.sink.subscribe(subscriber)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.sink.unsubscribe(id)
    }
}

impl<S, E> SubscriptionStore<S, E>
where
    S: KeyValueStore,
    S::Key: fmt::Debug,
    E: EventSink<S::Key, S::Value>,
{
    /// Wrap `inner`, delivering events to a caller-supplied sink.
    pub fn with_sink(name: impl Into<String>, inner: S, sink: E) -> Self {
        let name = name.into();
        let ordering = (0..inner.segments().max(1)).map(|_| Mutex::new(())).collect::<Vec<_>>();
        tracing::debug!(store = %name, stripes = ordering.len(), "subscription overlay attached");
        Self {
            name,
            asset: None,
            inner,
            sink,
            ordering,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent asset supplied at construction, if any.
    pub fn asset(&self) -> Option<&Arc<dyn Asset>> {
        self.asset.as_ref()
    }

    pub fn subscription(&self) -> &E {
        &self.sink
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn order(&self, key: &S::Key) -> MutexGuard<'_, ()> {
        let stripe = self.inner.segment_for(key) % self.ordering.len();
        self.ordering[stripe].lock()
    }

    /// Deliver an event for a mutation that has already committed.
    fn notify(&self, event: ChangeEvent<S::Key, S::Value>) {
        tracing::trace!(store = %self.name, kind = ?event.kind(), key = ?event.key(), "change event");
        if self.sink.notify_event(&event).is_err() {
            tracing::error!(store = %self.name, key = ?event.key(), "sink rejected a committed event");
            panic!(
                "internal consistency violation: sink for {} rejected a mandatory {:?} event",
                self.name,
                event.kind()
            );
        }
    }
}

impl<S, E> KeyValueStore for SubscriptionStore<S, E>
where
    S: KeyValueStore,
    S::Key: fmt::Debug,
    E: EventSink<S::Key, S::Value>,
{
    type Key = S::Key;
    type Value = S::Value;

    fn get_and_put(&self, key: S::Key, value: S::Value) -> StoreResult<Option<S::Value>> {
        let _order = self.order(&key);
        let old_value = self.inner.get_and_put(key.clone(), value.clone())?;
        let event = match &old_value {
            Some(old) => ChangeEvent::updated(key, Some(old.clone()), value),
            None => ChangeEvent::inserted(key, value),
        };
        self.notify(event);
        Ok(old_value)
    }

    fn get_and_remove(&self, key: &S::Key) -> StoreResult<Option<S::Value>> {
        let _order = self.order(key);
        let old_value = self.inner.get_and_remove(key)?;
        if let Some(old) = &old_value {
            self.notify(ChangeEvent::removed(key.clone(), Some(old.clone())));
        }
        Ok(old_value)
    }

    fn get_using(&self, key: &S::Key, using: &mut Option<S::Value>) -> StoreResult<bool> {
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
        self.inner.keys_for(segment, consumer)
    }

    fn entries_for(
        &self,
        segment: usize,
        consumer: &mut EntryConsumer<'_, S::Key, S::Value>,
    ) -> StoreResult<()> {
        self.inner.entries_for(segment, consumer)
    }

    /// Removes entry by entry so each removal is reported.
    fn clear(&self) -> StoreResult<()> {
        if self.inner.is_read_only() {
            // Surface the inner store's refusal even when it is empty
            return self.inner.clear();
        }
        for segment in 0..self.inner.segments() {
            let mut keys = Vec::new();
            self.inner.keys_for(segment, &mut |k| {
                keys.push(k.clone());
                Ok(())
            })?;
            for key in &keys {
                self.get_and_remove(key)?;
            }
        }
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.inner.is_read_only()
    }

    fn close(&self) {
        self.sink.close();
        self.inner.close();
    }

    fn is_key_type(&self, key: &S::Key) -> bool {
        self.inner.is_key_type(key)
    }

    fn put(&self, key: S::Key, value: S::Value) -> StoreResult<bool> {
        if self.sink.needs_previous() {
            return Ok(self.get_and_put(key, value)?.is_some());
        }
        let _order = self.order(&key);
        let replaced = self.inner.put(key.clone(), value.clone())?;
        let event = if replaced {
            ChangeEvent::updated(key, None, value)
        } else {
            ChangeEvent::inserted(key, value)
        };
        self.notify(event);
        Ok(replaced)
    }

    fn remove(&self, key: &S::Key) -> StoreResult<bool> {
        if self.sink.needs_previous() {
            return Ok(self.get_and_remove(key)?.is_some());
        }
        let _order = self.order(key);
        let removed = self.inner.remove(key)?;
        if removed {
            self.notify(ChangeEvent::removed(key.clone(), None));
        }
        Ok(removed)
    }

    fn get(&self, key: &S::Key) -> StoreResult<Option<S::Value>> {
        self.inner.get(key)
    }

    fn contains_key(&self, key: &S::Key) -> StoreResult<bool> {
        self.inner.contains_key(key)
    }

    fn replace(&self, key: S::Key, value: S::Value) -> StoreResult<Option<S::Value>> {
        let _order = self.order(&key);
        let old_value = self.inner.replace(key.clone(), value.clone())?;
        if let Some(old) = &old_value {
            self.notify(ChangeEvent::updated(key, Some(old.clone()), value));
        }
        Ok(old_value)
    }

    fn replace_if_equal(&self, key: S::Key, old_value: &S::Value, new_value: S::Value) -> StoreResult<bool> {
        let _order = self.order(&key);
        if self.inner.replace_if_equal(key.clone(), old_value, new_value.clone())? {
            self.notify(ChangeEvent::updated(key, Some(old_value.clone()), new_value));
            return Ok(true);
        }
        Ok(false)
    }

    fn remove_if_equal(&self, key: &S::Key, value: &S::Value) -> StoreResult<bool> {
        let _order = self.order(key);
        if self.inner.remove_if_equal(key, value)? {
            self.notify(ChangeEvent::removed(key.clone(), Some(value.clone())));
            return Ok(true);
        }
        Ok(false)
    }

    fn put_if_absent(&self, key: S::Key, value: S::Value) -> StoreResult<Option<S::Value>> {
        let _order = self.order(&key);
        let existing = self.inner.put_if_absent(key.clone(), value.clone())?;
        if existing.is_none() {
            self.notify(ChangeEvent::inserted(key, value));
        }
        Ok(existing)
    }
}
