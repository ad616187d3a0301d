//! Event sinks and the per-store subscriber registry.
//!
//! The subscription overlay talks to exactly one [`EventSink`]. The default
//! sink, [`SubscriptionCollection`], fans each event out to registered
//! [`Subscriber`]s in registration order.

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::InvalidSubscriber;
use crate::event::ChangeEvent;

/// Receiver of change events from the subscription overlay.
pub trait EventSink<K, V>: Send + Sync {
    /// Deliver one event. Called synchronously from the mutating call.
    fn notify_event(&self, event: &ChangeEvent<K, V>) -> Result<(), InvalidSubscriber>;

    /// Whether any consumer needs the pre-mutation value. Polled on every
    /// `put`/`remove`; must be cheap and side-effect free.
    fn needs_previous(&self) -> bool;

    /// The owning store is closing; release subscribers.
    fn close(&self) {}
}

/// A single consumer of change events.
pub trait Subscriber<K, V>: Send + Sync {
    /// Returning `Err(InvalidSubscriber)` ends the subscription.
    fn on_event(&self, event: &ChangeEvent<K, V>) -> Result<(), InvalidSubscriber>;

    /// Sampled once at registration.
    fn needs_previous(&self) -> bool {
        false
    }

    /// Called once when the subscription ends, whatever the reason.
    fn on_end_of_subscription(&self) {}
}

impl<K, V, F> Subscriber<K, V> for F
where
    F: Fn(&ChangeEvent<K, V>) -> Result<(), InvalidSubscriber> + Send + Sync,
{
    fn on_event(&self, event: &ChangeEvent<K, V>) -> Result<(), InvalidSubscriber> {
        self(event)
    }
}

/// Handle returned by [`SubscriptionCollection::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Registration<K, V> {
    id: SubscriptionId,
    needs_previous: bool,
    subscriber: Arc<dyn Subscriber<K, V>>,
}

impl<K, V> Clone for Registration<K, V> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            needs_previous: self.needs_previous,
            subscriber: Arc::clone(&self.subscriber),
        }
    }
}

/// Subscriber registry scoped to one store.
///
/// The list is copy-on-write: delivery works on a snapshot, so subscribers
/// may subscribe or unsubscribe from inside `on_event`. A subscriber that
/// rejects an event is deregistered and the remaining subscribers still
/// receive it.
pub struct SubscriptionCollection<K, V> {
    name: String,
    subscribers: RwLock<Arc<Vec<Registration<K, V>>>>,
    next_id: AtomicU64,
    /// Registered subscribers that need previous values
    needs_previous: AtomicUsize,
}

impl<K, V> SubscriptionCollection<K, V> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscribers: RwLock::new(Arc::new(Vec::new())),
            next_id: AtomicU64::new(1),
            needs_previous: AtomicUsize::new(0),
        }
    }

    /// Register `subscriber` for every subsequent event.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber<K, V>>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let needs_previous = subscriber.needs_previous();

        let mut subscribers = self.subscribers.write();
        let mut updated = Vec::clone(&subscribers);
        updated.push(Registration { id, needs_previous, subscriber });
        *subscribers = Arc::new(updated);
        if needs_previous {
            self.needs_previous.fetch_add(1, Ordering::Release);
        }

        tracing::debug!(store = %self.name, subscription = %id, needs_previous, "subscriber registered");
        id
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        match self.take(|r| r.id == id).pop() {
            Some(removed) => {
                tracing::debug!(store = %self.name, subscription = %id, "subscriber removed");
                removed.subscriber.on_end_of_subscription();
                true
            }
            None => false,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Drop every subscriber, notifying each that its subscription ended.
    pub fn close(&self) {
        let removed = self.take(|_| true);
        if !removed.is_empty() {
            tracing::debug!(store = %self.name, count = removed.len(), "closing subscriptions");
        }
        for registration in removed {
            registration.subscriber.on_end_of_subscription();
        }
    }

    /// Remove matching registrations under the write lock and return them.
    fn take(&self, matches: impl Fn(&Registration<K, V>) -> bool) -> Vec<Registration<K, V>> {
        let mut subscribers = self.subscribers.write();
        let (removed, kept): (Vec<_>, Vec<_>) = subscribers.iter().cloned().partition(|r| matches(r));
        if removed.is_empty() {
            return removed;
        }
        let dropped_previous = removed.iter().filter(|r| r.needs_previous).count();
        self.needs_previous.fetch_sub(dropped_previous, Ordering::Release);
        *subscribers = Arc::new(kept);
        removed
    }
}

impl<K, V> EventSink<K, V> for SubscriptionCollection<K, V>
where
    K: fmt::Debug + Send + Sync,
    V: Send + Sync,
{
    fn notify_event(&self, event: &ChangeEvent<K, V>) -> Result<(), InvalidSubscriber> {
        let snapshot = Arc::clone(&self.subscribers.read());
        let mut rejected = Vec::new();
        for registration in snapshot.iter() {
            if registration.subscriber.on_event(event).is_err() {
                rejected.push(registration.id);
            }
        }

        for id in rejected {
            if let Some(removed) = self.take(|r| r.id == id).pop() {
                tracing::warn!(
                    store = %self.name,
                    subscription = %id,
                    key = ?event.key(),
                    "subscriber rejected event, removing"
                );
                removed.subscriber.on_end_of_subscription();
            }
        }
        Ok(())
    }

    fn needs_previous(&self) -> bool {
        self.needs_previous.load(Ordering::Acquire) > 0
    }

    fn close(&self) {
        SubscriptionCollection::close(self)
    }
}
