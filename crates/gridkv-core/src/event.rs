//! Change events emitted by the subscription overlay.

use serde::{Deserialize, Serialize};

/// One observed mutation.
///
/// `old_value` is always populated by `get_and_put`/`get_and_remove` and by
/// the conditional operations. The fast `put`/`remove` paths leave it `None`
/// when no subscriber asked for previous values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent<K, V> {
    Inserted {
        key: K,
        value: V,
    },
    Updated {
        key: K,
        old_value: Option<V>,
        value: V,
    },
    Removed {
        key: K,
        old_value: Option<V>,
    },
}

/// Variant tag, for filtering without matching on payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Inserted,
    Updated,
    Removed,
}

impl<K, V> ChangeEvent<K, V> {
    pub fn inserted(key: K, value: V) -> Self {
        ChangeEvent::Inserted { key, value }
    }

    pub fn updated(key: K, old_value: Option<V>, value: V) -> Self {
        ChangeEvent::Updated { key, old_value, value }
    }

    pub fn removed(key: K, old_value: Option<V>) -> Self {
        ChangeEvent::Removed { key, old_value }
    }

    pub fn key(&self) -> &K {
        match self {
            ChangeEvent::Inserted { key, .. }
            | ChangeEvent::Updated { key, .. }
            | ChangeEvent::Removed { key, .. } => key,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            ChangeEvent::Inserted { .. } => EventKind::Inserted,
            ChangeEvent::Updated { .. } => EventKind::Updated,
            ChangeEvent::Removed { .. } => EventKind::Removed,
        }
    }

    /// Value before the mutation, when known.
    pub fn old_value(&self) -> Option<&V> {
        match self {
            ChangeEvent::Inserted { .. } => None,
            ChangeEvent::Updated { old_value, .. } | ChangeEvent::Removed { old_value, .. } => {
                old_value.as_ref()
            }
        }
    }

    /// Value after the mutation; `None` for removals.
    pub fn new_value(&self) -> Option<&V> {
        match self {
            ChangeEvent::Inserted { value, .. } | ChangeEvent::Updated { value, .. } => Some(value),
            ChangeEvent::Removed { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let e = ChangeEvent::updated("a", Some(1), 2);
        assert_eq!(*e.key(), "a");
        assert_eq!(e.kind(), EventKind::Updated);
        assert_eq!(e.old_value(), Some(&1));
        assert_eq!(e.new_value(), Some(&2));

        let e: ChangeEvent<&str, i32> = ChangeEvent::removed("a", None);
        assert_eq!(e.kind(), EventKind::Removed);
        assert_eq!(e.old_value(), None);
        assert_eq!(e.new_value(), None);
    }

    #[test]
    fn test_serialized_shape() {
        let e = ChangeEvent::updated("a".to_string(), None, "2".to_string());
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "updated", "key": "a", "old_value": null, "value": "2"})
        );

        let back: ChangeEvent<String, String> = serde_json::from_value(json).unwrap();
        assert_eq!(back, e);
    }
}
