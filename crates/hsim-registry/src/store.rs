//! Tag-keyed store for one namespace.

use hsim_core::{FilterLookup, Namespace, RegistryError, SharedFilter, Tag};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, warn};

/// Values keyed by caller-assigned tag.
///
/// The map is created on the first successful [`add`](Self::add). Lookups
/// before that return `None` and log that nothing of this kind has been
/// defined yet.
pub struct TaggedStore<V> {
    namespace: Namespace,
    entries: Mutex<Option<BTreeMap<Tag, V>>>,
}

impl<V: Clone> TaggedStore<V> {
    /// Empty, uninitialised store.
    #[must_use]
    pub fn new(namespace: Namespace) -> Self {
        Self {
            namespace,
            entries: Mutex::new(None),
        }
    }

    /// Namespace this store serves.
    #[must_use]
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Insert `value` under `tag`.
    ///
    /// On a duplicate tag the existing entry is kept and `value` is dropped
    /// after the lock is released.
    pub fn add(&self, tag: Tag, value: V) -> Result<(), RegistryError> {
        let mut guard = self.entries.lock();
        let map = guard.get_or_insert_with(BTreeMap::new);
        if map.contains_key(&tag) {
            drop(guard);
            debug!(namespace = %self.namespace, tag, "rejected duplicate tag");
            drop(value);
            return Err(RegistryError::DuplicateTag {
                namespace: self.namespace,
                tag,
            });
        }
        map.insert(tag, value);
        debug!(namespace = %self.namespace, tag, "added");
        Ok(())
    }

    /// Value under `tag`, if any.
    #[must_use]
    pub fn get(&self, tag: Tag) -> Option<V> {
        let guard = self.entries.lock();
        match guard.as_ref() {
            Some(map) => map.get(&tag).cloned(),
            None => {
                warn!(namespace = %self.namespace, tag, "no {} objects have been defined", self.namespace);
                None
            }
        }
    }

    /// Whether `tag` is present.
    #[must_use]
    pub fn contains(&self, tag: Tag) -> bool {
        self.entries
            .lock()
            .as_ref()
            .is_some_and(|map| map.contains_key(&tag))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().as_ref().map_or(0, BTreeMap::len)
    }

    /// Whether the store holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tags in ascending order.
    #[must_use]
    pub fn tags(&self) -> Vec<Tag> {
        self.entries
            .lock()
            .as_ref()
            .map(|map| map.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Remove and return the value under `tag`.
    pub fn remove(&self, tag: Tag) -> Option<V> {
        self.entries.lock().as_mut()?.remove(&tag)
    }

    /// Drop every entry in ascending tag order, outside the lock.
    ///
    /// The store stays initialised.
    pub fn clear(&self) {
        let drained = {
            let mut guard = self.entries.lock();
            guard.as_mut().map(std::mem::take)
        };
        if let Some(map) = drained {
            let count = map.len();
            for (tag, value) in map {
                debug!(namespace = %self.namespace, tag, "dropping");
                drop(value);
            }
            if count > 0 {
                debug!(namespace = %self.namespace, count, "store cleared");
            }
        }
    }
}

impl FilterLookup for TaggedStore<SharedFilter> {
    fn filter(&self, tag: Tag) -> Option<SharedFilter> {
        self.get(tag)
    }
}

impl<V> fmt::Debug for TaggedStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.entries.lock();
        f.debug_struct("TaggedStore")
            .field("namespace", &self.namespace)
            .field("tags", &guard.as_ref().map(|map| map.keys().collect::<Vec<_>>()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tracing_test::traced_test;

    #[test]
    fn duplicate_keeps_original() {
        let store = TaggedStore::new(Namespace::Controls);
        store.add(3, "first").unwrap();
        let err = store.add(3, "second").unwrap_err();
        assert_eq!(err.to_string(), "control with tag 3 already exists");
        assert_eq!(store.get(3), Some("first"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn rejected_value_is_dropped() {
        let store = TaggedStore::new(Namespace::Sites);
        let original = Arc::new(());
        let rejected = Arc::new(());
        store.add(1, Arc::clone(&original)).unwrap();
        assert!(store.add(1, Arc::clone(&rejected)).is_err());
        assert_eq!(Arc::strong_count(&rejected), 1);
        assert_eq!(Arc::strong_count(&original), 2);
    }

    #[traced_test]
    #[test]
    fn lookup_before_any_add_warns() {
        let store: TaggedStore<i32> = TaggedStore::new(Namespace::Controls);
        assert_eq!(store.get(99), None);
        assert!(logs_contain("no control objects have been defined"));
    }

    #[traced_test]
    #[test]
    fn miss_after_init_is_silent() {
        let store = TaggedStore::new(Namespace::Filters);
        store.add(1, 1.0).unwrap();
        assert_eq!(store.get(2), None);
        assert!(!logs_contain("have been defined"));
    }

    #[test]
    fn clear_empties_but_stays_initialised() {
        let store = TaggedStore::new(Namespace::Controls);
        store.add(2, 'b').unwrap();
        store.add(1, 'a').unwrap();
        assert_eq!(store.tags(), vec![1, 2]);
        store.clear();
        assert!(store.is_empty());
        assert!(!store.contains(1));
        store.add(1, 'c').unwrap();
        assert_eq!(store.remove(1), Some('c'));
    }
}
