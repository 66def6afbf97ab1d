//! Versioned object map owned by the cache worker.

use std::sync::Arc;

use kmirror_core::{CacheResult, Object, ObjectKey, ResourceVersion};
use rustc_hash::FxHashMap;

pub(crate) struct Entry<K> {
    pub(crate) version: ResourceVersion,
    pub(crate) object: Arc<K>,
}

impl<K: Object> Entry<K> {
    /// Key and parse the version of an incoming object.
    pub(crate) fn build(object: Arc<K>) -> CacheResult<(ObjectKey, Self)> {
        let version = object.parse_version()?;
        Ok((object.key(), Self { version, object }))
    }
}

/// Key -> latest admitted entry.
///
/// Starts uninitialized; the first sync installs the baseline and flips it exactly once.
pub(crate) struct Store<K> {
    items: FxHashMap<ObjectKey, Entry<K>>,
    initialized: bool,
}

impl<K> Default for Store<K> {
    fn default() -> Self {
        Self { items: FxHashMap::default(), initialized: false }
    }
}

impl<K> Store<K> {
    pub(crate) fn new() -> Self { Self::default() }

    pub(crate) fn is_initialized(&self) -> bool { self.initialized }

    pub(crate) fn len(&self) -> usize { self.items.len() }

    /// Replace all contents with a baseline and mark the store initialized.
    pub(crate) fn initialize(&mut self, items: FxHashMap<ObjectKey, Entry<K>>) {
        self.items = items;
        self.initialized = true;
    }

    pub(crate) fn get(&self, key: &ObjectKey) -> Option<&Entry<K>> {
        self.items.get(key)
    }

    pub(crate) fn version_of(&self, key: &ObjectKey) -> Option<ResourceVersion> {
        self.items.get(key).map(|e| e.version)
    }

    pub(crate) fn insert(&mut self, key: ObjectKey, entry: Entry<K>) {
        self.items.insert(key, entry);
    }

    pub(crate) fn remove(&mut self, key: &ObjectKey) -> Option<Entry<K>> {
        self.items.remove(key)
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &ObjectKey> {
        self.items.keys()
    }

    /// Fresh snapshot of the current objects; empty until the first listing lands.
    pub(crate) fn objects(&self) -> Vec<Arc<K>> {
        if !self.initialized {
            return Vec::new();
        }
        self.items.values().map(|e| Arc::clone(&e.object)).collect()
    }
}
