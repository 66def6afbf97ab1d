//! Reconciliation of listings and single notifications against the store.
//!
//! Three entry points, all synchronous and only ever called from the cache worker:
//!
//! - initial sync: the first listing becomes the baseline, silently;
//! - list diff: every later listing is diffed against the store (Create/Update while
//!   scanning, Delete for whatever the listing no longer vouches for);
//! - update: a single notification is read as "current state of this object" and the
//!   effective event is derived from what the store already holds. Only deletions are
//!   taken at face value.

use std::sync::Arc;
use std::time::Instant;

use kmirror_core::{Event, EventType, Filter, Object, ObjectKey, ResourceVersion};
use metrics::{counter, histogram};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, debug_span, warn};

use crate::store::{Entry, Store};

pub(crate) struct Reconciler<K> {
    filter: Box<dyn Filter<K>>,
}

impl<K: Object> Reconciler<K> {
    pub(crate) fn new(filter: impl Filter<K> + 'static) -> Self {
        Self { filter: Box::new(filter) }
    }

    pub(crate) fn sync(&self, store: &mut Store<K>, list: Vec<K>) -> Vec<Event<K>> {
        let started = Instant::now();
        let initial = !store.is_initialized();
        let _span = debug_span!("sync", items = list.len(), initial).entered();
        let events = if initial {
            self.initial_sync(store, list);
            Vec::new()
        } else {
            self.process_list(store, list)
        };
        histogram!("kmirror_sync_ms", started.elapsed().as_secs_f64() * 1000.0);
        debug!(events = events.len(), cached = store.len(), "sync done");
        events
    }

    fn initial_sync(&self, store: &mut Store<K>, list: Vec<K>) {
        let mut items: FxHashMap<ObjectKey, Entry<K>> =
            FxHashMap::with_capacity_and_hasher(list.len(), Default::default());
        for obj in list {
            let Some((key, entry)) = admit(Arc::new(obj)) else { continue };
            if !self.filter.accept(&entry.object) {
                continue;
            }
            // Duplicate keys in one listing: keep the newest.
            match items.get(&key) {
                Some(current) if current.version >= entry.version => {
                    stale(&key, current.version, entry.version);
                }
                _ => {
                    items.insert(key, entry);
                }
            }
        }
        store.initialize(items);
    }

    fn process_list(&self, store: &mut Store<K>, list: Vec<K>) -> Vec<Event<K>> {
        let mut events = Vec::new();
        let mut seen: FxHashSet<ObjectKey> = FxHashSet::default();

        for obj in list {
            let Some((key, entry)) = admit(Arc::new(obj)) else { continue };
            let accept = self.filter.accept(&entry.object);

            match store.version_of(&key) {
                None if accept => {
                    emit(&mut events, Event::shared(EventType::Create, Arc::clone(&entry.object)));
                    store.insert(key.clone(), entry);
                }
                Some(current) if accept && current < entry.version => {
                    emit(&mut events, Event::shared(EventType::Update, Arc::clone(&entry.object)));
                    store.insert(key.clone(), entry);
                }
                Some(current) if current >= entry.version => {
                    // Unchanged or older: keep what we have, it is still listed.
                    stale(&key, current, entry.version);
                }
                // Not admitted. If we held it, it falls out with the trailing deletes.
                _ => continue,
            }
            seen.insert(key);
        }

        let mut gone: Vec<ObjectKey> = store.keys().filter(|k| !seen.contains(*k)).cloned().collect();
        gone.sort_unstable();
        for key in gone {
            if let Some(entry) = store.remove(&key) {
                emit(&mut events, Event::shared(EventType::Delete, entry.object));
            }
        }
        events
    }

    pub(crate) fn update(&self, store: &mut Store<K>, event: Event<K>) -> Vec<Event<K>> {
        let _span = debug_span!("update", kind = %event.kind()).entered();
        let mut events = Vec::with_capacity(1);
        let Some((key, entry)) = admit(Arc::clone(event.object())) else { return events };

        if event.kind() == EventType::Delete {
            if store.remove(&key).is_some() {
                emit(&mut events, event);
            }
            return events;
        }

        let accept = self.filter.accept(&entry.object);
        match store.version_of(&key) {
            None if accept => {
                emit(&mut events, Event::shared(EventType::Create, Arc::clone(&entry.object)));
                store.insert(key, entry);
            }
            Some(current) if current < entry.version => {
                if accept {
                    emit(&mut events, Event::shared(EventType::Update, Arc::clone(&entry.object)));
                    store.insert(key, entry);
                } else {
                    store.remove(&key);
                    emit(&mut events, Event::shared(EventType::Delete, entry.object));
                }
            }
            Some(current) => stale(&key, current, entry.version),
            None => {}
        }
        events
    }
}

fn admit<K: Object>(object: Arc<K>) -> Option<(ObjectKey, Entry<K>)> {
    match Entry::build(object) {
        Ok(built) => Some(built),
        Err(e) => {
            counter!("kmirror_parse_errors_total", 1u64);
            warn!(error = %e, "skipping object");
            None
        }
    }
}

fn emit<K>(events: &mut Vec<Event<K>>, event: Event<K>) {
    counter!("kmirror_events_total", 1u64, "type" => event.kind().as_str());
    events.push(event);
}

fn stale(key: &ObjectKey, current: ResourceVersion, offered: ResourceVersion) {
    counter!("kmirror_stale_total", 1u64);
    debug!(key = %key, %current, %offered, "skipping stale version");
}
