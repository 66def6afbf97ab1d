//! kmirror core types: object identity, resource versions and diff events.

#![forbid(unsafe_code)]

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub mod filter;

pub use filter::{AcceptAll, All, Filter, Namespaces};

/// Identity of a tracked object. Cluster-scoped objects carry an empty namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into() }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

/// Logical clock parsed from `metadata.resourceVersion`.
///
/// Only used to order observations of the same object: a higher version is newer,
/// an equal version is a duplicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceVersion(u64);

impl ResourceVersion {
    pub fn new(v: u64) -> Self { Self(v) }
    pub fn get(self) -> u64 { self.0 }
}

impl FromStr for ResourceVersion {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

impl fmt::Display for ResourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Errors surfaced by the cache.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("not running")]
    NotRunning,
    #[error("{key}: missing resource version")]
    MissingVersion { key: ObjectKey },
    #[error("{key}: invalid resource version {version:?}")]
    InvalidVersion {
        key: ObjectKey,
        version: String,
        #[source]
        source: ParseIntError,
    },
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Capability the cache needs from a payload: where it lives and how new it is.
///
/// Every `kube::Resource` (typed `k8s_openapi` objects, `DynamicObject`, derived CRDs)
/// gets this for free.
pub trait Object: Clone + Send + Sync + 'static {
    fn key(&self) -> ObjectKey;

    /// Raw `metadata.resourceVersion`, if any.
    fn raw_version(&self) -> Option<&str>;

    fn parse_version(&self) -> CacheResult<ResourceVersion> {
        let raw = self
            .raw_version()
            .ok_or_else(|| CacheError::MissingVersion { key: self.key() })?;
        raw.parse().map_err(|source| CacheError::InvalidVersion {
            key: self.key(),
            version: raw.to_string(),
            source,
        })
    }
}

impl<K> Object for K
where
    K: kube::Resource + Clone + Send + Sync + 'static,
{
    fn key(&self) -> ObjectKey {
        let meta = self.meta();
        ObjectKey::new(
            meta.namespace.clone().unwrap_or_default(),
            meta.name.clone().unwrap_or_default(),
        )
    }

    fn raw_version(&self) -> Option<&str> {
        self.meta().resource_version.as_deref()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventType {
    Create,
    Update,
    Delete,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Create => "create",
            EventType::Update => "update",
            EventType::Delete => "delete",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single change to the cached view.
///
/// When handed to `Cache::update` only `EventType::Delete` is taken at face value;
/// any other type is re-derived from the cache's own state.
#[derive(Debug)]
pub struct Event<K> {
    kind: EventType,
    object: Arc<K>,
}

impl<K> Clone for Event<K> {
    fn clone(&self) -> Self {
        Self { kind: self.kind, object: Arc::clone(&self.object) }
    }
}

impl<K> Event<K> {
    pub fn new(kind: EventType, object: K) -> Self {
        Self::shared(kind, Arc::new(object))
    }

    pub fn shared(kind: EventType, object: Arc<K>) -> Self {
        Self { kind, object }
    }

    pub fn kind(&self) -> EventType { self.kind }
    pub fn object(&self) -> &Arc<K> { &self.object }
    pub fn into_object(self) -> Arc<K> { self.object }
}

pub mod prelude {
    pub use super::{
        AcceptAll, CacheError, CacheResult, Event, EventType, Filter, Object, ObjectKey,
        ResourceVersion,
    };
}
