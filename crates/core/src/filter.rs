//! Admission filters deciding which objects belong in the cached view.

use std::collections::BTreeSet;

use crate::Object;

/// Admission predicate. Expected to be pure: the cache may call it once per object
/// per reconciliation pass and relies on getting the same answer for the same input.
pub trait Filter<K>: Send + Sync {
    fn accept(&self, obj: &K) -> bool;
}

impl<K, F> Filter<K> for F
where
    F: Fn(&K) -> bool + Send + Sync,
{
    fn accept(&self, obj: &K) -> bool {
        self(obj)
    }
}

/// Admits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl<K> Filter<K> for AcceptAll {
    fn accept(&self, _obj: &K) -> bool {
        true
    }
}

/// Admits objects whose namespace is in the set. Cluster-scoped objects match `""`.
#[derive(Debug, Clone, Default)]
pub struct Namespaces {
    allowed: BTreeSet<String>,
}

impl Namespaces {
    pub fn new<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { allowed: namespaces.into_iter().map(Into::into).collect() }
    }
}

impl<K: Object> Filter<K> for Namespaces {
    fn accept(&self, obj: &K) -> bool {
        self.allowed.contains(&obj.key().namespace)
    }
}

/// Conjunction: admits only when every inner filter admits. Empty admits everything.
pub struct All<K> {
    filters: Vec<Box<dyn Filter<K>>>,
}

impl<K> Default for All<K> {
    fn default() -> Self {
        Self { filters: Vec::new() }
    }
}

impl<K> All<K> {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, filter: impl Filter<K> + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }
}

impl<K> Filter<K> for All<K> {
    fn accept(&self, obj: &K) -> bool {
        self.filters.iter().all(|f| f.accept(obj))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn cm(ns: &str, name: &str) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                namespace: Some(ns.to_string()),
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn closures_are_filters() {
        let f = |o: &ConfigMap| o.metadata.name.as_deref() == Some("keep");
        assert!(f.accept(&cm("ns", "keep")));
        assert!(!f.accept(&cm("ns", "drop")));
    }

    #[test]
    fn namespaces_allow_list() {
        let f = Namespaces::new(["prod", "staging"]);
        assert!(Filter::<ConfigMap>::accept(&f, &cm("prod", "a")));
        assert!(!Filter::<ConfigMap>::accept(&f, &cm("dev", "a")));
    }

    #[test]
    fn all_requires_every_filter() {
        let empty: All<ConfigMap> = All::new();
        assert!(empty.accept(&cm("dev", "a")));

        let f: All<ConfigMap> = All::new()
            .with(Namespaces::new(["prod"]))
            .with(|o: &ConfigMap| o.metadata.name.as_deref() != Some("secret"));
        assert!(f.accept(&cm("prod", "a")));
        assert!(!f.accept(&cm("prod", "secret")));
        assert!(!f.accept(&cm("dev", "a")));
        assert!(Filter::<ConfigMap>::accept(&AcceptAll, &cm("dev", "a")));
    }
}
