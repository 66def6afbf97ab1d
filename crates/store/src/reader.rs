use std::sync::Arc;

use kmirror_core::{CacheResult, Object};

use crate::cache::Cache;

/// Read-only view of a cache, for consumers that must not feed it.
#[async_trait::async_trait]
pub trait CacheReader<K: Object>: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> CacheResult<Option<Arc<K>>>;

    async fn list(&self) -> CacheResult<Vec<Arc<K>>>;

    async fn get_object(&self, obj: &K) -> CacheResult<Option<Arc<K>>> {
        let key = obj.key();
        self.get(&key.namespace, &key.name).await
    }
}

#[async_trait::async_trait]
impl<K: Object> CacheReader<K> for Cache<K> {
    async fn get(&self, namespace: &str, name: &str) -> CacheResult<Option<Arc<K>>> {
        Cache::get(self, namespace, name).await
    }

    async fn list(&self) -> CacheResult<Vec<Arc<K>>> {
        Cache::list(self).await
    }
}
