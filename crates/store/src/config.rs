use serde::{Deserialize, Serialize};

pub const DEFAULT_QUEUE_CAP: usize = 16;

/// Runtime knobs for a cache instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Component name recorded on the worker span.
    pub name: String,
    /// Capacity of each request queue (sync, update, get, list). Raised to 1 if zero.
    pub queue_cap: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { name: "cache".to_string(), queue_cap: DEFAULT_QUEUE_CAP }
    }
}

impl CacheConfig {
    /// Defaults overridden by `KMIRROR_CACHE_NAME` and `KMIRROR_QUEUE_CAP`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let name = std::env::var("KMIRROR_CACHE_NAME").ok().filter(|s| !s.is_empty()).unwrap_or(defaults.name);
        let queue_cap = std::env::var("KMIRROR_QUEUE_CAP").ok().and_then(|s| s.parse::<usize>().ok()).unwrap_or(defaults.queue_cap);
        Self { name, queue_cap }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_queue_cap(mut self, cap: usize) -> Self {
        self.queue_cap = cap;
        self
    }

    pub(crate) fn effective_queue_cap(&self) -> usize {
        self.queue_cap.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_raised() {
        assert_eq!(CacheConfig::default().with_queue_cap(0).effective_queue_cap(), 1);
        assert_eq!(CacheConfig::default().effective_queue_cap(), DEFAULT_QUEUE_CAP);
    }

    #[test]
    fn deserializes_partial_config() {
        let cfg: CacheConfig = serde_json::from_value(serde_json::json!({ "queue_cap": 4 })).unwrap();
        assert_eq!(cfg.queue_cap, 4);
        assert_eq!(cfg.name, "cache");
    }
}
