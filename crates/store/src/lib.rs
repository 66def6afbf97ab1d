//! kmirror store: versioned in-memory object cache.
//!
//! Feed it full listings with [`Cache::sync`] and watch notifications with
//! [`Cache::update`]; it answers with normalized Create/Update/Delete events and keeps
//! an authoritative view for [`Cache::get`] and [`Cache::list`].
//!
//! ```rust,ignore
//! let cancel = CancellationToken::new();
//! let cache: Cache<ConfigMap> = Cache::spawn(&CacheConfig::from_env(), AcceptAll, &cancel, std::future::pending());
//! cache.sync(initial_list).await;               // baseline, no events
//! for evt in cache.update(notification).await.unwrap_or_default() {
//!     queue.push(evt);
//! }
//! ```

#![forbid(unsafe_code)]

mod cache;
mod config;
pub mod lifecycle;
mod reader;
mod reconcile;
mod store;

pub use cache::Cache;
pub use config::{CacheConfig, DEFAULT_QUEUE_CAP};
pub use lifecycle::Lifecycle;
pub use reader::CacheReader;
