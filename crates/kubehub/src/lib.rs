//! kmirror kubehub: wiring between kube-rs watchers and the cache.
//!
//! The pump does not open connections itself; build the stream with
//! `kube::runtime::watcher::watcher(api, config)` (or anything shaped like it) and hand
//! it over together with the cache and a sink for the resulting events.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{Context, Result};
use futures::{Stream, TryStreamExt};
use kmirror_core::{Event, EventType, Filter, Object};
use kmirror_store::Cache;
use kube::runtime::watcher;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Drive a watcher stream into `cache`, forwarding every resulting event to `tx`.
///
/// - `Restarted(list)` is a full listing and goes through `sync`; the first one is the
///   silent baseline.
/// - `Applied(obj)` goes through `update`; the cache decides between Create and Update.
/// - `Deleted(obj)` goes through `update` as a deletion.
///
/// Returns `Ok(())` when the stream ends, the cache stops, or `tx` is closed. A stream
/// error is returned as-is; retrying is up to the caller.
pub async fn pump<K, S, E>(cache: &Cache<K>, stream: S, tx: mpsc::Sender<Event<K>>) -> Result<()>
where
    K: Object,
    S: Stream<Item = Result<watcher::Event<K>, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    futures::pin_mut!(stream);
    info!("watch pump started");
    while let Some(ev) = stream.try_next().await.context("watch stream failed")? {
        let events = match ev {
            watcher::Event::Applied(o) => cache.update(Event::new(EventType::Update, o)).await,
            watcher::Event::Deleted(o) => cache.update(Event::new(EventType::Delete, o)).await,
            watcher::Event::Restarted(list) => {
                debug!(count = list.len(), "watch restart");
                cache.sync(list).await
            }
        };
        let Some(events) = events else {
            debug!("cache stopped; ending watch pump");
            return Ok(());
        };
        for e in events {
            if tx.send(e).await.is_err() {
                debug!("event receiver dropped; ending watch pump");
                return Ok(());
            }
        }
    }
    warn!("watcher stream ended");
    Ok(())
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid label selector term {0:?} (expect key=value)")]
pub struct SelectorParseError(pub String);

/// Equality-based label selector: admits objects carrying every listed label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    required: BTreeMap<String, String>,
}

impl LabelSelector {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.required.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool { self.required.is_empty() }

    pub fn matches(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        self.required
            .iter()
            .all(|(k, v)| labels.and_then(|l| l.get(k)) == Some(v))
    }
}

impl FromStr for LabelSelector {
    type Err = SelectorParseError;

    /// Parses `"app=web,tier=frontend"`; whitespace around terms is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut sel = LabelSelector::new();
        for term in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match term.split_once('=') {
                Some((k, v)) if !k.trim().is_empty() => {
                    sel.required.insert(k.trim().to_string(), v.trim().to_string());
                }
                _ => return Err(SelectorParseError(term.to_string())),
            }
        }
        Ok(sel)
    }
}

impl<K> Filter<K> for LabelSelector
where
    K: kube::Resource + Send + Sync,
{
    fn accept(&self, obj: &K) -> bool {
        self.matches(obj.meta().labels.as_ref())
    }
}
