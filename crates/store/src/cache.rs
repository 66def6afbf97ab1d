//! Single-writer cache actor.
//!
//! One spawned worker owns the [`Store`] and is the only code that ever touches it.
//! Every public call sends a request carrying a oneshot reply slot onto the queue of
//! its operation kind, then waits for the reply. Both the send and the wait are
//! preempted by shutdown, so no caller can hang once the worker is gone.
//!
//! Requests are served in arrival order per kind; across kinds the worker picks
//! whichever queue is ready, with no fairness guarantee.

use std::future::Future;
use std::sync::Arc;

use kmirror_core::{CacheError, CacheResult, Event, Filter, Object, ObjectKey};
use metrics::gauge;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, trace_span, Instrument};

use crate::config::CacheConfig;
use crate::lifecycle::Lifecycle;
use crate::reconcile::Reconciler;
use crate::store::Store;

struct SyncRequest<K> {
    list: Vec<K>,
    reply: oneshot::Sender<Vec<Event<K>>>,
}

struct UpdateRequest<K> {
    event: Event<K>,
    reply: oneshot::Sender<Vec<Event<K>>>,
}

struct GetRequest<K> {
    key: ObjectKey,
    reply: oneshot::Sender<Option<Arc<K>>>,
}

type ListRequest<K> = oneshot::Sender<Vec<Arc<K>>>;

/// Handle to a running cache. Cheap to clone; all clones talk to the same worker.
pub struct Cache<K> {
    sync_tx: mpsc::Sender<SyncRequest<K>>,
    update_tx: mpsc::Sender<UpdateRequest<K>>,
    get_tx: mpsc::Sender<GetRequest<K>>,
    list_tx: mpsc::Sender<ListRequest<K>>,
    lifecycle: Lifecycle,
}

impl<K> Clone for Cache<K> {
    fn clone(&self) -> Self {
        Self {
            sync_tx: self.sync_tx.clone(),
            update_tx: self.update_tx.clone(),
            get_tx: self.get_tx.clone(),
            list_tx: self.list_tx.clone(),
            lifecycle: self.lifecycle.clone(),
        }
    }
}

impl<K: Object> Cache<K> {
    /// Spawn the worker on the current tokio runtime.
    ///
    /// The worker shuts down when `cancel` is cancelled, when `stop` resolves, or when
    /// every handle has been dropped.
    pub fn spawn<F, S>(config: &CacheConfig, filter: F, cancel: &CancellationToken, stop: S) -> Self
    where
        F: Filter<K> + 'static,
        S: Future<Output = ()> + Send + 'static,
    {
        let cap = config.effective_queue_cap();
        let (sync_tx, sync_rx) = mpsc::channel(cap);
        let (update_tx, update_rx) = mpsc::channel(cap);
        let (get_tx, get_rx) = mpsc::channel(cap);
        let (list_tx, list_rx) = mpsc::channel(cap);

        let lifecycle = Lifecycle::with_parent(cancel);
        lifecycle.watch_signal(stop);

        let worker = Worker {
            store: Store::new(),
            reconciler: Reconciler::new(filter),
            sync_rx,
            update_rx,
            get_rx,
            list_rx,
            lifecycle: lifecycle.clone(),
        };
        tokio::spawn(worker.run().instrument(info_span!("cache", name = %config.name)));

        Self { sync_tx, update_tx, get_tx, list_tx, lifecycle }
    }

    /// Reconcile a full listing. The first call after spawn establishes the baseline
    /// and returns no events.
    ///
    /// `None` means the request lost the race against shutdown.
    pub async fn sync(&self, list: Vec<K>) -> Option<Vec<Event<K>>> {
        let span = trace_span!("sync", items = list.len());
        let (reply, rx) = oneshot::channel();
        call(&self.lifecycle, &self.sync_tx, SyncRequest { list, reply }, rx)
            .instrument(span)
            .await
    }

    /// Apply one change notification; yields at most one event.
    ///
    /// `None` means the request lost the race against shutdown.
    pub async fn update(&self, event: Event<K>) -> Option<Vec<Event<K>>> {
        let span = trace_span!("update", kind = %event.kind());
        let (reply, rx) = oneshot::channel();
        call(&self.lifecycle, &self.update_tx, UpdateRequest { event, reply }, rx)
            .instrument(span)
            .await
    }

    pub async fn get(&self, namespace: &str, name: &str) -> CacheResult<Option<Arc<K>>> {
        let key = ObjectKey::new(namespace, name);
        let span = trace_span!("get", key = %key);
        let (reply, rx) = oneshot::channel();
        call(&self.lifecycle, &self.get_tx, GetRequest { key, reply }, rx)
            .instrument(span)
            .await
            .ok_or(CacheError::NotRunning)
    }

    pub async fn get_object(&self, obj: &K) -> CacheResult<Option<Arc<K>>> {
        let key = obj.key();
        self.get(&key.namespace, &key.name).await
    }

    pub async fn list(&self) -> CacheResult<Vec<Arc<K>>> {
        let (reply, rx) = oneshot::channel();
        call(&self.lifecycle, &self.list_tx, reply, rx)
            .instrument(trace_span!("list"))
            .await
            .ok_or(CacheError::NotRunning)
    }

    /// False once shutdown has been requested by any source.
    pub fn is_running(&self) -> bool {
        !self.lifecycle.is_shutting_down()
    }

    /// Resolves after the worker loop has exited.
    pub async fn done(&self) {
        self.lifecycle.done().await
    }
}

async fn call<Req, Resp>(
    lifecycle: &Lifecycle,
    queue: &mpsc::Sender<Req>,
    request: Req,
    reply: oneshot::Receiver<Resp>,
) -> Option<Resp> {
    tokio::select! {
        biased;
        _ = lifecycle.shutting_down() => return None,
        sent = queue.send(request) => {
            if sent.is_err() {
                return None;
            }
        }
    }
    // Accepted requests are always answered; a dropped slot means the worker exited
    // with the request still queued.
    reply.await.ok()
}

struct Worker<K> {
    store: Store<K>,
    reconciler: Reconciler<K>,
    sync_rx: mpsc::Receiver<SyncRequest<K>>,
    update_rx: mpsc::Receiver<UpdateRequest<K>>,
    get_rx: mpsc::Receiver<GetRequest<K>>,
    list_rx: mpsc::Receiver<ListRequest<K>>,
    lifecycle: Lifecycle,
}

impl<K: Object> Worker<K> {
    async fn run(self) {
        let Worker { mut store, reconciler, mut sync_rx, mut update_rx, mut get_rx, mut list_rx, lifecycle } = self;
        debug!("cache worker started");
        loop {
            if lifecycle.is_shutting_down() {
                debug!("shutdown requested");
                break;
            }
            tokio::select! {
                _ = lifecycle.shutting_down() => {
                    debug!("shutdown requested");
                    break;
                }
                req = sync_rx.recv() => {
                    let Some(req) = req else { break };
                    let events = reconciler.sync(&mut store, req.list);
                    gauge!("kmirror_cache_items", store.len() as f64);
                    let _ = req.reply.send(events);
                }
                req = update_rx.recv() => {
                    let Some(req) = req else { break };
                    let events = reconciler.update(&mut store, req.event);
                    gauge!("kmirror_cache_items", store.len() as f64);
                    let _ = req.reply.send(events);
                }
                req = get_rx.recv() => {
                    let Some(req) = req else { break };
                    let found = store.get(&req.key).map(|e| Arc::clone(&e.object));
                    let _ = req.reply.send(found);
                }
                req = list_rx.recv() => {
                    let Some(reply) = req else { break };
                    let _ = reply.send(store.objects());
                }
            }
        }
        // Covers the all-handles-dropped exit too, and releases signal watchers.
        lifecycle.shutdown();
        lifecycle.shutdown_completed();
        info!(items = store.len(), "cache worker stopped");
    }
}
