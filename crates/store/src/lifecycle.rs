//! Shutdown coordination for the cache worker.
//!
//! Any number of sources can request shutdown: a parent `CancellationToken` (linked
//! as a child token), arbitrary stop futures, or a direct `shutdown()` call. The worker
//! acknowledges with `shutdown_completed()` once its loop has exited.

use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Lifecycle {
    shutdown: CancellationToken,
    completed: CancellationToken,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self { shutdown: CancellationToken::new(), completed: CancellationToken::new() }
    }

    /// Lifecycle that shuts down when `parent` is cancelled. Cancelling this lifecycle
    /// does not cancel the parent.
    pub fn with_parent(parent: &CancellationToken) -> Self {
        Self { shutdown: parent.child_token(), completed: CancellationToken::new() }
    }

    /// Request shutdown when `signal` resolves. Must be called inside a tokio runtime.
    pub fn watch_signal<S>(&self, signal: S)
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = signal => {
                    debug!("stop signal received");
                    shutdown.cancel();
                }
                _ = shutdown.cancelled() => {}
            }
        });
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Resolves once shutdown has been requested by any source.
    pub async fn shutting_down(&self) {
        self.shutdown.cancelled().await
    }

    pub fn shutdown_completed(&self) {
        self.completed.cancel();
    }

    /// Resolves once the owner acknowledged shutdown.
    pub async fn done(&self) {
        self.completed.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn parent_token_requests_shutdown() {
        let parent = CancellationToken::new();
        let lc = Lifecycle::with_parent(&parent);
        assert!(!lc.is_shutting_down());
        parent.cancel();
        tokio::time::timeout(Duration::from_secs(1), lc.shutting_down()).await.expect("shutdown not observed");
        assert!(lc.is_shutting_down());
    }

    #[tokio::test]
    async fn own_shutdown_does_not_cancel_parent() {
        let parent = CancellationToken::new();
        let lc = Lifecycle::with_parent(&parent);
        lc.shutdown();
        assert!(lc.is_shutting_down());
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn stop_signal_requests_shutdown() {
        let lc = Lifecycle::new();
        let (tx, rx) = oneshot::channel::<()>();
        lc.watch_signal(async move {
            let _ = rx.await;
        });
        tokio::task::yield_now().await;
        assert!(!lc.is_shutting_down());
        let _ = tx.send(());
        tokio::time::timeout(Duration::from_secs(1), lc.shutting_down()).await.expect("shutdown not observed");
    }

    #[tokio::test]
    async fn done_waits_for_acknowledgement() {
        let lc = Lifecycle::new();
        lc.shutdown();
        assert!(tokio::time::timeout(Duration::from_millis(20), lc.done()).await.is_err());
        lc.shutdown_completed();
        tokio::time::timeout(Duration::from_secs(1), lc.done()).await.expect("done not observed");
    }
}
