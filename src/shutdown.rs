//! Shutdown coordination.
//!
//! A [`Shutdown`] handle is a process-wide two-state machine: it starts
//! *running* and moves to *draining* exactly once, never back. The flag is
//! written by the first [`trigger`](Shutdown::trigger) and is read-only
//! from every request path afterwards, so an atomic is all the
//! synchronisation required. A request that slips past the flag at the
//! exact transition instant is served normally, which is acceptable.
//!
//! Handles are cheap clones of the same state. The server's accept loop
//! and every live connection suspend on [`draining`](Shutdown::draining);
//! the router polls [`is_draining`](Shutdown::is_draining) before
//! dispatching.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;
use tracing::info;

/// Cloneable handle to the process shutdown state.
#[derive(Debug, Clone)]
pub struct Shutdown {
    draining: Arc<AtomicBool>,
    notify: broadcast::Sender<()>,
}

impl Shutdown {
    /// A handle in the initial running state.
    pub fn new() -> Self {
        let (notify, _) = broadcast::channel(1);
        Self { draining: Arc::new(AtomicBool::new(false)), notify }
    }

    /// A handle that transitions to draining on the first SIGTERM or
    /// SIGINT the process receives.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_os_signals() -> Self {
        let shutdown = Self::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            wait_for_os_signal().await;
            trigger.trigger();
        });
        shutdown
    }

    /// Performs the single running → draining transition.
    ///
    /// Idempotent: every call after the first is a no-op.
    pub fn trigger(&self) {
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // No receivers is fine; the flag alone carries the state.
            let _ = self.notify.send(());
        }
    }

    /// Whether the process has begun draining.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Suspends until the draining transition has fired. Resolves
    /// immediately if it already has.
    pub async fn draining(&self) {
        if self.is_draining() {
            return;
        }
        let mut rx = self.notify.subscribe();
        // The transition may have fired between the check and the
        // subscription; the flag is authoritative.
        if self.is_draining() {
            return;
        }
        let _ = rx.recv().await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves on the first termination signal the process receives.
///
/// On Unix this listens for SIGTERM (sent by orchestrators and service
/// managers) and SIGINT (Ctrl-C). Elsewhere only Ctrl-C is available.
async fn wait_for_os_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("interrupt received, draining"),
        () = terminate => info!("termination signal received, draining"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn starts_running() {
        assert!(!Shutdown::new().is_draining());
    }

    #[test]
    fn trigger_moves_to_draining() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        assert!(shutdown.is_draining());
    }

    #[test]
    fn trigger_is_idempotent() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.trigger();
        shutdown.trigger();
        assert!(shutdown.is_draining());
    }

    #[test]
    fn clones_share_state() {
        let a = Shutdown::new();
        let b = a.clone();
        a.trigger();
        assert!(b.is_draining());
    }

    #[tokio::test]
    async fn draining_resolves_after_trigger() {
        let shutdown = Shutdown::new();
        let waiter = shutdown.clone();
        let handle = tokio::spawn(async move { waiter.draining().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.trigger();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("draining should resolve")
            .expect("waiter task should not panic");
    }

    #[tokio::test]
    async fn draining_resolves_immediately_when_already_draining() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        tokio::time::timeout(Duration::from_millis(10), shutdown.draining())
            .await
            .expect("draining should resolve immediately");
    }
}
