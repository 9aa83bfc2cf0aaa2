//! HTTP server: accept loop, connection tasks, and the drain sequence.
//!
//! # Shutdown sequence
//!
//! The first SIGTERM or SIGINT flips the process to draining. From that
//! instant:
//!
//! 1. The accept loop stops; no new connections are made.
//! 2. Every live connection is asked to finish its in-flight exchange and
//!    close (`graceful_shutdown`); idle keep-alive connections close
//!    immediately.
//! 3. A drain deadline starts (default 10 s, see
//!    [`Server::drain_timeout`]). All connections done before the
//!    deadline → [`Server::serve`] returns `Ok` and `main` exits 0.
//!    Deadline first → it returns [`Error::DrainTimedOut`] and `main`
//!    exits 1, abandoning whatever is still open. Losing hung work is
//!    the accepted price of a shutdown that always terminates.
//!
//! Orchestrators should allow a termination grace period longer than the
//! drain deadline plus the slowest expected request.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::router::Router;
use crate::shutdown::Shutdown;

const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
    drain_timeout: Duration,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { addr, drain_timeout: DEFAULT_DRAIN_TIMEOUT }
    }

    /// Overrides the bound on how long a drain may take before the server
    /// gives up on open connections.
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns after a full drain (`Ok`), or with
    /// [`Error::DrainTimedOut`] when the drain deadline expires first.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        Self::run(listener, router, Shutdown::with_os_signals(), self.drain_timeout).await
    }

    /// Drives an already-bound listener with an injected shutdown handle.
    ///
    /// This is the lower-level entry point behind [`serve`](Server::serve);
    /// it is public so embedders and tests can supply their own listener
    /// (e.g. port 0) and trigger the drain programmatically.
    pub async fn run(
        listener: TcpListener,
        router: Router,
        shutdown: Shutdown,
        drain_timeout: Duration,
    ) -> Result<(), Error> {
        // Arc so concurrent connection tasks share one route table.
        let router = Arc::new(router);

        info!(addr = %listener.local_addr()?, "listening");

        // JoinSet tracks every connection task so the drain below can wait
        // for all of them.
        let mut tasks = tokio::task::JoinSet::new();

        let drain = shutdown.draining();
        tokio::pin!(drain);

        loop {
            tokio::select! {
                // `biased` checks arms top-to-bottom: once draining fires,
                // no queued accept is taken.
                biased;

                () = &mut drain => {
                    info!(in_flight = tasks.len(), "draining, listener closed");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let shutdown = shutdown.clone();

                    tasks.spawn(async move {
                        // One call per request on the connection, not one
                        // per connection.
                        let svc = service_fn({
                            let router = Arc::clone(&router);
                            let shutdown = shutdown.clone();
                            move |req| {
                                let router = Arc::clone(&router);
                                let shutdown = shutdown.clone();
                                async move {
                                    let response = router.dispatch(&shutdown, req).await;
                                    Ok::<_, std::convert::Infallible>(response.into_inner())
                                }
                            }
                        });

                        // auto::Builder negotiates HTTP/1.1 or HTTP/2;
                        // TokioIo adapts the stream to hyper's IO traits.
                        let builder = ConnBuilder::new(TokioExecutor::new());
                        let conn = builder.serve_connection(TokioIo::new(stream), svc);
                        tokio::pin!(conn);

                        tokio::select! {
                            res = conn.as_mut() => {
                                if let Err(e) = res {
                                    error!(peer = %remote_addr, "connection error: {e}");
                                }
                            }
                            () = shutdown.draining() => {
                                // Let the in-flight exchange finish, then
                                // close; idle connections close at once.
                                conn.as_mut().graceful_shutdown();
                                if let Err(e) = conn.as_mut().await {
                                    debug!(peer = %remote_addr, "connection ended during drain: {e}");
                                }
                            }
                        }
                    });
                }

                // Reap finished tasks so the set stays bounded on
                // long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        // Stop accepting before waiting out the stragglers.
        drop(listener);

        let deadline = tokio::time::Instant::now() + drain_timeout;
        while !tasks.is_empty() {
            tokio::select! {
                _ = tasks.join_next() => {}
                () = tokio::time::sleep_until(deadline) => {
                    let in_flight = tasks.len();
                    warn!(in_flight, "drain deadline expired, forcing shutdown");
                    return Err(Error::DrainTimedOut { in_flight });
                }
            }
        }

        info!("stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "invalid socket address")]
    fn bind_rejects_malformed_address() {
        let _ = Server::bind("not-an-address");
    }
}
