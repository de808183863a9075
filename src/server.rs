//! HTTP server and graceful shutdown.
//!
//! # Shutdown
//!
//! On SIGTERM or Ctrl-C the server:
//! 1. Stops calling `listener.accept()`, so no new connections come in.
//! 2. Lets every in-flight connection run to completion.
//! 3. Waits for the terminal middleware hooks of every request it answered.
//! 4. Returns from [`Server::serve`].
//!
//! Step 3 is what makes the last access records before a SIGTERM reach disk.
//!
//! # Terminal hooks
//!
//! Terminal hooks (access logging and the like) never hold up a response.
//! Each request's [`Completion`](crate::middleware::Completion) runs on
//! tokio's blocking pool after the response has been produced, so a slow
//! `FileSink` write costs a pool thread, not client latency. A hook that
//! fails is reported through `tracing::error!`.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// The HTTP server.
pub struct Server {
    addr: SocketAddr,
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
        Self { addr }
    }

    /// Serves until SIGTERM or Ctrl-C, then drains.
    ///
    /// Returns only after every in-flight request has been answered and its
    /// terminal hooks have run.
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but stops when `shutdown` resolves
    /// instead of on a signal.
    pub async fn serve_with_shutdown(
        self,
        router: Router,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let listener = TcpListener::bind(self.addr).await?;
        run(listener, router, shutdown).await
    }
}

async fn run(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()>,
) -> Result<(), Error> {
    let local_addr = listener.local_addr()?;

    // One routing table shared by every connection task.
    let router = Arc::new(router);

    info!(addr = %local_addr, "listening");

    // Connection tasks and terminal-hook tasks are tracked separately: the
    // first set is reaped as connections close, the second only has to be
    // waited on once, at shutdown.
    let mut tasks = tokio::task::JoinSet::new();
    let completions = TaskTracker::new();

    // `select!` polls `shutdown` by reference on every turn of the loop, so
    // it has to stay put in memory. `tokio::pin!` pins it on the stack.
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Arms are checked top to bottom. Shutdown comes first so a
            // signal stops accepting at once, even with connections queued.
            biased;

            () = &mut shutdown => {
                info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
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
                let completions = completions.clone();
                // Adapts tokio's AsyncRead/AsyncWrite to hyper's IO traits.
                let io = TokioIo::new(stream);

                tasks.spawn(async move {
                    // Called once per request on this connection, not once
                    // per connection; keep-alive clients reuse it.
                    let svc = service_fn(move |req| {
                        let router = Arc::clone(&router);
                        let completions = completions.clone();
                        async move { dispatch(router, completions, req, remote_addr).await }
                    });

                    // `auto::Builder` speaks HTTP/1.1 or HTTP/2, whichever
                    // the client opens with.
                    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                        .serve_connection(io, svc)
                        .await
                    {
                        error!(peer = %remote_addr, "connection error: {e}");
                    }
                });
            }

            // Reap finished connections so the set stays bounded on a
            // long-running server.
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    while tasks.join_next().await.is_some() {}

    // Every request has been answered, so no new completion can be spawned.
    completions.close();
    if !completions.is_empty() {
        debug!(pending = completions.len(), "waiting for terminal hooks");
    }
    completions.wait().await;

    info!("stopped");
    Ok(())
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Buffers the body, runs the router, and schedules the terminal hooks.
///
/// The error type is `Infallible`: every failure becomes a response, so hyper
/// never sees an error.
async fn dispatch(
    router: Arc<Router>,
    completions: TaskTracker,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!(peer = %remote_addr, "failed to read request body: {e}");
            return Ok(Response::status(StatusCode::BAD_REQUEST).into_inner());
        }
    };

    let (response, completion) = router.dispatch(Request::new(parts, body, remote_addr)).await;

    // Empty when no middleware wants its terminal hook for this request,
    // e.g. an access log that is switched off or ignores the URI.
    if !completion.is_empty() {
        completions.spawn_blocking(move || {
            if let Err(e) = completion.run() {
                error!(peer = %remote_addr, "request completion failed: {e}");
            }
        });
    }

    Ok(response.into_inner())
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on SIGTERM (Unix) or Ctrl-C, whichever comes first.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    // Never resolves: there is no SIGTERM to wait for off Unix.
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
