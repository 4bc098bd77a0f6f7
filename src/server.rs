//! HTTP transport and graceful shutdown.
//!
//! The dispatch tree is synchronous; each request is handed to tokio's
//! blocking pool so slow handlers never stall the accept loop.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or **Ctrl-C** the server:
//! 1. stops accepting new connections,
//! 2. lets every in-flight connection task run to completion,
//! 3. returns from [`Server::serve`].

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderValue, StatusCode, header};
use http_body_util::{BodyExt, Full};
use hyper::ext::ReasonPhrase;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::error::Error;
use crate::mount::Mount;
use crate::request::Request;
use crate::status::Status;

/// The HTTP server.
pub struct Server {
    addr: String,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called. The address is validated there.
    ///
    /// ```rust,no_run
    /// use baton::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    /// Serves `mount` until SIGTERM or Ctrl-C, then drains in-flight
    /// connections.
    pub async fn serve(self, mount: Mount) -> Result<(), Error> {
        self.serve_with_shutdown(mount, shutdown_signal()).await
    }

    /// Like [`serve`](Self::serve), stopping when `signal` resolves.
    pub async fn serve_with_shutdown(
        self,
        mount: Mount,
        signal: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let addr: SocketAddr = self.addr.parse().map_err(|_| Error::InvalidAddress(self.addr.clone()))?;
        let listener = TcpListener::bind(addr).await?;
        serve_listener(listener, mount, signal).await
    }
}

/// Serves `mount` on an already bound listener.
pub async fn serve_listener(
    listener: TcpListener,
    mount: Mount,
    signal: impl Future<Output = ()>,
) -> Result<(), Error> {
    let mount = Arc::new(mount);
    info!(addr = %listener.local_addr()?, entry = mount.trigger(), "baton listening");

    let mut tasks = tokio::task::JoinSet::new();
    tokio::pin!(signal);

    loop {
        tokio::select! {
            // Shutdown wins over queued connections.
            biased;

            () = &mut signal => {
                info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                break;
            }

            res = listener.accept() => {
                let (stream, peer) = match res {
                    Ok(v) => v,
                    Err(e) => {
                        error!("accept error: {e}");
                        continue;
                    }
                };

                let mount = Arc::clone(&mount);
                let io = TokioIo::new(stream);

                tasks.spawn(async move {
                    let svc = service_fn(move |req| handle(Arc::clone(&mount), req));
                    if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                        .serve_connection(io, svc)
                        .await
                    {
                        error!(%peer, "connection error: {e}");
                    }
                });
            }

            // Reap finished connection tasks.
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    }

    while tasks.join_next().await.is_some() {}

    info!("baton stopped");
    Ok(())
}

// ── Request handling ──────────────────────────────────────────────────────────

/// One hyper request through the mount tree. Never fails towards hyper.
async fn handle(
    mount: Arc<Mount>,
    req: hyper::Request<hyper::body::Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("failed to read request body: {e}");
            return Ok(bare(StatusCode::BAD_REQUEST));
        }
    };

    let uri = parts.uri.path_and_query().map_or_else(|| parts.uri.path().to_owned(), |pq| pq.as_str().to_owned());
    let mut builder = Request::builder()
        .method(parts.method.as_str())
        .uri(uri)
        .body(body.to_vec());
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            builder = builder.header(name.as_str(), value);
        }
    }
    let request = builder.build();
    debug!(method = %request.method(), path = request.path(), "dispatching");

    let response = match tokio::task::spawn_blocking(move || mount.run(&request)).await {
        Ok(response) => response,
        Err(e) => {
            error!("dispatch task failed: {e}");
            return Ok(bare(StatusCode::INTERNAL_SERVER_ERROR));
        }
    };

    let status = StatusCode::from_u16(response.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let content_type = HeaderValue::from_static(response.content_type());
    let mut out = http::Response::new(Full::new(Bytes::from(response.into_body())));
    *out.status_mut() = status;
    out.headers_mut().insert(header::CONTENT_TYPE, content_type);
    if let Some(reason) = reason_phrase(status.as_u16()) {
        out.extensions_mut().insert(reason);
    }
    Ok(out)
}

/// Reason phrase from our own status table. HTTP/1 only; unknown codes
/// keep hyper's canonical phrase.
fn reason_phrase(code: u16) -> Option<ReasonPhrase> {
    let reason = Status::from_code(code)?.reason();
    ReasonPhrase::try_from(reason.as_bytes()).ok()
}

fn bare(status: StatusCode) -> http::Response<Full<Bytes>> {
    let mut out = http::Response::new(Full::new(Bytes::new()));
    *out.status_mut() = status;
    out
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on SIGTERM (Unix) or Ctrl-C. A handler that cannot be installed
/// is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
