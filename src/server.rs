//! HTTP server and graceful shutdown.
//!
//! # Graceful shutdown
//!
//! On **SIGTERM** or Ctrl-C the server:
//! 1. Stops calling `listener.accept()`, so no new connections are made.
//! 2. Lets every in-flight connection task run to completion.
//! 3. Returns from [`Server::serve`], which lets `main` exit cleanly.
//!
//! Under Kubernetes, set `terminationGracePeriodSeconds` longer than the
//! slowest route (or than `routes.handler_timeout_ms` when it is set).

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body::Body;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::Error;
use crate::response::{Response, ResponseBody};
use crate::router::Router;

/// The HTTP server.
#[derive(Clone, Debug)]
pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// A server on `addr` with the default body limit.
    ///
    /// ```rust,no_run
    /// use ferry::Server;
    /// let server = Server::bind(([127, 0, 0, 1], 3000).into());
    /// ```
    pub fn bind(addr: SocketAddr) -> Self {
        Self::new(ServerConfig { addr, ..ServerConfig::default() })
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        let addr = self.config.addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        let body_limit = self.config.body_limit;
        let router = Arc::new(router);

        info!(addr = %listener.local_addr()?, body_limit, "ferry listening");

        let mut tasks = tokio::task::JoinSet::new();

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Shutdown first, so a SIGTERM stops accepting even while
                // connections are queued.
                biased;

                () = &mut shutdown => {
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

                    let router = Arc::clone(&router);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            async move { dispatch(&router, req, body_limit).await }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            debug!(%peer, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the set stays bounded.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("ferry stopped");
        Ok(())
    }
}

/// Routes one request and produces one response. Every failure is already
/// a response by the time it gets here, so hyper never sees an error.
async fn dispatch<B>(
    router: &Router,
    req: http::Request<B>,
    body_limit: usize,
) -> Result<http::Response<ResponseBody>, Infallible>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();
    let response = match read_body(body, body_limit).await {
        Ok(bytes) => router.respond(http::Request::from_parts(parts, bytes)).await,
        Err(rejection) => {
            warn!(method = %parts.method, path = parts.uri.path(), status = rejection.status_code().as_u16(), "request body rejected");
            rejection
        }
    };
    Ok(response.into_inner())
}

/// Buffers a request body of at most `limit` bytes.
async fn read_body<B>(body: B, limit: usize) -> Result<Bytes, Response>
where
    B: Body,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(Response::status(StatusCode::PAYLOAD_TOO_LARGE))
        }
        Err(e) => {
            debug!("failed to read request body: {e}");
            Err(Response::status(StatusCode::BAD_REQUEST))
        }
    }
}

/// Resolves on the first shutdown signal the process receives: SIGTERM or
/// SIGINT on Unix, Ctrl-C elsewhere.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
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
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
