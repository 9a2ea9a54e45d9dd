//! Infrastructure error type.

use std::net::SocketAddr;

use thiserror::Error;

/// The error type returned by ferry's fallible start-up operations.
///
/// Request-level failures (404, 422, a rejected business function) never
/// surface here: they are translated into HTTP responses by the router. This
/// type covers binding to a port and other socket-level failures.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
