//! Middleware layer.
//!
//! Middleware runs before a route's business function and is the right place
//! for cross-cutting concerns: CORS headers, request tracing, authentication
//! header inspection. A middleware is any async function of the request and
//! the rest of the chain:
//!
//! ```rust
//! use ferry::middleware::Next;
//! use ferry::{IntoResponse, Request, Response};
//! use http::StatusCode;
//!
//! async fn require_token(req: Request, next: Next) -> Response {
//!     if req.header("authorization").is_none() {
//!         // Returning without calling `next` ends the chain here.
//!         return StatusCode::UNAUTHORIZED.into_response();
//!     }
//!     next.run(req).await
//! }
//! ```
//!
//! Route middlewares run in the order given to the registration call,
//! strictly before the business function. Router-wide middlewares registered
//! with [`Router::layer`](crate::Router::layer) run before route lookup, so
//! they also see requests no route matches (e.g. CORS pre-flight `OPTIONS`).
//!
//! Built-in middleware:
//! - [`cors`]: cross-origin headers and pre-flight answers
//! - [`trace`]: per-request span with method, path, status, latency
//! - [`compression`]: gzip/deflate for buffered bodies

mod compression;
mod cors;
mod trace;

use std::future::Future;
use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler};
use crate::request::Request;
use crate::response::{IntoResponse, Response};

pub use compression::{COMPRESSION_THRESHOLD, compression};
pub use cors::{CorsConfig, cors};
pub use trace::trace;

/// Internal dispatch interface for middleware.
#[doc(hidden)]
pub trait ErasedMiddleware {
    fn call(&self, req: Request, next: Next) -> BoxFuture<Response>;
}

/// A type-erased middleware shared across concurrent requests.
pub type BoxedMiddleware = Arc<dyn ErasedMiddleware + Send + Sync + 'static>;

/// Implemented for every valid middleware.
///
/// Automatically satisfied for any `async fn(Request, Next) -> impl IntoResponse`
/// (and closures of that shape). Sealed like [`BusinessFn`](crate::BusinessFn).
pub trait Middleware: private::Sealed + Send + Sync + 'static {
    fn into_boxed_middleware(self) -> BoxedMiddleware;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Middleware for F
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_middleware(self) -> BoxedMiddleware {
        Arc::new(FnMiddleware(self))
    }
}

struct FnMiddleware<F>(F);

impl<F, Fut, R> ErasedMiddleware for FnMiddleware<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call(&self, req: Request, next: Next) -> BoxFuture<Response> {
        let fut = (self.0)(req, next);
        Box::pin(async move { fut.await.into_response() })
    }
}

/// Builds the ordered middleware list of a route registration.
///
/// ```rust
/// use ferry::{middlewares, ApiError, Request, Router};
///
/// async fn ping(_req: Request) -> Result<&'static str, ApiError> { Ok("pong") }
///
/// Router::new()
///     .get("/ping", middlewares![], ping)
///     .get("/traced-ping", middlewares![ferry::middleware::trace()], ping);
/// ```
#[macro_export]
macro_rules! middlewares {
    () => {
        ::std::vec::Vec::<$crate::middleware::BoxedMiddleware>::new()
    };
    ($($middleware:expr),+ $(,)?) => {
        ::std::vec![$($crate::middleware::Middleware::into_boxed_middleware($middleware)),+]
    };
}

// ── Next ──────────────────────────────────────────────────────────────────────

/// The remainder of a middleware chain, ending in the route handler.
pub struct Next {
    chain: Arc<[BoxedMiddleware]>,
    position: usize,
    endpoint: BoxedHandler,
}

impl Next {
    pub(crate) fn new(chain: Arc<[BoxedMiddleware]>, endpoint: BoxedHandler) -> Self {
        Self { chain, position: 0, endpoint }
    }

    /// Passes the request to the next middleware, or to the route handler
    /// once the chain is exhausted.
    pub async fn run(mut self, req: Request) -> Response {
        let middleware = self.chain.get(self.position).cloned();
        match middleware {
            Some(middleware) => {
                self.position += 1;
                middleware.call(req, self).await
            }
            None => self.endpoint.call(req).await,
        }
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next")
            .field("remaining", &(self.chain.len() - self.position))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;
    use http::{HeaderValue, StatusCode};

    use super::*;
    use crate::handler::ErasedHandler;

    struct Recorder {
        seen: Arc<Mutex<Vec<&'static str>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ErasedHandler for Recorder {
        fn call(&self, _req: Request) -> BoxFuture<Response> {
            self.seen.lock().unwrap().push("endpoint");
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Response::text("done") })
        }
    }

    fn step(seen: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> BoxedMiddleware {
        let seen = Arc::clone(seen);
        (move |req: Request, next: Next| {
            seen.lock().unwrap().push(name);
            next.run(req)
        })
        .into_boxed_middleware()
    }

    fn request() -> Request {
        Request::new(http::Request::new(Bytes::new()))
    }

    #[tokio::test]
    async fn middlewares_run_in_order_before_the_endpoint() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let endpoint: BoxedHandler = Arc::new(Recorder { seen: Arc::clone(&seen), calls: Arc::clone(&calls) });
        let chain: Arc<[BoxedMiddleware]> = vec![step(&seen, "first"), step(&seen, "second")].into();

        let res = Next::new(chain, endpoint).run(request()).await;

        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second", "endpoint"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn short_circuit_skips_the_endpoint() {
        async fn deny(_req: Request, _next: Next) -> StatusCode {
            StatusCode::UNAUTHORIZED
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let endpoint: BoxedHandler = Arc::new(Recorder { seen: Arc::clone(&seen), calls: Arc::clone(&calls) });
        let chain: Arc<[BoxedMiddleware]> = middlewares![deny].into();

        let res = Next::new(chain, endpoint).run(request()).await;

        assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn middleware_can_decorate_the_response() {
        async fn tag(req: Request, next: Next) -> Response {
            let mut res = next.run(req).await;
            res.headers_mut().insert("x-served-by", HeaderValue::from_static("ferry"));
            res
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let endpoint: BoxedHandler = Arc::new(Recorder { seen, calls });
        let res = Next::new(middlewares![tag].into(), endpoint).run(request()).await;

        assert_eq!(res.headers()["x-served-by"], "ferry");
    }
}
