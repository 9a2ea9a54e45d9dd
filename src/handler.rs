//! Business functions and compiled route handlers.
//!
//! # How a business function becomes a route
//!
//! The router holds handlers of *different* types in one radix tree per
//! method, so every registration is compiled into a trait object
//! (`dyn ErasedHandler`) that owns the business function together with the
//! statuses and settings in force when it was registered:
//!
//! ```text
//! async fn get_user(req: Request) -> Result<Option<User>, ApiError>   ← user writes this
//!        ↓ router.get("/users/{id}", middlewares![], get_user)
//! JsonRoute { business: get_user, success: 200, settings }            ← compiled once
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req)  at request time                                  ← one vtable dispatch
//!        ↓
//! settle(get_user(req)) → translate::json_response(..)                ← exactly one Response
//! ```

use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use http::StatusCode;
use serde::Serialize;

use crate::api_error::ApiError;
use crate::download::Download;
use crate::policy::RouteSettings;
use crate::request::Request;
use crate::response::Response;
use crate::translate;

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future.
///
/// `Send + 'static` let tokio move the future across threads safely.
pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// public [`BoxedMiddleware`](crate::middleware::BoxedMiddleware) machinery.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<Response>;
}

/// A heap-allocated, type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public BusinessFn trait ───────────────────────────────────────────────────

/// Implemented for every valid business function.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` (or closure returning a future) with the signature:
///
/// ```text
/// async fn name(req: Request) -> Result<T, E>
/// where T: Serialize (or Download), E: Into<ApiError>
/// ```
///
/// The trait is **sealed** (via the private `Sealed` supertrait): only the
/// blanket impl below can satisfy it.
pub trait BusinessFn<T, E>: private::Sealed<T, E> + Send + Sync + 'static {
    #[doc(hidden)]
    fn invoke(&self, req: Request) -> BoxFuture<Result<T, ApiError>>;
}

mod private {
    pub trait Sealed<T, E> {}
}

impl<F, Fut, T, E> private::Sealed<T, E> for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + 'static,
{
}

impl<F, Fut, T, E> BusinessFn<T, E> for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + 'static,
{
    fn invoke(&self, req: Request) -> BoxFuture<Result<T, ApiError>> {
        let fut = (self)(req);
        Box::pin(async move { fut.await.map_err(Into::into) })
    }
}

// ── Compiled routes ───────────────────────────────────────────────────────────

/// A read/create/replace/delete route: the settled value is sent as JSON.
struct JsonRoute<B, T, E> {
    business: B,
    success: StatusCode,
    settings: RouteSettings,
    _types: PhantomData<fn() -> (T, E)>,
}

impl<B, T, E> ErasedHandler for JsonRoute<B, T, E>
where
    B: BusinessFn<T, E>,
    T: Serialize + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<Response> {
        let pending = start::<B, T, E>(&self.business, req);
        let success = self.success;
        let settings = self.settings;
        Box::pin(async move {
            let outcome = settle(pending, settings.handler_timeout).await;
            translate::json_response(outcome, success, settings.json_errors())
        })
    }
}

/// A download route: the settled [`Download`] is streamed as an attachment.
struct DownloadRoute<B, E> {
    business: B,
    settings: RouteSettings,
    _types: PhantomData<fn() -> E>,
}

impl<B, E> ErasedHandler for DownloadRoute<B, E>
where
    B: BusinessFn<Download, E>,
{
    fn call(&self, req: Request) -> BoxFuture<Response> {
        let pending = start::<B, Download, E>(&self.business, req);
        let settings = self.settings;
        Box::pin(async move {
            let outcome = settle(pending, settings.handler_timeout).await;
            translate::download_response(outcome, settings.download_errors())
        })
    }
}

pub(crate) fn json_route<B, T, E>(business: B, success: StatusCode, settings: RouteSettings) -> BoxedHandler
where
    B: BusinessFn<T, E>,
    T: Serialize + Send + 'static,
    E: 'static,
{
    Arc::new(JsonRoute { business, success, settings, _types: PhantomData })
}

pub(crate) fn download_route<B, E>(business: B, settings: RouteSettings) -> BoxedHandler
where
    B: BusinessFn<Download, E>,
    E: 'static,
{
    Arc::new(DownloadRoute { business, settings, _types: PhantomData })
}

/// Calls the business function. A closure may panic before it hands back
/// its future; that panic settles the request the same way a panic inside
/// the future does.
fn start<B, T, E>(business: &B, req: Request) -> BoxFuture<Result<T, ApiError>>
where
    B: BusinessFn<T, E>,
    T: Send + 'static,
{
    match std::panic::catch_unwind(AssertUnwindSafe(|| business.invoke(req))) {
        Ok(pending) => pending,
        Err(panic) => Box::pin(futures::future::ready(Err(ApiError::opaque(panic_message(&*panic))))),
    }
}

/// Waits for the business function, bounded by `timeout` when one is set.
///
/// A panic inside the business function becomes an unclassified failure of
/// this request only.
async fn settle<T>(pending: BoxFuture<Result<T, ApiError>>, timeout: Option<Duration>) -> Result<T, ApiError> {
    let guarded = AssertUnwindSafe(pending).catch_unwind();
    let settled = match timeout {
        Some(limit) => match tokio::time::timeout(limit, guarded).await {
            Ok(settled) => settled,
            Err(_) => return Err(ApiError::timeout()),
        },
        None => guarded.await,
    };
    settled.unwrap_or_else(|panic| Err(ApiError::opaque(panic_message(&*panic))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str));
    match detail {
        Some(detail) => format!("business function panicked: {detail}"),
        None => "business function panicked".to_owned(),
    }
}
