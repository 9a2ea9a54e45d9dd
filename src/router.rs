//! The route adapter.
//!
//! One radix tree per HTTP method, O(path-length) lookup. Each registration
//! takes a path, an ordered middleware list and one business function, and
//! compiles them into a handler that turns whatever the business function
//! settles with into exactly one HTTP response.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use matchit::Router as MatchitRouter;
use serde::Serialize;
use tracing::debug;

use crate::download::Download;
use crate::handler::{self, BoxFuture, BoxedHandler, BusinessFn, ErasedHandler};
use crate::method::{Method, Verb};
use crate::middleware::{BoxedMiddleware, Middleware, Next};
use crate::policy::{RouteSettings, StatusPolicy};
use crate::request::Request;
use crate::response::{Response, ResponseBody};

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Every registration returns `self` so registrations chain naturally.
///
/// ```rust
/// use ferry::{middlewares, ApiError, Download, Request, Router};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct User { id: u64, name: String }
///
/// async fn get_user(req: Request) -> Result<Option<User>, ApiError> {
///     let id: u64 = req.param("id").unwrap_or_default().parse().map_err(|_| ApiError::message("bad id"))?;
///     Ok((id == 42).then(|| User { id, name: "alice".into() }))
/// }
///
/// async fn report(_req: Request) -> Result<Download, ApiError> {
///     Ok(Download::new(b"%PDF-1.7".to_vec(), "application/pdf", "r.pdf"))
/// }
///
/// let app = Router::new()
///     .get("/users/{id}", middlewares![], get_user)
///     .download("/reports/{id}", middlewares![ferry::middleware::trace()], report);
/// ```
pub struct Router {
    trees: HashMap<Method, MatchitRouter<BoxedHandler>>,
    layers: Arc<[BoxedMiddleware]>,
    settings: RouteSettings,
    registered: Vec<(Method, String)>,
    method_override: bool,
}

impl Router {
    pub fn new() -> Self {
        Self::with_settings(RouteSettings::default())
    }

    pub fn with_settings(settings: RouteSettings) -> Self {
        Self {
            trees: HashMap::new(),
            layers: Arc::from([]),
            settings,
            registered: Vec::new(),
            method_override: false,
        }
    }

    pub fn settings(&self) -> &RouteSettings {
        &self.settings
    }

    /// Replaces the status policy. Routes already registered keep the
    /// policy they were compiled with.
    pub fn policy(mut self, policy: StatusPolicy) -> Self {
        self.settings.policy = policy;
        self
    }

    /// Lets `POST` requests carrying `X-HTTP-Method-Override: <METHOD>` be
    /// routed as `<METHOD>`, for clients that can only send `GET` and `POST`.
    pub fn method_override(mut self, enabled: bool) -> Self {
        self.method_override = enabled;
        self
    }

    /// Adds a router-wide middleware. Router-wide middlewares run in the
    /// order added, before route lookup is acted on, for every request.
    pub fn layer(mut self, middleware: impl Middleware) -> Self {
        let mut layers = self.layers.to_vec();
        layers.push(middleware.into_boxed_middleware());
        self.layers = layers.into();
        self
    }

    /// Registers a read route (`GET`).
    ///
    /// # Panics
    ///
    /// Panics if `path` is empty, does not start with `/`, is malformed, or
    /// conflicts with a route already registered for the method.
    pub fn get<B, T, E>(self, path: &str, middlewares: Vec<BoxedMiddleware>, business: B) -> Self
    where
        B: BusinessFn<T, E>,
        T: Serialize + Send + 'static,
        E: 'static,
    {
        self.route(Verb::Read, path, middlewares, business)
    }

    /// Registers a create route (`POST`). Panics like [`Router::get`].
    pub fn post<B, T, E>(self, path: &str, middlewares: Vec<BoxedMiddleware>, business: B) -> Self
    where
        B: BusinessFn<T, E>,
        T: Serialize + Send + 'static,
        E: 'static,
    {
        self.route(Verb::Create, path, middlewares, business)
    }

    /// Registers a replace route (`PUT`). Panics like [`Router::get`].
    pub fn put<B, T, E>(self, path: &str, middlewares: Vec<BoxedMiddleware>, business: B) -> Self
    where
        B: BusinessFn<T, E>,
        T: Serialize + Send + 'static,
        E: 'static,
    {
        self.route(Verb::Replace, path, middlewares, business)
    }

    /// Registers a delete route (`DELETE`). Panics like [`Router::get`].
    pub fn delete<B, T, E>(self, path: &str, middlewares: Vec<BoxedMiddleware>, business: B) -> Self
    where
        B: BusinessFn<T, E>,
        T: Serialize + Send + 'static,
        E: 'static,
    {
        self.route(Verb::Delete, path, middlewares, business)
    }

    /// Registers a JSON route for `verb`, answering with the verb's success
    /// status from the current policy. Panics like [`Router::get`].
    pub fn route<B, T, E>(self, verb: Verb, path: &str, middlewares: Vec<BoxedMiddleware>, business: B) -> Self
    where
        B: BusinessFn<T, E>,
        T: Serialize + Send + 'static,
        E: 'static,
    {
        let success = self.settings.policy.success(verb);
        let handler = handler::json_route(business, success, self.settings);
        self.add(verb.method(), path, middlewares, handler)
    }

    /// Registers a download route (`GET`): the resolved [`Download`] is sent
    /// as an attachment. Panics like [`Router::get`].
    pub fn download<B, E>(self, path: &str, middlewares: Vec<BoxedMiddleware>, business: B) -> Self
    where
        B: BusinessFn<Download, E>,
        E: 'static,
    {
        let handler = handler::download_route(business, self.settings);
        self.add(Method::Get, path, middlewares, handler)
    }

    /// Registered routes, in registration order.
    pub fn routes(&self) -> impl Iterator<Item = (Method, &str)> + '_ {
        self.registered.iter().map(|(method, path)| (*method, path.as_str()))
    }

    /// Routes one request and produces one response.
    ///
    /// Unknown paths answer `404`; known paths without a route for the
    /// request method answer `405`. Both still pass through the router-wide
    /// middlewares. `HEAD` falls back to the `GET` route of the path and
    /// answers with its status and headers only.
    pub async fn respond(&self, mut req: http::Request<Bytes>) -> Response {
        if self.method_override {
            override_method(&mut req);
        }
        let head = *req.method() == http::Method::HEAD;

        let mut req = Request::new(req);
        let endpoint = match self.lookup(req.method(), req.path()) {
            Lookup::Found(handler, params) => {
                req.set_params(params);
                handler
            }
            Lookup::MethodNotAllowed => fallback(StatusCode::METHOD_NOT_ALLOWED),
            Lookup::NotFound => fallback(StatusCode::NOT_FOUND),
        };

        let mut res = Next::new(Arc::clone(&self.layers), endpoint).run(req).await;
        if head {
            *res.body_mut() = ResponseBody::empty();
        }
        res
    }

    fn add(mut self, method: Method, path: &str, middlewares: Vec<BoxedMiddleware>, handler: BoxedHandler) -> Self {
        assert!(!path.is_empty(), "invalid route for {method}: path must not be empty");
        assert!(path.starts_with('/'), "invalid route `{method} {path}`: path must start with `/`");

        let endpoint: BoxedHandler = if middlewares.is_empty() {
            handler
        } else {
            Arc::new(Chained { chain: middlewares.into(), endpoint: handler })
        };

        self.trees
            .entry(method)
            .or_default()
            .insert(path, endpoint)
            .unwrap_or_else(|e| panic!("invalid route `{method} {path}`: {e}"));
        self.registered.push((method, path.to_owned()));
        debug!(%method, path, "route registered");
        self
    }

    fn lookup(&self, method: &http::Method, path: &str) -> Lookup {
        let matched = Method::try_from(method).ok().and_then(|method| {
            let found = self.trees.get(&method).and_then(|tree| tree.at(path).ok());
            match (found, method) {
                (None, Method::Head) => self.trees.get(&Method::Get).and_then(|tree| tree.at(path).ok()),
                (found, _) => found,
            }
        });
        if let Some(matched) = matched {
            let handler = Arc::clone(matched.value);
            let params = matched.params.iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect();
            return Lookup::Found(handler, params);
        }

        if self.trees.values().any(|tree| tree.at(path).is_ok()) {
            Lookup::MethodNotAllowed
        } else {
            Lookup::NotFound
        }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.registered)
            .field("layers", &self.layers.len())
            .field("settings", &self.settings)
            .field("method_override", &self.method_override)
            .finish()
    }
}

fn override_method(req: &mut http::Request<Bytes>) {
    if *req.method() != http::Method::POST {
        return;
    }
    let requested = req
        .headers()
        .get("x-http-method-override")
        .and_then(|value| http::Method::from_bytes(value.as_bytes()).ok())
        .filter(|method| Method::try_from(method).is_ok());
    if let Some(method) = requested {
        debug!(%method, "method overridden");
        *req.method_mut() = method;
    }
}

enum Lookup {
    Found(BoxedHandler, HashMap<String, String>),
    MethodNotAllowed,
    NotFound,
}

/// A route handler behind its own middleware chain.
struct Chained {
    chain: Arc<[BoxedMiddleware]>,
    endpoint: BoxedHandler,
}

impl ErasedHandler for Chained {
    fn call(&self, req: Request) -> BoxFuture<Response> {
        Box::pin(Next::new(Arc::clone(&self.chain), Arc::clone(&self.endpoint)).run(req))
    }
}

/// Answers requests no route matched.
struct Fallback(StatusCode);

impl ErasedHandler for Fallback {
    fn call(&self, _req: Request) -> BoxFuture<Response> {
        let status = self.0;
        Box::pin(async move { Response::status(status) })
    }
}

fn fallback(status: StatusCode) -> BoxedHandler {
    Arc::new(Fallback(status))
}
