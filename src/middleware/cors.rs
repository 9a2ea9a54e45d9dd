//! Cross-origin resource sharing.

use std::sync::Arc;

use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, InvalidHeaderValue,
};
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::Deserialize;

use super::{Middleware, Next};
use crate::request::Request;
use crate::response::Response;

/// Values of the three `Access-Control-Allow-*` headers.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_origin: "*".to_owned(),
            allow_methods: "POST, GET, PUT, DELETE, OPTIONS".to_owned(),
            allow_headers: "Origin, X-Requested-With, Content-Type, Accept, Authorization".to_owned(),
        }
    }
}

impl CorsConfig {
    pub(crate) fn headers(&self) -> Result<HeaderMap, InvalidHeaderValue> {
        let mut headers = HeaderMap::with_capacity(3);
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_str(&self.allow_origin)?);
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_str(&self.allow_methods)?);
        headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_str(&self.allow_headers)?);
        Ok(headers)
    }
}

/// Adds the CORS headers to every response and answers `OPTIONS`
/// pre-flight requests with an empty `200 OK` without running the rest of
/// the chain.
///
/// Register it router-wide with [`Router::layer`](crate::Router::layer) so
/// pre-flight requests are answered even for paths that only have
/// `GET`/`POST`/... routes.
///
/// # Panics
///
/// Panics if a configured value is not a valid header value.
/// [`Config::load`](crate::Config::load) rejects such values up front.
pub fn cors(config: CorsConfig) -> impl Middleware {
    let headers = config
        .headers()
        .unwrap_or_else(|e| panic!("invalid CORS configuration {config:?}: {e}"));
    let headers = Arc::new(headers);

    move |req: Request, next: Next| {
        let headers = Arc::clone(&headers);
        async move {
            let mut res = if *req.method() == http::Method::OPTIONS {
                Response::status(StatusCode::OK)
            } else {
                next.run(req).await
            };
            for (name, value) in headers.iter() {
                res.headers_mut().insert(name, value.clone());
            }
            res
        }
    }
}
