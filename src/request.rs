//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::{Extensions, HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

use crate::api_error::ApiError;

/// An incoming HTTP request with its body already collected.
#[derive(Debug)]
pub struct Request {
    parts: http::request::Parts,
    body: Bytes,
    params: HashMap<String, String>,
}

impl Request {
    pub(crate) fn new(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self { parts, body, params: HashMap::new() }
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub fn method(&self) -> &http::Method { &self.parts.method }
    pub fn uri(&self) -> &http::Uri { &self.parts.uri }
    pub fn path(&self) -> &str { self.parts.uri.path() }
    pub fn query(&self) -> Option<&str> { self.parts.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    /// Case-insensitive header lookup. Values that are not visible ASCII are
    /// reported as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Per-request values attached by middleware (e.g. the authenticated user).
    pub fn extensions(&self) -> &Extensions { &self.parts.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.parts.extensions }

    /// Deserializes the query string. A missing query parses as empty.
    pub fn query_as<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_urlencoded::from_str(self.query().unwrap_or_default())
            .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("invalid query string: {e}")))
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("invalid JSON body: {e}")))
    }

    /// Deserializes an `application/x-www-form-urlencoded` body.
    pub fn form<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_urlencoded::from_bytes(&self.body)
            .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("invalid form body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Page {
        page: u32,
        size: Option<u32>,
    }

    fn request(uri: &str, body: &'static [u8]) -> Request {
        let req = http::Request::builder()
            .uri(uri)
            .header("X-Tenant", "acme")
            .body(Bytes::from_static(body))
            .unwrap();
        Request::new(req)
    }

    #[test]
    fn exposes_path_query_and_headers() {
        let req = request("/users?page=2", b"");
        assert_eq!(req.path(), "/users");
        assert_eq!(req.query(), Some("page=2"));
        assert_eq!(req.header("x-tenant"), Some("acme"));
        assert_eq!(req.header("authorization"), None);
    }

    #[test]
    fn parses_query_strings() {
        let req = request("/users?page=2&size=10", b"");
        assert_eq!(req.query_as::<Page>().unwrap(), Page { page: 2, size: Some(10) });

        let err = request("/users", b"").query_as::<Page>().unwrap_err();
        assert_eq!(err.status_code(), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn parses_json_bodies() {
        let req = request("/users", br#"{"page":1}"#);
        assert_eq!(req.json::<Page>().unwrap(), Page { page: 1, size: None });

        let err = request("/users", b"{").json::<Page>().unwrap_err();
        assert_eq!(err.status_code(), Some(StatusCode::BAD_REQUEST));
        assert!(err.effective_message().starts_with("invalid JSON body"));
    }

    #[test]
    fn parses_form_bodies() {
        let req = request("/users", b"page=3&size=25");
        assert_eq!(req.form::<Page>().unwrap(), Page { page: 3, size: Some(25) });

        let err = request("/users", b"page=three").form::<Page>().unwrap_err();
        assert_eq!(err.status_code(), Some(StatusCode::BAD_REQUEST));
        assert!(err.effective_message().starts_with("invalid form body"));
    }

    #[test]
    fn params_are_empty_until_routed() {
        let mut req = request("/users/42", b"");
        assert_eq!(req.param("id"), None);
        req.set_params(HashMap::from([("id".to_owned(), "42".to_owned())]));
        assert_eq!(req.param("id"), Some("42"));
    }
}
