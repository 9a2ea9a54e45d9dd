//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Routes registered through the adapter never build a [`Response`] by hand:
//! the router derives it from the business function's result. Middleware
//! does, when it answers a request itself or decorates the answer on its way
//! out.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use http_body::{Body, Frame, SizeHint};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, StreamBody};

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcuts (200 OK, no custom headers needed)
///
/// ```rust
/// use ferry::Response;
/// use http::StatusCode;
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use ferry::Response;
/// use http::{header, HeaderValue, StatusCode};
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header(header::LOCATION, HeaderValue::from_static("/users/42"))
///     .json(br#"{"id":42}"#.to_vec());
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
}

impl Response {
    /// `200 OK`, `application/json`.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().json(body)
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::builder().text(body)
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { status: code, headers: HeaderMap::new(), body: ResponseBody::empty() }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: HeaderMap::new(), status: StatusCode::OK }
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut ResponseBody {
        &mut self.body
    }

    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// Drains the body, streamed or not, into one buffer.
    pub async fn into_bytes(self) -> io::Result<Bytes> {
        Ok(self.body.collect().await?.to_bytes())
    }

    pub(crate) fn into_inner(self) -> http::Response<ResponseBody> {
        let mut response = http::Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`.
/// Finished by one of the typed body methods.
#[derive(Debug)]
pub struct ResponseBuilder {
    headers: HeaderMap,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.finish(HeaderValue::from_static("application/json"), ResponseBody::once(body.into()))
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish(HeaderValue::from_static("text/plain; charset=utf-8"), ResponseBody::once(Bytes::from(body.into())))
    }

    /// Terminate with a body of any content type, buffered or streamed.
    pub fn body(self, content_type: HeaderValue, body: ResponseBody) -> Response {
        self.finish(content_type, body)
    }

    /// Terminate with no body (e.g. `204 No Content`, `301 Moved Permanently`).
    pub fn no_body(self) -> Response {
        Response { body: ResponseBody::empty(), headers: self.headers, status: self.status }
    }

    fn finish(mut self, content_type: HeaderValue, body: ResponseBody) -> Response {
        self.headers.entry(CONTENT_TYPE).or_insert(content_type);
        Response { body, headers: self.headers, status: self.status }
    }
}

// ── ResponseBody ──────────────────────────────────────────────────────────────

/// A response body: one buffer sent as a single frame, or a stream of frames
/// pulled by the connection as the client drains them.
pub struct ResponseBody {
    kind: Kind,
}

enum Kind {
    Once(Option<Bytes>),
    Stream(UnsyncBoxBody<Bytes, io::Error>),
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self { kind: Kind::Once(None) }
    }

    pub fn once(bytes: Bytes) -> Self {
        if bytes.is_empty() {
            Self::empty()
        } else {
            Self { kind: Kind::Once(Some(bytes)) }
        }
    }

    /// Wraps a chunk stream. Chunks are produced on demand, so a slow client
    /// holds back the producer instead of growing a buffer.
    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    {
        let body = StreamBody::new(stream.map_ok(Frame::data));
        Self { kind: Kind::Stream(UnsyncBoxBody::new(body)) }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.kind, Kind::Stream(_))
    }

    /// The buffered bytes, unless the body is a stream.
    pub(crate) fn buffered(&self) -> Option<&[u8]> {
        match &self.kind {
            Kind::Once(bytes) => Some(bytes.as_deref().unwrap_or_default()),
            Kind::Stream(_) => None,
        }
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Kind::Once(Some(bytes)) => f.debug_tuple("Once").field(&bytes.len()).finish(),
            Kind::Once(None) => f.write_str("Empty"),
            Kind::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl Body for ResponseBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        match &mut self.get_mut().kind {
            Kind::Once(bytes) => Poll::Ready(bytes.take().map(|b| Ok(Frame::data(b)))),
            Kind::Stream(body) => Pin::new(body).poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.kind {
            Kind::Once(bytes) => bytes.is_none(),
            Kind::Stream(body) => body.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.kind {
            Kind::Once(Some(bytes)) => SizeHint::with_exact(bytes.len() as u64),
            Kind::Once(None) => SizeHint::with_exact(0),
            Kind::Stream(body) => body.size_hint(),
        }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Middleware may return any implementor; the chain converts it.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a status directly from a middleware: `return StatusCode::UNAUTHORIZED`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}
