//! File downloads.
//!
//! A download route's business function resolves to a [`Download`]. Instead
//! of a JSON body the client receives the raw bytes as an attachment, fed to
//! the connection through a pass-through stream of fixed-size chunks.

use std::io;

use bytes::Bytes;
use futures::Stream;
use http::header::CONTENT_DISPOSITION;
use http::{HeaderValue, StatusCode};

use crate::api_error::ApiError;
use crate::response::{Response, ResponseBody};

/// Largest frame handed to the connection at once.
pub(crate) const CHUNK_SIZE: usize = 16 * 1024;

/// Content produced by a download route.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Download {
    pub content: Bytes,
    pub content_type: String,
    pub filename: String,
}

impl Download {
    pub fn new(content: impl Into<Bytes>, content_type: impl Into<String>, filename: impl Into<String>) -> Self {
        Self { content: content.into(), content_type: content_type.into(), filename: filename.into() }
    }

    /// Builds the attachment response.
    ///
    /// Fails, before anything is sent, when the filename or content type
    /// cannot be carried in a header.
    pub(crate) fn into_response(self) -> Result<Response, ApiError> {
        let disposition = HeaderValue::try_from(format!("attachment; filename={}", self.filename))
            .map_err(|_| ApiError::opaque(format!("invalid download filename `{}`", self.filename)))?;
        let content_type = HeaderValue::try_from(self.content_type.as_str())
            .map_err(|_| ApiError::opaque(format!("invalid download content type `{}`", self.content_type)))?;

        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_DISPOSITION, disposition)
            .body(content_type, ResponseBody::stream(pass_through(self.content))))
    }
}

/// Yields `content` in [`CHUNK_SIZE`] slices. Slicing `Bytes` shares the
/// buffer, nothing is copied.
fn pass_through(content: Bytes) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    let len = content.len();
    let chunks = (0..len)
        .step_by(CHUNK_SIZE)
        .map(move |start| Ok(content.slice(start..len.min(start + CHUNK_SIZE))));
    futures::stream::iter(chunks)
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use http::header::CONTENT_TYPE;

    use super::*;

    #[tokio::test]
    async fn attachment_headers_and_raw_body() {
        let download = Download::new(Bytes::from_static(b"%PDF-1.7"), "application/pdf", "r.pdf");
        let res = download.into_response().unwrap();

        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.headers()[CONTENT_DISPOSITION], "attachment; filename=r.pdf");
        assert_eq!(res.headers()[CONTENT_TYPE], "application/pdf");
        assert!(res.body().is_stream());
        assert_eq!(res.into_bytes().await.unwrap(), Bytes::from_static(b"%PDF-1.7"));
    }

    #[tokio::test]
    async fn large_content_is_split_into_chunks() {
        let content = Bytes::from(vec![7u8; CHUNK_SIZE * 2 + 5]);
        let chunks: Vec<_> = pass_through(content.clone()).map(Result::unwrap).collect().await;

        let sizes: Vec<_> = chunks.iter().map(Bytes::len).collect();
        assert_eq!(sizes, vec![CHUNK_SIZE, CHUNK_SIZE, 5]);
        assert_eq!(chunks.concat(), content.to_vec());
    }

    #[tokio::test]
    async fn empty_content_streams_nothing() {
        assert_eq!(pass_through(Bytes::new()).count().await, 0);
    }

    #[test]
    fn header_breaking_filenames_are_rejected() {
        let download = Download::new(Bytes::new(), "text/plain", "evil\r\nSet-Cookie: x=1");
        let err = download.into_response().unwrap_err();
        assert_eq!(err.status_code(), None);
        assert!(err.effective_message().starts_with("invalid download filename"));
    }
}
