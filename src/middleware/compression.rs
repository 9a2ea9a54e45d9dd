//! Response compression.

use std::io::{self, Write};

use bytes::Bytes;
use flate2::Compression;
use flate2::write::{GzEncoder, ZlibEncoder};
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, VARY};
use http::{HeaderValue, StatusCode};
use tracing::warn;

use super::{Middleware, Next};
use crate::request::Request;
use crate::response::{Response, ResponseBody};

/// Bodies smaller than this are sent as they are.
pub const COMPRESSION_THRESHOLD: usize = 1024;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Encoding {
    Gzip,
    Deflate,
}

impl Encoding {
    /// Picks gzip over deflate among the codings the client accepts.
    /// Codings listed with `q=0` are refused.
    fn negotiate(accept_encoding: &str) -> Option<Self> {
        let accepted: Vec<&str> = accept_encoding
            .split(',')
            .filter_map(|entry| {
                let mut parts = entry.split(';').map(str::trim);
                let name = parts.next()?;
                let refused = parts.any(|param| {
                    param.strip_prefix("q=").and_then(|q| q.parse::<f32>().ok()) == Some(0.0)
                });
                (!refused).then_some(name)
            })
            .collect();

        let accepts = |name: &str| accepted.iter().any(|a| a.eq_ignore_ascii_case(name) || *a == "*");
        if accepts("gzip") {
            Some(Self::Gzip)
        } else if accepts("deflate") {
            Some(Self::Deflate)
        } else {
            None
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
        }
    }

    fn encode(self, data: &[u8]) -> io::Result<Vec<u8>> {
        match self {
            Self::Gzip => {
                let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
                encoder.write_all(data)?;
                encoder.finish()
            }
            Self::Deflate => {
                let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
                encoder.write_all(data)?;
                encoder.finish()
            }
        }
    }
}

/// Compresses buffered response bodies of at least
/// [`COMPRESSION_THRESHOLD`] bytes with gzip or deflate, as negotiated by
/// `Accept-Encoding`.
///
/// Streamed bodies (downloads) and responses that already carry a
/// `Content-Encoding` pass through untouched.
pub fn compression() -> impl Middleware {
    |req: Request, next: Next| async move {
        let encoding = req.header(ACCEPT_ENCODING.as_str()).and_then(Encoding::negotiate);
        let mut res = next.run(req).await;
        if let Some(encoding) = encoding {
            compress(&mut res, encoding);
        }
        res
    }
}

fn compress(res: &mut Response, encoding: Encoding) {
    if matches!(res.status_code(), StatusCode::NO_CONTENT | StatusCode::NOT_MODIFIED)
        || res.headers().contains_key(CONTENT_ENCODING)
    {
        return;
    }
    let Some(body) = res.body().buffered() else { return };
    if body.len() < COMPRESSION_THRESHOLD {
        return;
    }

    match encoding.encode(body) {
        Ok(encoded) => {
            *res.body_mut() = ResponseBody::once(Bytes::from(encoded));
            let headers = res.headers_mut();
            headers.remove(CONTENT_LENGTH);
            headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding.name()));
            headers.append(VARY, HeaderValue::from_static("accept-encoding"));
        }
        Err(e) => warn!(encoding = encoding.name(), "response compression failed: {e}"),
    }
}
