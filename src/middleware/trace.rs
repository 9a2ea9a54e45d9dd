//! Request tracing.

use std::time::Instant;

use tracing::{Instrument, info, info_span};

use super::{Middleware, Next};
use crate::request::Request;

/// Opens a span per request and records one event with method, path,
/// status and latency once the response is ready.
pub fn trace() -> impl Middleware {
    |req: Request, next: Next| async move {
        let method = req.method().clone();
        let path = req.path().to_owned();
        let span = info_span!("request", %method, %path);
        let started = Instant::now();

        let res = next.run(req).instrument(span.clone()).await;

        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
        span.in_scope(|| info!(status = res.status_code().as_u16(), latency_ms, "{method} {path}"));
        res
    }
}
