//! Result-to-response translation.
//!
//! Everything a route does after its business function settles lives here,
//! as plain functions of the settled `Result`. A result settles exactly once,
//! so a route produces exactly one response: success, not-found, or error.
//!
//! ```rust
//! use ferry::translate::{error_response, json_response};
//! use ferry::{ApiError, ErrorLogFormat, ErrorPolicy};
//! use http::StatusCode;
//!
//! let errors = ErrorPolicy {
//!     default_status: StatusCode::INTERNAL_SERVER_ERROR,
//!     log: ErrorLogFormat::Compact,
//! };
//!
//! let ok = json_response(Ok::<_, ApiError>(vec![1, 2, 3]), StatusCode::OK, errors);
//! assert_eq!(ok.status_code(), StatusCode::OK);
//!
//! let missing = json_response(Ok::<Option<u32>, ApiError>(None), StatusCode::OK, errors);
//! assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
//!
//! let denied = error_response(&ApiError::new(StatusCode::FORBIDDEN, "forbidden"), errors);
//! assert_eq!(denied.status_code(), StatusCode::FORBIDDEN);
//! ```

use http::StatusCode;
use serde::Serialize;
use tracing::error;

use crate::api_error::ApiError;
use crate::download::Download;
use crate::policy::{ErrorLogFormat, ErrorPolicy};
use crate::response::Response;

/// What a resolved value serializes to when it is absent.
const ABSENT: &[u8] = b"null";

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
}

/// Translates the outcome of a JSON route.
///
/// A value serializing to `null` (`None`, `()`) is a missing entity and is
/// answered as `404 Entity not found` through the error path.
pub fn json_response<T: Serialize>(outcome: Result<T, ApiError>, success: StatusCode, errors: ErrorPolicy) -> Response {
    let body = outcome.and_then(|value| {
        serde_json::to_vec(&value).map_err(|e| ApiError::opaque(format!("failed to serialize response: {e}")))
    });

    match body {
        Ok(body) if body == ABSENT => error_response(&ApiError::not_found(), errors),
        Ok(body) => Response::builder().status(success).json(body),
        Err(err) => error_response(&err, errors),
    }
}

/// Translates the outcome of a download route. A successful download is
/// never JSON.
pub fn download_response(outcome: Result<Download, ApiError>, errors: ErrorPolicy) -> Response {
    match outcome.and_then(Download::into_response) {
        Ok(response) => response,
        Err(err) => error_response(&err, errors),
    }
}

/// Logs `err` and answers with its effective status and `{"message": …}`.
pub fn error_response(err: &ApiError, errors: ErrorPolicy) -> Response {
    let status = err.effective_status(errors.default_status);
    log_failure(err, status, errors.log);

    let message = err.effective_message();
    match serde_json::to_vec(&ErrorBody { message: &message }) {
        Ok(body) => Response::builder().status(status).json(body),
        Err(_) => Response::status(status),
    }
}

/// Writes the diagnostics for one failed request.
pub fn log_failure(err: &ApiError, status: StatusCode, format: ErrorLogFormat) {
    let json = serde_json::to_string(err).unwrap_or_else(|e| format!("<unserializable error: {e}>"));

    match format {
        ErrorLogFormat::Verbose => {
            error!("{} :: {}", status.as_u16(), err.log_message());
            error!("{json}");
            error!("{err}");
        }
        ErrorLogFormat::Compact => {
            error!(status = status.as_u16(), reason = err.log_message(), error = %json, "request failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
    use serde_json::{Value, json};
    use tracing_test::traced_test;

    use super::*;

    const VERBOSE: ErrorPolicy = ErrorPolicy {
        default_status: StatusCode::INTERNAL_SERVER_ERROR,
        log: ErrorLogFormat::Verbose,
    };

    async fn body_json(res: Response) -> Value {
        serde_json::from_slice(&res.into_bytes().await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn present_values_use_the_success_status() {
        let res = json_response(Ok::<_, ApiError>(json!({ "id": 7 })), StatusCode::CREATED, VERBOSE);
        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(body_json(res).await, json!({ "id": 7 }));
    }

    #[tokio::test]
    async fn falsy_but_present_values_are_not_missing() {
        let res = json_response(Ok::<_, ApiError>(0), StatusCode::OK, VERBOSE);
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(body_json(res).await, json!(0));
    }

    #[tokio::test]
    async fn absent_values_are_not_found() {
        let res = json_response(Ok::<Option<String>, ApiError>(None), StatusCode::OK, VERBOSE);
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(res).await, json!({ "message": "Entity not found" }));

        let res = json_response(Ok::<(), ApiError>(()), StatusCode::CREATED, VERBOSE);
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn explicit_status_and_message_pass_through() {
        let err = ApiError::new(StatusCode::FORBIDDEN, "forbidden");
        let res = json_response(Err::<Value, _>(err), StatusCode::OK, VERBOSE);
        assert_eq!(res.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(res).await, json!({ "message": "forbidden" }));
    }

    #[tokio::test]
    async fn validation_errors_surface_the_driver_message() {
        let res = json_response(Err::<Value, _>(ApiError::validation("duplicate key")), StatusCode::OK, VERBOSE);
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(res).await, json!({ "message": "duplicate key" }));
    }

    #[tokio::test]
    async fn bare_values_use_the_default_status_and_string_form() {
        let errors = ErrorPolicy { default_status: StatusCode::BAD_GATEWAY, ..VERBOSE };
        let res = json_response(Err::<Value, _>(ApiError::from("upstream went away")), StatusCode::OK, errors);
        assert_eq!(res.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(body_json(res).await, json!({ "message": "upstream went away" }));
    }

    #[tokio::test]
    async fn unserializable_values_fail_through_the_error_path() {
        let value = std::collections::HashMap::from([((1u8, 2u8), 3u8)]);
        let res = json_response(Ok::<_, ApiError>(value), StatusCode::OK, VERBOSE);
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(res).await;
        let message = body["message"].as_str().unwrap_or_default();
        assert!(message.starts_with("failed to serialize response"), "{message}");
    }

    #[tokio::test]
    async fn downloads_are_streamed_not_serialized() {
        let download = Download::new(Bytes::from_static(b"\x00\x01binary"), "application/pdf", "r.pdf");
        let res = download_response(Ok(download), VERBOSE);
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.headers()[CONTENT_DISPOSITION], "attachment; filename=r.pdf");
        assert_eq!(res.headers()[CONTENT_TYPE], "application/pdf");
        assert_eq!(res.into_bytes().await.unwrap(), Bytes::from_static(b"\x00\x01binary"));
    }

    #[tokio::test]
    async fn failed_downloads_answer_with_json_errors() {
        let res = download_response(Err(ApiError::new(StatusCode::GONE, "expired")), VERBOSE);
        assert_eq!(res.status_code(), StatusCode::GONE);
        assert!(res.headers().get(CONTENT_DISPOSITION).is_none());
        assert_eq!(body_json(res).await, json!({ "message": "expired" }));
    }

    #[test]
    #[traced_test]
    fn verbose_logging_writes_three_events() {
        log_failure(&ApiError::validation("duplicate key"), StatusCode::INTERNAL_SERVER_ERROR, ErrorLogFormat::Verbose);

        assert!(logs_contain("500 :: Validation error"));
        assert!(logs_contain(r#"{"message":"Validation error","original":{"sqlMessage":"duplicate key"}}"#));
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|line| line.contains("ERROR")).count() {
                3 => Ok(()),
                n => Err(format!("expected 3 error events, saw {n}")),
            }
        });
    }

    #[test]
    #[traced_test]
    fn compact_logging_writes_one_event() {
        log_failure(&ApiError::new(StatusCode::FORBIDDEN, "forbidden"), StatusCode::FORBIDDEN, ErrorLogFormat::Compact);

        assert!(logs_contain("request failed"));
        assert!(logs_contain("status=403"));
        logs_assert(|lines: &[&str]| {
            match lines.iter().filter(|line| line.contains("ERROR")).count() {
                1 => Ok(()),
                n => Err(format!("expected 1 error event, saw {n}")),
            }
        });
    }
}
