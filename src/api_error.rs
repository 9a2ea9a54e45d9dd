//! The structured failure every business function rejects with.
//!
//! A business function may fail with any `E: Into<ApiError>`. Whatever it
//! returns is normalized here into three optional facts (status, message,
//! nested driver error) plus the error's string form, and the router derives
//! the HTTP status and body from those facts alone.

use std::fmt;

use http::StatusCode;
use serde::{Serialize, Serializer};

/// Message a persistence layer uses for constraint violations. When an error
/// carries it, the client sees the nested driver message instead.
pub const VALIDATION_SENTINEL: &str = "Validation error";

/// Message of the failure produced when a business function resolves to nothing.
pub const NOT_FOUND_MESSAGE: &str = "Entity not found";

/// Message of the failure produced when a business function outlives the
/// configured handler timeout.
pub const TIMEOUT_MESSAGE: &str = "Request timed out";

/// Driver-specific details nested inside a validation failure.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct DriverError {
    #[serde(rename = "sqlMessage", skip_serializing_if = "Option::is_none")]
    pub sql_message: Option<String>,
}

impl DriverError {
    pub fn sql(message: impl Into<String>) -> Self {
        Self { sql_message: Some(message.into()) }
    }
}

/// A request failure, as produced by a business function or by the router.
///
/// ```rust
/// use ferry::ApiError;
/// use http::StatusCode;
///
/// let err = ApiError::new(StatusCode::FORBIDDEN, "forbidden");
/// assert_eq!(err.effective_status(StatusCode::INTERNAL_SERVER_ERROR), StatusCode::FORBIDDEN);
/// assert_eq!(err.effective_message(), "forbidden");
///
/// let err = ApiError::validation("duplicate key");
/// assert_eq!(err.effective_message(), "duplicate key");
/// ```
#[derive(Clone, Debug, Serialize)]
pub struct ApiError {
    #[serde(serialize_with = "status_code", skip_serializing_if = "Option::is_none")]
    status: Option<StatusCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    original: Option<DriverError>,
    #[serde(skip)]
    repr: String,
}

impl ApiError {
    /// A failure with an explicit status and message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self { status: Some(status), repr: message.clone(), message: Some(message), original: None }
    }

    /// A failure with a message; the status falls back to the route default.
    pub fn message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self { status: None, repr: message.clone(), message: Some(message), original: None }
    }

    /// A failure with a status and no message; the body carries the status
    /// line (`"409 Conflict"`).
    pub fn status(status: StatusCode) -> Self {
        Self { status: Some(status), message: None, original: None, repr: status.to_string() }
    }

    /// A constraint violation reported by a persistence driver.
    pub fn validation(sql_message: impl Into<String>) -> Self {
        Self::message(VALIDATION_SENTINEL).with_original(DriverError::sql(sql_message))
    }

    /// An unclassified failure: no status, no message, only a string form.
    pub fn opaque(value: impl fmt::Display) -> Self {
        Self { status: None, message: None, original: None, repr: value.to_string() }
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE)
    }

    pub fn timeout() -> Self {
        Self::new(StatusCode::GATEWAY_TIMEOUT, TIMEOUT_MESSAGE)
    }

    pub fn with_original(mut self, original: DriverError) -> Self {
        self.original = Some(original);
        self
    }

    pub fn status_code(&self) -> Option<StatusCode> {
        self.status
    }

    pub fn message_text(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn original(&self) -> Option<&DriverError> {
        self.original.as_ref()
    }

    /// The status sent to the client: the error's own, else `default`.
    pub fn effective_status(&self, default: StatusCode) -> StatusCode {
        self.status.unwrap_or(default)
    }

    /// The message sent to the client.
    ///
    /// The validation sentinel is replaced by the nested driver message. A
    /// missing message falls back to the string form.
    pub fn effective_message(&self) -> String {
        let message = match self.message.as_deref() {
            Some(VALIDATION_SENTINEL) => self.original.as_ref().and_then(|o| o.sql_message.as_deref()),
            other => other,
        };
        message.unwrap_or(&self.repr).to_owned()
    }

    /// The message written to the failure log, before sentinel unwrapping.
    pub(crate) fn log_message(&self) -> &str {
        self.message.as_deref().unwrap_or(&self.repr)
    }
}

fn status_code<S: Serializer>(status: &Option<StatusCode>, serializer: S) -> Result<S::Ok, S::Error> {
    match status {
        Some(status) => serializer.serialize_u16(status.as_u16()),
        None => serializer.serialize_none(),
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr)
    }
}

impl std::error::Error for ApiError {}

// ── Normalization ─────────────────────────────────────────────────────────────

impl From<StatusCode> for ApiError {
    fn from(status: StatusCode) -> Self {
        Self::status(status)
    }
}

/// A bare string is an unclassified failure: its text becomes the string form.
impl From<&str> for ApiError {
    fn from(value: &str) -> Self {
        Self::opaque(value)
    }
}

impl From<String> for ApiError {
    fn from(value: String) -> Self {
        Self::opaque(value)
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        Self::opaque(e)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::opaque(e)
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for ApiError {
    fn from(e: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::opaque(e)
    }
}

impl From<std::convert::Infallible> for ApiError {
    fn from(never: std::convert::Infallible) -> Self {
        match never {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: StatusCode = StatusCode::INTERNAL_SERVER_ERROR;

    #[test]
    fn explicit_status_is_respected() {
        let err = ApiError::new(StatusCode::FORBIDDEN, "forbidden");
        assert_eq!(err.effective_status(DEFAULT), StatusCode::FORBIDDEN);
        assert_eq!(err.effective_message(), "forbidden");
    }

    #[test]
    fn missing_status_uses_the_default() {
        let err = ApiError::message("kaput");
        assert_eq!(err.effective_status(DEFAULT), DEFAULT);
        assert_eq!(err.effective_status(StatusCode::BAD_GATEWAY), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn validation_sentinel_surfaces_the_driver_message() {
        let err = ApiError::validation("duplicate key");
        assert_eq!(err.message_text(), Some(VALIDATION_SENTINEL));
        assert_eq!(err.effective_message(), "duplicate key");
        assert_eq!(err.log_message(), VALIDATION_SENTINEL);
    }

    #[test]
    fn validation_sentinel_without_driver_message_keeps_string_form() {
        let err = ApiError::message(VALIDATION_SENTINEL).with_original(DriverError::default());
        assert_eq!(err.effective_message(), VALIDATION_SENTINEL);
    }

    #[test]
    fn opaque_values_fall_back_to_their_string_form() {
        let err = ApiError::from("boom");
        assert_eq!(err.status_code(), None);
        assert_eq!(err.message_text(), None);
        assert_eq!(err.effective_message(), "boom");
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn status_only_errors_carry_the_status_line() {
        let err = ApiError::from(StatusCode::CONFLICT);
        assert_eq!(err.effective_status(DEFAULT), StatusCode::CONFLICT);
        assert_eq!(err.effective_message(), "409 Conflict");
    }

    #[test]
    fn serializes_like_the_wire_error_object() {
        let err = ApiError::validation("duplicate key");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "message": "Validation error", "original": { "sqlMessage": "duplicate key" } })
        );

        let json = serde_json::to_value(ApiError::not_found()).unwrap();
        assert_eq!(json, serde_json::json!({ "status": 404, "message": "Entity not found" }));

        let json = serde_json::to_value(ApiError::opaque("boom")).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn io_errors_are_unclassified() {
        let err = ApiError::from(std::io::Error::other("disk on fire"));
        assert_eq!(err.effective_status(DEFAULT), DEFAULT);
        assert_eq!(err.effective_message(), "disk on fire");
    }
}
