//! Status policy and per-router settings.
//!
//! The mapping from verb to success status is data, not code: every
//! [`Router`](crate::Router) carries its own [`RouteSettings`] and each route
//! captures the policy in force at the moment it is registered.
//!
//! | verb | default success status |
//! |---|---|
//! | read (`GET`) | 200 |
//! | create (`POST`) | 201 |
//! | replace (`PUT`) | 201 |
//! | delete (`DELETE`) | 201 |
//!
//! `PUT` and `DELETE` answering `201 Created` is an inherited default kept for
//! compatibility with existing clients. Override it per router when `200` or
//! `204` is wanted:
//!
//! ```rust
//! use ferry::{StatusPolicy, Verb};
//! use http::StatusCode;
//!
//! let policy = StatusPolicy::default()
//!     .with_success(Verb::Replace, StatusCode::OK)
//!     .with_success(Verb::Delete, StatusCode::NO_CONTENT);
//! assert_eq!(policy.success(Verb::Delete), StatusCode::NO_CONTENT);
//! ```

use std::time::Duration;

use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::method::Verb;

/// Verb → success status table, plus the statuses used when a failure
/// carries none of its own.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StatusPolicy {
    read: StatusCode,
    create: StatusCode,
    replace: StatusCode,
    delete: StatusCode,
    error: StatusCode,
    download_error: StatusCode,
}

impl StatusPolicy {
    pub fn success(&self, verb: Verb) -> StatusCode {
        match verb {
            Verb::Read    => self.read,
            Verb::Create  => self.create,
            Verb::Replace => self.replace,
            Verb::Delete  => self.delete,
        }
    }

    pub fn with_success(mut self, verb: Verb, status: StatusCode) -> Self {
        let slot = match verb {
            Verb::Read    => &mut self.read,
            Verb::Create  => &mut self.create,
            Verb::Replace => &mut self.replace,
            Verb::Delete  => &mut self.delete,
        };
        *slot = status;
        self
    }

    /// Status of a failed JSON route whose error names no status.
    pub fn error(&self) -> StatusCode {
        self.error
    }

    pub fn with_error(mut self, status: StatusCode) -> Self {
        self.error = status;
        self
    }

    /// Status of a failed download whose error names no status.
    pub fn download_error(&self) -> StatusCode {
        self.download_error
    }

    pub fn with_download_error(mut self, status: StatusCode) -> Self {
        self.download_error = status;
        self
    }
}

impl Default for StatusPolicy {
    fn default() -> Self {
        Self {
            read: StatusCode::OK,
            create: StatusCode::CREATED,
            replace: StatusCode::CREATED,
            delete: StatusCode::CREATED,
            error: StatusCode::INTERNAL_SERVER_ERROR,
            download_error: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// How a failed request is written to the log.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorLogFormat {
    /// Three error events: `"<status> :: <message>"`, the error as JSON, and
    /// the error's string form.
    #[default]
    Verbose,
    /// One error event with `status`, `reason` and `error` fields.
    Compact,
}

/// Everything a failing route needs to build its response.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ErrorPolicy {
    pub default_status: StatusCode,
    pub log: ErrorLogFormat,
}

/// Settings captured by every route at registration time.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RouteSettings {
    pub policy: StatusPolicy,
    pub error_log: ErrorLogFormat,
    /// Upper bound on a business function's run time. `None` waits forever.
    pub handler_timeout: Option<Duration>,
}

impl RouteSettings {
    pub(crate) fn json_errors(&self) -> ErrorPolicy {
        ErrorPolicy { default_status: self.policy.error(), log: self.error_log }
    }

    pub(crate) fn download_errors(&self) -> ErrorPolicy {
        ErrorPolicy { default_status: self.policy.download_error(), log: self.error_log }
    }
}
