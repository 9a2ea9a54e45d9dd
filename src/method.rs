//! HTTP method as a typed enum, and the four registration verbs.
//!
//! Covers the RFC 9110 standard methods. Requests carrying any other method
//! never match a route and are answered with `405 Method Not Allowed` when the
//! path exists, `404 Not Found` otherwise.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A known HTTP method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Connect,
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
    Trace,
}

impl Method {
    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Delete  => "DELETE",
            Self::Get     => "GET",
            Self::Head    => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch   => "PATCH",
            Self::Post    => "POST",
            Self::Put     => "PUT",
            Self::Trace   => "TRACE",
        }
    }
}

/// Parses an uppercase method string (e.g. `"GET"`). Case-sensitive per RFC 9110 §9.1.
impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" => Ok(Self::Connect),
            "DELETE"  => Ok(Self::Delete),
            "GET"     => Ok(Self::Get),
            "HEAD"    => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "PATCH"   => Ok(Self::Patch),
            "POST"    => Ok(Self::Post),
            "PUT"     => Ok(Self::Put),
            "TRACE"   => Ok(Self::Trace),
            _         => Err(()),
        }
    }
}

impl TryFrom<&http::Method> for Method {
    type Error = ();

    fn try_from(method: &http::Method) -> Result<Self, Self::Error> {
        method.as_str().parse()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Verb ──────────────────────────────────────────────────────────────────────

/// What a registered route does to its resource.
///
/// Each verb owns one HTTP method and one success status in the router's
/// [`StatusPolicy`](crate::StatusPolicy).
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    /// `GET`
    Read,
    /// `POST`
    Create,
    /// `PUT`
    Replace,
    /// `DELETE`
    Delete,
}

impl Verb {
    pub fn method(self) -> Method {
        match self {
            Self::Read    => Method::Get,
            Self::Create  => Method::Post,
            Self::Replace => Method::Put,
            Self::Delete  => Method::Delete,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read    => "read",
            Self::Create  => "create",
            Self::Replace => "replace",
            Self::Delete  => "delete",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names_case_sensitively() {
        assert_eq!("GET".parse::<Method>(), Ok(Method::Get));
        assert_eq!("OPTIONS".parse::<Method>(), Ok(Method::Options));
        assert!("get".parse::<Method>().is_err());
        assert!("PROPFIND".parse::<Method>().is_err());
    }

    #[test]
    fn converts_from_http_method() {
        assert_eq!(Method::try_from(&http::Method::DELETE), Ok(Method::Delete));
        let custom = http::Method::from_bytes(b"PURGE").unwrap();
        assert!(Method::try_from(&custom).is_err());
    }

    #[test]
    fn verbs_map_to_their_methods() {
        assert_eq!(Verb::Read.method(), Method::Get);
        assert_eq!(Verb::Create.method(), Method::Post);
        assert_eq!(Verb::Replace.method(), Method::Put);
        assert_eq!(Verb::Delete.method(), Method::Delete);
    }
}
