//! Service configuration.
//!
//! Every section and key is optional; a missing file section falls back to
//! the defaults below.
//!
//! ```toml
//! [server]
//! addr = "0.0.0.0:3000"
//! body_limit = 10485760
//!
//! [routes]
//! error_status = 500
//! download_error_status = 500
//! error_log = "verbose"        # or "compact"
//! handler_timeout_ms = 30000   # unset: wait forever
//! method_override = false      # honor X-HTTP-Method-Override on POST
//!
//! [routes.success]
//! read = 200
//! create = 201
//! replace = 201
//! delete = 201
//!
//! [log]
//! level = "info"               # RUST_LOG wins when set; "warning" and "log" also work
//!
//! [cors]
//! allow_origin = "*"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use http::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::method::Verb;
use crate::middleware::CorsConfig;
use crate::policy::{ErrorLogFormat, RouteSettings, StatusPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration syntax: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub routes: RoutesConfig,
    pub log: LogConfig,
    pub cors: CorsConfig,
}

impl Config {
    /// Reads and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_owned(), source })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.body_limit == 0 {
            return Err(ConfigError::Invalid("server.body_limit must be greater than zero".to_owned()));
        }
        self.routes.settings()?;
        if self.routes.handler_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid("routes.handler_timeout_ms must be greater than zero".to_owned()));
        }
        tracing_subscriber::EnvFilter::try_new(crate::telemetry::directive(&self.log.level))
            .map_err(|e| ConfigError::Invalid(format!("log.level = {:?}: {e}", self.log.level)))?;
        self.cors
            .headers()
            .map_err(|e| ConfigError::Invalid(format!("cors: {e}")))?;
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Largest accepted request body, in bytes.
    pub body_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            body_limit: 10 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RoutesConfig {
    pub success: SuccessTable,
    pub error_status: u16,
    pub download_error_status: u16,
    pub error_log: ErrorLogFormat,
    pub handler_timeout_ms: Option<u64>,
    pub method_override: bool,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            success: SuccessTable::default(),
            error_status: 500,
            download_error_status: 500,
            error_log: ErrorLogFormat::default(),
            handler_timeout_ms: None,
            method_override: false,
        }
    }
}

impl RoutesConfig {
    /// Builds the settings handed to [`Router::with_settings`](crate::Router::with_settings).
    pub fn settings(&self) -> Result<RouteSettings, ConfigError> {
        let mut policy = StatusPolicy::default()
            .with_error(status_in("routes.error_status", self.error_status, 400..=599)?)
            .with_download_error(status_in("routes.download_error_status", self.download_error_status, 400..=599)?);
        for (verb, code) in self.success.entries() {
            let key = format!("routes.success.{verb}");
            policy = policy.with_success(verb, status_in(&key, code, 200..=299)?);
        }

        Ok(RouteSettings {
            policy,
            error_log: self.error_log,
            handler_timeout: self.handler_timeout_ms.map(Duration::from_millis),
        })
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SuccessTable {
    pub read: u16,
    pub create: u16,
    pub replace: u16,
    pub delete: u16,
}

impl Default for SuccessTable {
    fn default() -> Self {
        Self { read: 200, create: 201, replace: 201, delete: 201 }
    }
}

impl SuccessTable {
    fn entries(&self) -> [(Verb, u16); 4] {
        [
            (Verb::Read, self.read),
            (Verb::Create, self.create),
            (Verb::Replace, self.replace),
            (Verb::Delete, self.delete),
        ]
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// An `EnvFilter` directive, e.g. `info` or `ferry=debug,warn`. The
    /// level names `warning` and `log` map to `warn` and `info`.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_owned() }
    }
}

fn status_in(key: &str, code: u16, range: std::ops::RangeInclusive<u16>) -> Result<StatusCode, ConfigError> {
    if !range.contains(&code) {
        return Err(ConfigError::Invalid(format!(
            "{key} = {code} is outside {}..={}",
            range.start(),
            range.end()
        )));
    }
    StatusCode::from_u16(code).map_err(|e| ConfigError::Invalid(format!("{key} = {code}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_means_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.addr.port(), 3000);
        assert_eq!(config.server.body_limit, 10 * 1024 * 1024);
        assert_eq!(config.routes.settings().unwrap(), RouteSettings::default());
    }

    #[test]
    fn overrides_flow_into_route_settings() {
        let config = Config::from_toml(
            r#"
            [routes]
            error_status = 502
            error_log = "compact"
            handler_timeout_ms = 1500

            [routes.success]
            delete = 204
            "#,
        )
        .unwrap();

        let settings = config.routes.settings().unwrap();
        assert_eq!(settings.policy.success(Verb::Delete), StatusCode::NO_CONTENT);
        assert_eq!(settings.policy.success(Verb::Replace), StatusCode::CREATED);
        assert_eq!(settings.policy.error(), StatusCode::BAD_GATEWAY);
        assert_eq!(settings.policy.download_error(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(settings.error_log, ErrorLogFormat::Compact);
        assert_eq!(settings.handler_timeout, Some(Duration::from_millis(1500)));
    }

    #[test]
    fn rejects_out_of_range_statuses() {
        let err = Config::from_toml("[routes.success]\ncreate = 404").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("routes.success.create")), "{err}");

        let err = Config::from_toml("[routes]\nerror_status = 200").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)), "{err}");
    }

    #[test]
    fn rejects_unknown_keys_and_bad_syntax() {
        assert!(matches!(Config::from_toml("[server]\nport = 80"), Err(ConfigError::Parse(_))));
        assert!(matches!(Config::from_toml("[server"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn rejects_cors_values_that_cannot_be_headers() {
        let err = Config::from_toml("[cors]\nallow_origin = \"a\\nb\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.starts_with("cors")), "{err}");
    }

    #[test]
    fn rejects_unparsable_log_levels() {
        let err = Config::from_toml("[log]\nlevel = \"ferry=loud\"").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.starts_with("log.level")), "{err}");
    }

    #[test]
    fn accepts_legacy_level_names() {
        let config = Config::from_toml("[log]\nlevel = \"warning\"\n[routes]\nmethod_override = true").unwrap();
        assert_eq!(config.log.level, "warning");
        assert!(config.routes.method_override);
        assert!(Config::from_toml("[log]\nlevel = \"log\"").is_ok());
    }

    #[test]
    fn missing_file_reports_the_path() {
        let err = Config::load("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
