//! Logging initialization.

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Installs the process-wide `fmt` subscriber.
///
/// `RUST_LOG` wins over `config.level` when set and valid. Safe to call more
/// than once; later calls are no-ops.
pub fn init(config: &LogConfig) {
    let filter = filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(), &config.level);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn filter(env: Option<&str>, level: &str) -> EnvFilter {
    env.and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(directive(level)).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Accepts the `warning` and `log` level names next to the `EnvFilter` ones.
pub(crate) fn directive(level: &str) -> &str {
    match level.trim() {
        l if l.eq_ignore_ascii_case("warning") => "warn",
        l if l.eq_ignore_ascii_case("log") => "info",
        _ => level,
    }
}
