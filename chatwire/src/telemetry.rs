//! Log subscriber setup.
//!
//! Library code only emits `tracing` events. Applications that do not install
//! their own subscriber can call [`init_tracing`].

use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

/// Filter directives, e.g. `chatwire_providers=debug,info`.
pub const LOG_ENV: &str = "CHATWIRE_LOG";

/// Output format: `json` or `pretty` (the default).
pub const LOG_FORMAT_ENV: &str = "CHATWIRE_LOG_FORMAT";

const DEFAULT_FILTER: &str = "info";

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Read [`LOG_FORMAT_ENV`]; anything but `json` selects [`LogFormat::Pretty`].
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var(LOG_FORMAT_ENV) {
            Ok(value) if value.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Install a global subscriber filtered by [`LOG_ENV`] (default `info`).
///
/// Safe to call more than once. Returns `false` if another subscriber was
/// already installed, in which case that one stays in effect.
pub fn init_tracing() -> bool {
    init_tracing_with(LogFormat::from_env())
}

/// As [`init_tracing`], with an explicit format.
pub fn init_tracing_with(format: LogFormat) -> bool {
    static INSTALLED: OnceLock<bool> = OnceLock::new();
    *INSTALLED.get_or_init(|| {
        let filter =
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        match format {
            LogFormat::Pretty => builder.try_init().is_ok(),
            LogFormat::Json => builder.json().try_init().is_ok(),
        }
    })
}
