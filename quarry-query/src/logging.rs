//! Logging setup.
//!
//! The engine emits `tracing` events: compiled statements and cache
//! hits/misses at `debug`, degraded cache operations at `warn`. Installing a
//! subscriber is the application's choice; with the `tracing-subscriber`
//! feature, [`init`] installs one configured from the environment:
//!
//! - `QUARRY_DEBUG=true|1|yes` enables debug output
//! - `QUARRY_LOG_LEVEL=trace|debug|info|warn|error` overrides the level
//! - `QUARRY_LOG_FORMAT=json|pretty|compact` picks the format (default json)
//!
//! ```rust,no_run
//! quarry_query::logging::init();
//! ```

use std::sync::Once;

use crate::config::{EnvSource, StdEnvSource};

static INIT: Once = Once::new();

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line human output.
    Pretty,
    /// Single-line human output.
    Compact,
}

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// `QUARRY_DEBUG` was set.
    pub debug: bool,
    /// Explicit level, if `QUARRY_LOG_LEVEL` named a valid one.
    pub level: Option<&'static str>,
    /// Output format.
    pub format: LogFormat,
}

impl LogSettings {
    /// Read settings from an environment source.
    pub fn from_source(env: &dyn EnvSource) -> Self {
        let debug = env
            .get("QUARRY_DEBUG")
            .is_some_and(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"));
        let level = env.get("QUARRY_LOG_LEVEL").and_then(|l| {
            match l.to_lowercase().as_str() {
                "trace" => Some("trace"),
                "debug" => Some("debug"),
                "info" => Some("info"),
                "warn" => Some("warn"),
                "error" => Some("error"),
                _ => None,
            }
        });
        let format = match env.get("QUARRY_LOG_FORMAT").map(|f| f.to_lowercase()).as_deref() {
            Some("pretty") => LogFormat::Pretty,
            Some("compact") => LogFormat::Compact,
            _ => LogFormat::Json,
        };
        Self { debug, level, format }
    }

    /// Effective level: the explicit one, else `debug` when debugging, else
    /// `warn`.
    pub fn effective_level(&self) -> &'static str {
        self.level.unwrap_or(if self.debug { "debug" } else { "warn" })
    }

    /// Whether anything asked for log output.
    pub fn is_requested(&self) -> bool {
        self.debug || self.level.is_some()
    }
}

/// Whether `QUARRY_DEBUG` is enabled in the process environment.
pub fn is_debug_enabled() -> bool {
    LogSettings::from_source(&StdEnvSource).debug
}

/// Install a subscriber configured from the process environment.
///
/// Only the first call has an effect, and only when `QUARRY_DEBUG` or
/// `QUARRY_LOG_LEVEL` is set. Without the `tracing-subscriber` feature this
/// does nothing.
pub fn init() {
    init_with(LogSettings::from_source(&StdEnvSource));
}

/// Install a subscriber with explicit settings.
pub fn init_with(settings: LogSettings) {
    INIT.call_once(|| {
        if !settings.is_requested() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = settings.effective_level();
            let filter = EnvFilter::try_new(format!("quarry={},quarry_query={}", level, level))
                .unwrap_or_else(|_| EnvFilter::new("warn"));

            let registry = tracing_subscriber::registry().with(filter);
            let installed = match settings.format {
                LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
                LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
                LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
            };

            if installed.is_ok() {
                tracing::info!(level = level, format = ?settings.format, "quarry logging initialized");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapEnvSource;

    #[test]
    fn test_defaults_are_quiet() {
        let settings = LogSettings::from_source(&MapEnvSource::new());
        assert!(!settings.is_requested());
        assert_eq!(settings.effective_level(), "warn");
        assert_eq!(settings.format, LogFormat::Json);
    }

    #[test]
    fn test_debug_and_overrides() {
        let env = MapEnvSource::new()
            .set("QUARRY_DEBUG", "1")
            .set("QUARRY_LOG_FORMAT", "Compact");
        let settings = LogSettings::from_source(&env);
        assert_eq!(settings.effective_level(), "debug");
        assert_eq!(settings.format, LogFormat::Compact);

        let env = MapEnvSource::new().set("QUARRY_LOG_LEVEL", "INFO");
        assert_eq!(LogSettings::from_source(&env).effective_level(), "info");

        let env = MapEnvSource::new().set("QUARRY_LOG_LEVEL", "loud");
        assert!(!LogSettings::from_source(&env).is_requested());
    }
}
