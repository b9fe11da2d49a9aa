//! Tracing subscriber setup.
//!
//! Library code only emits `tracing` events. Binaries call [`init_tracing`]
//! once at startup, next to where they build the composition root.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

fn default_level() -> String {
    "info".to_string()
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or
    /// `boundary_contract=debug`.
    #[serde(default = "default_level")]
    pub level: String,
    /// Line format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingSettings {
    /// Filter from `RUST_LOG`, falling back to the configured level.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new(default_level()))
    }
}

/// Install a global subscriber. Returns `false` if one was already set.
pub fn init_tracing(settings: &LoggingSettings) -> bool {
    let builder = tracing_subscriber::fmt().with_env_filter(settings.env_filter());
    let installed = match settings.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.is_ok()
}
