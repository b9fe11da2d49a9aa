//! Runtime settings.
//!
//! Loaded from an optional TOML file, then overridden by environment
//! variables prefixed `BOUNDARY`, with `__` separating nested keys:
//!
//! ```text
//!   BOUNDARY__SEARCH__ADAPTER=http
//!   BOUNDARY__SEARCH__ENDPOINT=https://search.example/api
//!   BOUNDARY__RETRY__MAX_ATTEMPTS=5
//!   BOUNDARY__LOGGING__FORMAT=json
//! ```
//!
//! A relative file-adapter `path` is taken relative to the settings file.

use std::path::Path;

use ::config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::adapters::{FileSearchConfig, HttpSearchConfig};
use crate::logging::LoggingSettings;
use crate::service::RetryPolicy;

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Which adapter serves the search capability.
    pub search: SearchAdapterSettings,
    /// Domain-side retry and fallback policy.
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Adapter selection for the search capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "adapter", rename_all = "lowercase")]
pub enum SearchAdapterSettings {
    /// [`HttpSearchAdapter`](crate::adapters::HttpSearchAdapter).
    Http(HttpSearchConfig),
    /// [`FileSearchAdapter`](crate::adapters::FileSearchAdapter).
    File(FileSearchConfig),
}

impl SearchAdapterSettings {
    fn resolve_relative_to(&mut self, base: &Path) {
        if let Self::File(file) = self {
            if file.path.is_relative() {
                file.path = base.join(&file.path);
            }
        }
    }
}

impl Settings {
    /// Load settings from `path` (if it exists) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }
        let mut settings: Self = builder
            .add_source(
                Environment::with_prefix("BOUNDARY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        if let Some(base) = path.and_then(Path::parent) {
            settings.search.resolve_relative_to(base);
        }
        Ok(settings)
    }

    /// Parse settings from a TOML string. Environment is not consulted.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(contents, ::config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::logging::LogFormat;

    #[test]
    fn test_http_settings() {
        let settings = Settings::from_toml(
            r#"
            [search]
            adapter = "http"
            endpoint = "https://search.example/api"
            timeout_ms = 2500

            [search.headers]
            x-api-key = "secret"

            [retry]
            max_attempts = 4

            [logging]
            level = "debug"
            format = "json"
            "#,
        )
        .unwrap();

        let SearchAdapterSettings::Http(http) = &settings.search else {
            panic!("expected http adapter, got {:?}", settings.search);
        };
        assert_eq!(http.endpoint, "https://search.example/api");
        assert_eq!(http.timeout_ms, 2500);
        assert_eq!(http.query_param, "q");
        assert_eq!(http.headers.get("x-api-key").map(String::as_str), Some("secret"));
        assert_eq!(settings.retry.max_attempts, 4);
        assert_eq!(settings.retry.backoff_ms, 100);
        assert_eq!(settings.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_file_settings_with_defaults() {
        let settings = Settings::from_toml(
            r#"
            [search]
            adapter = "file"
            path = "corpus.json"
            "#,
        )
        .unwrap();

        assert_eq!(
            settings.search,
            SearchAdapterSettings::File(FileSearchConfig::new(PathBuf::from("corpus.json")))
        );
        assert_eq!(settings.retry, RetryPolicy::default());
        assert_eq!(settings.logging, LoggingSettings::default());
    }

    #[test]
    fn test_unknown_adapter_rejected() {
        let result = Settings::from_toml(
            r#"
            [search]
            adapter = "carrier-pigeon"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boundary.toml");
        std::fs::write(&path, "[search]\nadapter = \"file\"\npath = \"data.json\"\n").unwrap();

        let settings = Settings::load(Some(path.as_path())).unwrap();
        assert_eq!(
            settings.search,
            SearchAdapterSettings::File(FileSearchConfig::new(dir.path().join("data.json")))
        );
    }

    #[test]
    fn test_absolute_corpus_path_kept() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("elsewhere").join("corpus.json");
        let path = dir.path().join("boundary.toml");
        std::fs::write(
            &path,
            format!("[search]\nadapter = \"file\"\npath = {:?}\n", corpus.display().to_string()),
        )
        .unwrap();

        let settings = Settings::load(Some(path.as_path())).unwrap();
        assert_eq!(
            settings.search,
            SearchAdapterSettings::File(FileSearchConfig::new(corpus))
        );
    }
}
