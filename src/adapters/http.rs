//! HTTP search adapter.
//!
//! Sends `GET {endpoint}?{query_param}={query}` and decodes a JSON payload of
//! either shape:
//!
//! ```text
//!   {"results": [{"url": "...", "text": "...", "title": "..."}, ...]}
//!   [{"url": "...", "text": "..."}, ...]
//! ```
//!
//! Normalization: `text` falls back to `title`, then to `""`. Entries with no
//! usable `url` are dropped. Emission order is kept.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adapter::{Adapter, TransportError};
use crate::error::ContractResult;
use crate::search::{ResultSet, SearchCapability, SearchQuery, SearchResult};

fn default_query_param() -> String {
    "q".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_user_agent() -> String {
    concat!("boundary-contract/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Settings for [`HttpSearchAdapter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSearchConfig {
    /// Search endpoint URL.
    pub endpoint: String,
    /// Query-string parameter carrying the query text.
    #[serde(default = "default_query_param")]
    pub query_param: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Extra headers sent with every request (auth, tracing, etc.).
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// `User-Agent` header value.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl HttpSearchConfig {
    /// Config for `endpoint` with defaults for everything else.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            query_param: default_query_param(),
            timeout_ms: default_timeout_ms(),
            headers: HashMap::new(),
            user_agent: default_user_agent(),
        }
    }

    /// Override the request timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Override the query-string parameter name.
    pub fn with_query_param(mut self, param: impl Into<String>) -> Self {
        self.query_param = param.into();
        self
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Search over an HTTP endpoint.
///
/// Owns a pooled [`reqwest::Client`] built at construction; dropping the
/// adapter closes its connections. After shutdown no request is sent.
#[derive(Debug)]
pub struct HttpSearchAdapter {
    client: Client,
    config: HttpSearchConfig,
    closed: AtomicBool,
}

impl HttpSearchAdapter {
    /// Build the adapter and its HTTP client.
    pub fn new(config: HttpSearchConfig) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Config(format!("header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::Config(format!("header value for {name}: {e}")))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        debug!(
            endpoint = %config.endpoint,
            timeout_ms = config.timeout_ms,
            "http search adapter ready"
        );

        Ok(Self {
            client,
            config,
            closed: AtomicBool::new(false),
        })
    }

    /// Adapter settings.
    pub fn config(&self) -> &HttpSearchConfig {
        &self.config
    }

    async fn fetch(&self, query: &SearchQuery) -> Result<ResultSet, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let timeout_ms = self.config.timeout_ms;
        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[(self.config.query_param.as_str(), query.text())])
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(e, timeout_ms))?;
        decode_payload(&body)
    }
}

#[async_trait]
impl Adapter<SearchCapability> for HttpSearchAdapter {
    fn name(&self) -> &str {
        "http-search"
    }

    async fn invoke(&self, input: &SearchQuery) -> ContractResult<ResultSet> {
        let results = self
            .fetch(input)
            .await
            .map_err(TransportError::into_contract::<SearchCapability>)?;
        debug!(
            endpoint = %self.config.endpoint,
            results = results.len(),
            "http search completed"
        );
        Ok(results)
    }

    async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        debug!(endpoint = %self.config.endpoint, "http search adapter shut down");
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WirePayload {
    Envelope { results: Vec<WireResult> },
    Bare(Vec<WireResult>),
}

#[derive(Debug, Deserialize)]
struct WireResult {
    url: Option<String>,
    text: Option<String>,
    title: Option<String>,
}

/// Decode a raw response body into a normalized [`ResultSet`].
pub(crate) fn decode_payload(body: &[u8]) -> Result<ResultSet, TransportError> {
    let entries = match serde_json::from_slice::<WirePayload>(body) {
        Ok(WirePayload::Envelope { results }) | Ok(WirePayload::Bare(results)) => results,
        Err(err) => return Err(TransportError::Decode(err.to_string())),
    };

    let mut dropped = 0usize;
    let results: ResultSet = entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry.url.map(|u| u.trim().to_string()).unwrap_or_default();
            if url.is_empty() {
                dropped += 1;
                return None;
            }
            let text = entry.text.or(entry.title).unwrap_or_default();
            Some(SearchResult { url, text })
        })
        .collect();

    if dropped > 0 {
        warn!(dropped, "dropped search results without a url");
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_envelope() {
        let body = br#"{"results": [
            {"url": "a.com", "text": "A"},
            {"url": "b.com", "title": "B"},
            {"url": "c.com"}
        ]}"#;

        let results = decode_payload(body).unwrap();
        assert_eq!(
            results.into_vec(),
            vec![
                SearchResult::new("a.com", "A"),
                SearchResult::new("b.com", "B"),
                SearchResult::new("c.com", ""),
            ]
        );
    }

    #[test]
    fn test_decode_bare_array() {
        let results = decode_payload(br#"[{"url": "a.com", "text": "A"}]"#).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_decode_drops_entries_without_url() {
        let body = br#"[{"text": "orphan"}, {"url": "  ", "text": "blank"}, {"url": "a.com", "text": null}]"#;
        let results = decode_payload(body).unwrap();
        assert_eq!(results.into_vec(), vec![SearchResult::new("a.com", "")]);
    }

    #[test]
    fn test_decode_rejects_malformed_body() {
        let err = decode_payload(b"<html>oops</html>").unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));

        let err = decode_payload(br#"{"hits": []}"#).unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config: HttpSearchConfig =
            serde_json::from_value(serde_json::json!({"endpoint": "http://localhost/search"}))
                .unwrap();
        assert_eq!(config.query_param, "q");
        assert_eq!(config.timeout_ms, 10_000);
        assert!(config.user_agent.starts_with("boundary-contract/"));
    }

    #[tokio::test]
    async fn test_no_request_after_shutdown() {
        let adapter = HttpSearchAdapter::new(HttpSearchConfig::new("http://127.0.0.1:9/search")).unwrap();
        adapter.shutdown().await;

        let err = adapter.invoke(&SearchQuery::new("sausages")).await.unwrap_err();
        assert_eq!(
            err,
            crate::error::ContractError::unavailable("search", "adapter shut down")
        );
    }

    #[test]
    fn test_invalid_header_is_config_error() {
        let config = HttpSearchConfig::new("http://localhost").with_header("bad header", "x");
        let err = HttpSearchAdapter::new(config).unwrap_err();
        assert!(matches!(err, TransportError::Config(_)));
    }
}
