//! File-backed search adapter.
//!
//! Serves the search capability from a JSON corpus on disk:
//!
//! ```text
//!   [{"url": "a.com", "text": "A"}, ...]
//! ```
//!
//! An entry matches when its `url` or `text` contains the query,
//! case-insensitively. Matches keep corpus order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::adapter::{Adapter, TransportError};
use crate::error::ContractResult;
use crate::search::{ResultSet, SearchCapability, SearchQuery, SearchResult};

/// Settings for [`FileSearchAdapter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSearchConfig {
    /// Path to the JSON corpus.
    pub path: PathBuf,
    /// Cap on returned results.
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl FileSearchConfig {
    /// Config for the corpus at `path`, uncapped.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_results: None,
        }
    }

    /// Cap the number of results per query.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }
}

#[derive(Debug, Deserialize)]
struct CorpusEntry {
    url: String,
    #[serde(default)]
    text: String,
}

/// Search over a JSON corpus file.
///
/// The corpus is read on first use and cached until shutdown. A failed read
/// is not cached, so the next call tries again. After shutdown the cache is
/// dropped and every call fails.
#[derive(Debug)]
pub struct FileSearchAdapter {
    config: FileSearchConfig,
    corpus: RwLock<Option<Arc<Vec<SearchResult>>>>,
    closed: AtomicBool,
}

impl FileSearchAdapter {
    /// Create an adapter. No I/O happens until the first invocation.
    pub fn new(config: FileSearchConfig) -> Self {
        Self {
            config,
            corpus: RwLock::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Corpus path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    async fn corpus(&self) -> Result<Arc<Vec<SearchResult>>, TransportError> {
        if let Some(corpus) = self.corpus.read().await.as_ref() {
            return Ok(Arc::clone(corpus));
        }

        let mut slot = self.corpus.write().await;
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if let Some(corpus) = slot.as_ref() {
            return Ok(Arc::clone(corpus));
        }
        let corpus = Arc::new(load_corpus(&self.config.path).await?);
        *slot = Some(Arc::clone(&corpus));
        Ok(corpus)
    }

    async fn search(&self, query: &SearchQuery) -> Result<ResultSet, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let needle = query.text().to_lowercase();
        let limit = self.config.max_results.unwrap_or(usize::MAX);

        let results = self
            .corpus()
            .await?
            .iter()
            .filter(|entry| {
                entry.text.to_lowercase().contains(&needle)
                    || entry.url.to_lowercase().contains(&needle)
            })
            .take(limit)
            .cloned()
            .collect();
        Ok(results)
    }
}

async fn load_corpus(path: &Path) -> Result<Vec<SearchResult>, TransportError> {
    let bytes = tokio::fs::read(path).await?;
    let entries: Vec<CorpusEntry> = serde_json::from_slice(&bytes)?;

    if let Some(index) = entries.iter().position(|e| e.url.trim().is_empty()) {
        return Err(TransportError::Decode(format!(
            "corpus entry {index} has an empty url"
        )));
    }

    info!(path = %path.display(), entries = entries.len(), "loaded search corpus");
    Ok(entries
        .into_iter()
        .map(|e| SearchResult::new(e.url.trim(), e.text))
        .collect())
}

#[async_trait]
impl Adapter<SearchCapability> for FileSearchAdapter {
    fn name(&self) -> &str {
        "file-search"
    }

    async fn invoke(&self, input: &SearchQuery) -> ContractResult<ResultSet> {
        let results = self
            .search(input)
            .await
            .map_err(TransportError::into_contract::<SearchCapability>)?;
        debug!(
            path = %self.config.path.display(),
            results = results.len(),
            "file search completed"
        );
        Ok(results)
    }

    async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let released = self.corpus.write().await.take();
        info!(
            path = %self.config.path.display(),
            entries = released.map_or(0, |corpus| corpus.len()),
            "file search adapter shut down"
        );
    }
}
