//! Test doubles for the search capability.
//!
//! [`FakeSearchAdapter`] performs no I/O. Bind it at the composition root in
//! place of a real adapter to exercise Domain Callers deterministically.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use crate::adapter::{Adapter, TransportError};
use crate::error::ContractResult;
use crate::search::{ResultSet, SearchCapability, SearchQuery, SearchResult};

type FailureFactory = Arc<dyn Fn() -> TransportError + Send + Sync>;

/// In-memory search adapter with canned responses.
///
/// - Unknown queries return an empty [`ResultSet`].
/// - [`fail_with`](Self::fail_with) makes every call fail at the transport
///   level; [`failures_before_success`](Self::failures_before_success) limits
///   that to the first `n` calls.
/// - Calls are counted, including failed ones.
/// - After [`shutdown`](Adapter::shutdown) every call fails, like a real
///   adapter.
#[derive(Clone, Default)]
pub struct FakeSearchAdapter {
    responses: FxHashMap<String, ResultSet>,
    failure: Option<FailureFactory>,
    failures_remaining: Option<Arc<AtomicUsize>>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    shutdowns: Arc<AtomicUsize>,
}

impl FakeSearchAdapter {
    /// Create a fake with no canned responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `query` with `results`, in the given order.
    pub fn with_response(
        mut self,
        query: impl Into<String>,
        results: impl IntoIterator<Item = SearchResult>,
    ) -> Self {
        self.responses
            .insert(query.into(), results.into_iter().collect());
        self
    }

    /// Fail every call with the transport error built by `failure`.
    pub fn fail_with(
        mut self,
        failure: impl Fn() -> TransportError + Send + Sync + 'static,
    ) -> Self {
        self.failure = Some(Arc::new(failure));
        self
    }

    /// Only the first `n` calls fail; later calls succeed.
    pub fn failures_before_success(mut self, n: usize) -> Self {
        self.failures_remaining = Some(Arc::new(AtomicUsize::new(n)));
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `invoke` calls seen so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of `shutdown` calls seen so far.
    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    fn next_failure(&self) -> Option<TransportError> {
        let failure = self.failure.as_ref()?;
        match &self.failures_remaining {
            None => Some(failure()),
            Some(remaining) => remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .ok()
                .map(|_| failure()),
        }
    }
}

impl std::fmt::Debug for FakeSearchAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeSearchAdapter")
            .field("responses", &self.responses.len())
            .field("fails", &self.failure.is_some())
            .field("calls", &self.calls())
            .finish()
    }
}

#[async_trait]
impl Adapter<SearchCapability> for FakeSearchAdapter {
    fn name(&self) -> &str {
        "fake-search"
    }

    async fn invoke(&self, input: &SearchQuery) -> ContractResult<ResultSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.shutdowns() > 0 {
            return Err(TransportError::Closed.into_contract::<SearchCapability>());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.next_failure() {
            return Err(err.into_contract::<SearchCapability>());
        }
        Ok(self
            .responses
            .get(input.text())
            .cloned()
            .unwrap_or_default())
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Adapter that records every query it was asked, for asserting call order.
#[derive(Debug, Default)]
pub struct RecordingSearchAdapter {
    seen: Mutex<Vec<String>>,
}

impl RecordingSearchAdapter {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queries seen so far, oldest first.
    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Adapter<SearchCapability> for RecordingSearchAdapter {
    fn name(&self) -> &str {
        "recording-search"
    }

    async fn invoke(&self, input: &SearchQuery) -> ContractResult<ResultSet> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(input.text().to_string());
        }
        let echo = SearchResult::new(format!("echo://{}", input.text()), input.text());
        Ok(ResultSet::from(vec![echo]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContractError;

    #[tokio::test]
    async fn test_canned_response() {
        let fake = FakeSearchAdapter::new().with_response("sausages", [SearchResult::new("a.com", "A")]);

        let results = fake.invoke(&SearchQuery::new("sausages")).await.unwrap();
        assert_eq!(results.into_vec(), vec![SearchResult::new("a.com", "A")]);

        let results = fake.invoke(&SearchQuery::new("kale")).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn test_failures_before_success() {
        let fake = FakeSearchAdapter::new()
            .with_response("q", [SearchResult::new("a.com", "A")])
            .fail_with(|| TransportError::Connection("reset by peer".into()))
            .failures_before_success(2);
        let query = SearchQuery::new("q");

        for _ in 0..2 {
            let err = fake.invoke(&query).await.unwrap_err();
            assert!(matches!(err, ContractError::CapabilityUnavailable { .. }));
        }
        assert_eq!(fake.invoke(&query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_recording_adapter() {
        let recorder = RecordingSearchAdapter::new();
        recorder.invoke(&SearchQuery::new(" first ")).await.unwrap();
        recorder.invoke(&SearchQuery::new("second")).await.unwrap();
        assert_eq!(recorder.seen(), ["first", "second"]);
    }
}
