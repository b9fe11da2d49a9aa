//! Search business rules, expressed only against the search contract.
//!
//! [`SearchService`] decides what to do when the capability is unavailable:
//! retry with doubling backoff, then fall back to the last good answer for the
//! same query if the policy allows it. Input errors are never retried.
//!
//! The fallback cache holds at most `max_cached_queries` entries; the oldest
//! entry is evicted first.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::contract::Contract;
use crate::error::{ContractError, ContractResult};
use crate::search::{ResultSet, SearchCapability, SearchQuery, SearchResult};

/// How [`SearchService`] reacts to `CapabilityUnavailable`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per query, including the first. Zero behaves as one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles after each retry.
    pub backoff_ms: u64,
    /// Serve the last successful result for a query when all attempts fail.
    pub use_cached_fallback: bool,
    /// Per-attempt time limit.
    pub timeout_ms: Option<u64>,
    /// Distinct queries kept for fallback. Zero disables the cache.
    pub max_cached_queries: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 100,
            use_cached_fallback: true,
            timeout_ms: None,
            max_cached_queries: 256,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no fallback.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: 0,
            use_cached_fallback: false,
            timeout_ms: None,
            max_cached_queries: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedResults {
    results: ResultSet,
    fetched_at: DateTime<Utc>,
}

/// Last good answer per query, oldest first in `order`.
#[derive(Debug, Default)]
struct FallbackCache {
    entries: FxHashMap<String, CachedResults>,
    order: VecDeque<String>,
}

impl FallbackCache {
    fn insert(&mut self, query: &str, results: &ResultSet, capacity: usize) {
        if capacity == 0 {
            return;
        }
        if self.entries.contains_key(query) {
            self.order.retain(|key| key != query);
        }
        while self.order.len() >= capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
            debug!(query = %oldest, "evicted cached search results");
        }
        self.entries.insert(
            query.to_string(),
            CachedResults {
                results: results.clone(),
                fetched_at: Utc::now(),
            },
        );
        self.order.push_back(query.to_string());
    }

    fn get(&self, query: &str) -> Option<CachedResults> {
        self.entries.get(query).cloned()
    }
}

/// Domain Caller for the search capability.
///
/// Cloning shares the contract and the fallback cache.
#[derive(Debug, Clone)]
pub struct SearchService {
    search: Contract<SearchCapability>,
    policy: RetryPolicy,
    cache: Arc<Mutex<FallbackCache>>,
}

impl SearchService {
    /// Create a service with the default [`RetryPolicy`].
    pub fn new(search: Contract<SearchCapability>) -> Self {
        Self {
            search,
            policy: RetryPolicy::default(),
            cache: Arc::default(),
        }
    }

    /// Replace the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Current retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Search for `query`.
    pub async fn search(&self, query: &str) -> ContractResult<ResultSet> {
        let query = SearchQuery::new(query);
        match self.search_with_retry(&query).await {
            Ok(results) => {
                self.remember(&query, &results);
                Ok(results)
            }
            Err(err) if err.is_retryable() && self.policy.use_cached_fallback => {
                match self.cached(&query) {
                    Some(cached) => {
                        let age = Utc::now() - cached.fetched_at;
                        warn!(
                            query = query.text(),
                            age_secs = age.num_seconds(),
                            error = %err,
                            "search unavailable, serving cached results"
                        );
                        Ok(cached.results)
                    }
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Top result for `query`, if any.
    pub async fn first_hit(&self, query: &str) -> ContractResult<Option<SearchResult>> {
        Ok(self.search(query).await?.into_iter().next())
    }

    /// Run every query concurrently. Results come back in input order.
    pub async fn search_all(&self, queries: &[&str]) -> Vec<ContractResult<ResultSet>> {
        let mut tasks = JoinSet::new();
        for (index, query) in queries.iter().enumerate() {
            let service = self.clone();
            let query = query.to_string();
            tasks.spawn(async move { (index, service.search(&query).await) });
        }

        let mut slots: Vec<Option<ContractResult<ResultSet>>> = vec![None; queries.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(err) => warn!(error = %err, "search task did not complete"),
            }
        }

        slots
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| {
                    Err(ContractError::unavailable(
                        self.search.name(),
                        "search task did not complete",
                    ))
                })
            })
            .collect()
    }

    async fn search_with_retry(&self, query: &SearchQuery) -> ContractResult<ResultSet> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut backoff = Duration::from_millis(self.policy.backoff_ms);
        let mut attempt = 1;

        loop {
            let result = match self.policy.timeout_ms {
                Some(ms) => {
                    self.search
                        .invoke_with_timeout(query, Duration::from_millis(ms))
                        .await
                }
                None => self.search.invoke(query).await,
            };

            match result {
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let backoff_ms = backoff.as_millis() as u64;
                    debug!(
                        query = query.text(),
                        attempt,
                        backoff_ms,
                        error = %err,
                        "retrying search"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn remember(&self, query: &SearchQuery, results: &ResultSet) {
        if !self.policy.use_cached_fallback {
            return;
        }
        self.lock_cache()
            .insert(query.text(), results, self.policy.max_cached_queries);
    }

    fn cached(&self, query: &SearchQuery) -> Option<CachedResults> {
        self.lock_cache().get(query.text())
    }

    // A panic mid-insert leaves at worst a stale or missing entry.
    fn lock_cache(&self) -> MutexGuard<'_, FallbackCache> {
        self.cache.lock().unwrap_or_else(|poisoned| {
            warn!("search cache lock poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::TransportError;
    use crate::root::CompositionRoot;
    use crate::testing::{FakeSearchAdapter, RecordingSearchAdapter};

    fn service_with(fake: FakeSearchAdapter, policy: RetryPolicy) -> SearchService {
        let mut builder = CompositionRoot::builder();
        builder.bind::<SearchCapability, _>(|| fake).unwrap();
        let root = builder.build();
        SearchService::new(root.resolve().unwrap()).with_policy(policy)
    }

    fn timeout() -> TransportError {
        TransportError::Timeout { timeout_ms: 50 }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let fake = FakeSearchAdapter::new()
            .with_response("sausages", [SearchResult::new("a.com", "A")])
            .fail_with(timeout)
            .failures_before_success(2);
        let service = service_with(fake.clone(), RetryPolicy::default());

        let results = service.search("sausages").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(fake.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_doubles_between_attempts() {
        let fake = FakeSearchAdapter::new().fail_with(timeout);
        let policy = RetryPolicy {
            max_attempts: 4,
            backoff_ms: 100,
            use_cached_fallback: false,
            ..RetryPolicy::default()
        };
        let service = service_with(fake.clone(), policy);

        let start = tokio::time::Instant::now();
        assert!(service.search("sausages").await.is_err());

        // 100 + 200 + 400
        assert_eq!(start.elapsed().as_millis(), 700);
        assert_eq!(fake.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let fake = FakeSearchAdapter::new().fail_with(timeout);
        let policy = RetryPolicy {
            max_attempts: 2,
            use_cached_fallback: false,
            ..RetryPolicy::default()
        };
        let service = service_with(fake.clone(), policy);

        let err = service.search("sausages").await.unwrap_err();
        assert!(matches!(err, ContractError::CapabilityUnavailable { .. }));
        assert_eq!(fake.calls(), 2);
    }

    #[tokio::test]
    async fn test_violation_not_retried() {
        let fake = FakeSearchAdapter::new();
        let service = service_with(fake.clone(), RetryPolicy::default());

        let err = service.search("  ").await.unwrap_err();
        assert!(matches!(err, ContractError::ContractViolation { .. }));
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_fallback() {
        let fake = FakeSearchAdapter::new()
            .with_response("sausages", [SearchResult::new("a.com", "A")]);
        let service = service_with(fake, RetryPolicy::default());
        let fresh = service.search("sausages").await.unwrap();

        let failing = service_with(FakeSearchAdapter::new().fail_with(timeout), RetryPolicy::default());
        let failing = SearchService {
            cache: Arc::clone(&service.cache),
            ..failing
        };

        assert_eq!(failing.search("sausages").await.unwrap(), fresh);
        assert!(failing.search("kale").await.is_err());
    }

    #[tokio::test]
    async fn test_cache_evicts_oldest_query() {
        let fake = FakeSearchAdapter::new()
            .with_response("a", [SearchResult::new("a.com", "A")])
            .with_response("b", [SearchResult::new("b.com", "B")])
            .with_response("c", [SearchResult::new("c.com", "C")]);
        let policy = RetryPolicy {
            max_cached_queries: 2,
            ..RetryPolicy::default()
        };
        let service = service_with(fake, policy);

        for query in ["a", "b", "a", "c"] {
            service.search(query).await.unwrap();
        }

        let cache = service.cache.lock().unwrap();
        assert_eq!(cache.entries.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert_eq!(cache.order, ["a", "c"]);
    }

    #[tokio::test]
    async fn test_zero_capacity_disables_cache() {
        let fake = FakeSearchAdapter::new().with_response("a", [SearchResult::new("a.com", "A")]);
        let policy = RetryPolicy {
            max_cached_queries: 0,
            ..RetryPolicy::default()
        };
        let service = service_with(fake, policy);

        service.search("a").await.unwrap();
        assert!(service.cache.lock().unwrap().entries.is_empty());
    }

    #[tokio::test]
    async fn test_first_hit() {
        let fake = FakeSearchAdapter::new().with_response(
            "sausages",
            [SearchResult::new("a.com", "A"), SearchResult::new("b.com", "B")],
        );
        let service = service_with(fake, RetryPolicy::no_retry());

        let hit = service.first_hit("sausages").await.unwrap();
        assert_eq!(hit, Some(SearchResult::new("a.com", "A")));
        assert_eq!(service.first_hit("kale").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_search_all_keeps_input_order() {
        let mut builder = CompositionRoot::builder();
        builder
            .bind::<SearchCapability, _>(RecordingSearchAdapter::new)
            .unwrap();
        let service = SearchService::new(builder.build().resolve().unwrap());

        let results = service.search_all(&["one", "", "three"]).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().first().unwrap().text, "one");
        assert!(matches!(
            results[1],
            Err(ContractError::ContractViolation { .. })
        ));
        assert_eq!(results[2].as_ref().unwrap().first().unwrap().text, "three");
    }

    #[test]
    fn test_policy_defaults_from_partial_json() {
        let policy: RetryPolicy = serde_json::from_value(serde_json::json!({"max_attempts": 5})).unwrap();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.backoff_ms, 100);
        assert!(policy.use_cached_fallback);
        assert_eq!(policy.max_cached_queries, 256);
    }
}
