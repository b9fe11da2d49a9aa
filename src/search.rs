//! The search capability.
//!
//! `search(query) → results`, where results are an ordered [`ResultSet`] of
//! [`SearchResult`] `{url, text}` pairs.
//!
//! Both fields of every returned result are present and owned strings, no
//! matter which adapter produced them. Adapters normalize missing text to
//! `""` before building a result.

use serde::{Deserialize, Serialize};

use crate::contract::Capability;
use crate::error::{ContractError, ContractResult};

/// Longest accepted query, in characters, after trimming.
pub const MAX_QUERY_LEN: usize = 512;

/// Marker type for the search capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchCapability;

impl Capability for SearchCapability {
    const NAME: &'static str = "search";
    type Input = SearchQuery;
    type Output = ResultSet;

    fn validate(input: &SearchQuery) -> ContractResult<()> {
        let query = input.query.trim();
        if query.is_empty() {
            return Err(ContractError::violation(Self::NAME, "query must not be empty"));
        }
        let len = query.chars().count();
        if len > MAX_QUERY_LEN {
            return Err(ContractError::violation(
                Self::NAME,
                format!("query is {len} characters, limit is {MAX_QUERY_LEN}"),
            ));
        }
        if query.chars().any(char::is_control) {
            return Err(ContractError::violation(
                Self::NAME,
                "query must not contain control characters",
            ));
        }
        Ok(())
    }
}

/// Search request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text query.
    pub query: String,
}

impl SearchQuery {
    /// Create a query.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
        }
    }

    /// Parse a query from an untyped JSON value.
    ///
    /// A missing `query` field, a non-string `query`, or a non-object value
    /// is a `ContractViolation`.
    pub fn from_json(value: serde_json::Value) -> ContractResult<Self> {
        let serde_json::Value::Object(mut fields) = value else {
            return Err(ContractError::violation(
                SearchCapability::NAME,
                "input must be an object",
            ));
        };
        match fields.remove("query") {
            Some(serde_json::Value::String(query)) => Ok(Self { query }),
            Some(other) => Err(ContractError::violation(
                SearchCapability::NAME,
                format!("field `query` must be a string, got {}", json_kind(&other)),
            )),
            None => Err(ContractError::violation(
                SearchCapability::NAME,
                "missing required field `query`",
            )),
        }
    }

    /// Trimmed query text, as adapters should send it.
    pub fn text(&self) -> &str {
        self.query.trim()
    }
}

impl From<&str> for SearchQuery {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SearchQuery {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchResult {
    /// Location of the hit.
    pub url: String,
    /// Display text for the hit.
    pub text: String,
}

impl SearchResult {
    /// Create a result.
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
        }
    }
}

/// Ordered search results, in the order the adapter emitted them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    results: Vec<SearchResult>,
}

impl ResultSet {
    /// Create an empty result set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a result, keeping emission order.
    pub fn push(&mut self, result: SearchResult) {
        self.results.push(result);
    }

    /// Results as a slice.
    pub fn as_slice(&self) -> &[SearchResult] {
        &self.results
    }

    /// Iterate in order.
    pub fn iter(&self) -> std::slice::Iter<'_, SearchResult> {
        self.results.iter()
    }

    /// First result, if any.
    pub fn first(&self) -> Option<&SearchResult> {
        self.results.first()
    }

    /// Number of results.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Check if there are no results.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Consume into the underlying vector.
    pub fn into_vec(self) -> Vec<SearchResult> {
        self.results
    }
}

impl From<Vec<SearchResult>> for ResultSet {
    fn from(results: Vec<SearchResult>) -> Self {
        Self { results }
    }
}

impl FromIterator<SearchResult> for ResultSet {
    fn from_iter<I: IntoIterator<Item = SearchResult>>(iter: I) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ResultSet {
    type Item = SearchResult;
    type IntoIter = std::vec::IntoIter<SearchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a SearchResult;
    type IntoIter = std::slice::Iter<'a, SearchResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_validate_accepts_plain_query() {
        assert!(SearchCapability::validate(&SearchQuery::new("sausages")).is_ok());
    }

    #[test]
    fn test_validate_rejects_blank_query() {
        let err = SearchCapability::validate(&SearchQuery::new("   ")).unwrap_err();
        assert!(matches!(err, ContractError::ContractViolation { .. }));
    }

    #[test]
    fn test_validate_rejects_oversized_query() {
        let query = SearchQuery::new("x".repeat(MAX_QUERY_LEN + 1));
        assert!(SearchCapability::validate(&query).is_err());

        let query = SearchQuery::new("x".repeat(MAX_QUERY_LEN));
        assert!(SearchCapability::validate(&query).is_ok());
    }

    #[test]
    fn test_validate_rejects_control_characters() {
        assert!(SearchCapability::validate(&SearchQuery::new("saus\u{0}ages")).is_err());
    }

    #[test]
    fn test_from_json() {
        let query = SearchQuery::from_json(json!({"query": "sausages"})).unwrap();
        assert_eq!(query, SearchQuery::new("sausages"));

        let err = SearchQuery::from_json(json!({})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Contract violation on search: missing required field `query`"
        );

        let err = SearchQuery::from_json(json!({"query": 7})).unwrap_err();
        assert!(err.to_string().contains("got number"));

        assert!(SearchQuery::from_json(json!("sausages")).is_err());
    }

    #[test]
    fn test_result_set_preserves_order() {
        let results: ResultSet = vec![
            SearchResult::new("b.com", "B"),
            SearchResult::new("a.com", "A"),
        ]
        .into();

        let urls: Vec<_> = results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, ["b.com", "a.com"]);
        assert_eq!(results.first().map(|r| r.text.as_str()), Some("B"));
    }

    #[test]
    fn test_result_set_serializes_as_array() {
        let results: ResultSet = vec![SearchResult::new("a.com", "A")].into();
        assert_eq!(
            serde_json::to_value(&results).unwrap(),
            json!([{"url": "a.com", "text": "A"}])
        );
    }
}
