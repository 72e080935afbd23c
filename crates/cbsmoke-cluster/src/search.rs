//! Full-text search index definitions and queries

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Index definition sent to `PUT /api/index/{name}`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchIndex {
    pub name: String,
    #[serde(rename = "type")]
    pub index_type: String,
    pub source_type: String,
    pub source_name: String,
    pub params: Value,
}

impl SearchIndex {
    /// Default full-text index over every document in `source_name`
    pub fn new(name: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index_type: "fulltext-index".to_string(),
            source_type: "couchbase".to_string(),
            source_name: source_name.into(),
            params: json!({}),
        }
    }
}

/// A query string search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    query: String,
    limit: Option<u32>,
}

impl SearchQuery {
    pub fn query_string(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: None,
        }
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn to_json(&self) -> Value {
        let mut body = json!({ "query": { "query": self.query } });
        if let Some(limit) = self.limit {
            body["size"] = json!(limit);
        }
        body
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SearchStatus {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub successful: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchHit {
    pub id: String,
    #[serde(default)]
    pub score: f64,
}

/// Parsed search response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub status: SearchStatus,
    #[serde(default)]
    pub hits: Vec<SearchHit>,
    #[serde(default)]
    pub total_hits: u64,
}

impl SearchResult {
    /// Whether no index partition answered
    pub fn all_partitions_failed(&self) -> bool {
        self.status.failed > 0 && self.status.successful == 0
    }
}
