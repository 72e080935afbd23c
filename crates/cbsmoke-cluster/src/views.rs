//! Design documents and view queries

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Where a design document lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DesignDocumentNamespace {
    #[default]
    Production,
    Development,
}

impl DesignDocumentNamespace {
    /// Name under which the server stores `name`
    pub fn qualify(&self, name: &str) -> String {
        match self {
            DesignDocumentNamespace::Production => name.to_string(),
            DesignDocumentNamespace::Development if name.starts_with("dev_") => name.to_string(),
            DesignDocumentNamespace::Development => format!("dev_{}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub map: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reduce: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignDocument {
    name: String,
    views: BTreeMap<String, View>,
}

impl DesignDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            views: BTreeMap::new(),
        }
    }

    /// Add or replace a map-only view
    pub fn put_view(mut self, name: impl Into<String>, map: impl Into<String>) -> Self {
        self.views.insert(
            name.into(),
            View {
                map: map.into(),
                reduce: None,
            },
        );
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn views(&self) -> &BTreeMap<String, View> {
        &self.views
    }

    pub fn to_json(&self) -> Value {
        json!({ "views": self.views })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ViewRow {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub key: Value,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ViewResult {
    #[serde(default)]
    pub total_rows: u64,
    #[serde(default)]
    pub rows: Vec<ViewRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_design_document_body() {
        let ddoc = DesignDocument::new("dd-1")
            .put_view("view-1", "function(doc,meta) { emit(meta.id, doc) }");
        assert_eq!(
            ddoc.to_json(),
            json!({"views": {"view-1": {"map": "function(doc,meta) { emit(meta.id, doc) }"}}})
        );
    }

    #[test]
    fn test_namespace_prefix() {
        assert_eq!(DesignDocumentNamespace::Production.qualify("dd"), "dd");
        assert_eq!(DesignDocumentNamespace::Development.qualify("dd"), "dev_dd");
        assert_eq!(DesignDocumentNamespace::Development.qualify("dev_dd"), "dev_dd");
    }

    #[test]
    fn test_parse_view_result() {
        let result: ViewResult = serde_json::from_value(json!({
            "total_rows": 1,
            "rows": [{"id": "test-key", "key": "test-key", "value": {"author": "steve"}}]
        }))
        .unwrap();
        assert_eq!(result.total_rows, 1);
        assert_eq!(result.rows[0].id.as_deref(), Some("test-key"));
    }
}
