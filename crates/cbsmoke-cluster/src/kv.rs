//! Document writes: whole-document upsert and field-level mutation

use serde_json::Value;

use crate::error::{ClusterError, Result};
use crate::query::QueryRequest;

/// A single field-level change applied by `mutate_in`
#[derive(Debug, Clone, PartialEq)]
pub enum MutateInSpec {
    /// Set `path` to `value`, creating the field if it is missing
    Upsert { path: String, value: Value },
}

impl MutateInSpec {
    pub fn upsert(path: impl Into<String>, value: impl Into<Value>) -> Self {
        MutateInSpec::Upsert {
            path: path.into(),
            value: value.into(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            MutateInSpec::Upsert { path, .. } => path,
        }
    }
}

/// Quote a dotted field path as backtick-escaped identifiers: `a.b` becomes
/// `` `a`.`b` ``.
fn escape_path(path: &str) -> Result<String> {
    let mut parts = Vec::new();
    for segment in path.split('.') {
        if segment.is_empty() {
            return Err(ClusterError::Config(format!(
                "invalid sub-document path '{}'",
                path
            )));
        }
        parts.push(format!("`{}`", segment.replace('`', "``")));
    }
    Ok(parts.join("."))
}

fn escape_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Statement applying `specs` to a single document
pub(crate) fn mutate_in_statement(
    bucket: &str,
    key: &str,
    specs: &[MutateInSpec],
) -> Result<QueryRequest> {
    if specs.is_empty() {
        return Err(ClusterError::Config(
            "mutate_in requires at least one spec".to_string(),
        ));
    }

    let mut assignments = Vec::with_capacity(specs.len());
    let mut params = Vec::with_capacity(specs.len());
    for (i, spec) in specs.iter().enumerate() {
        let MutateInSpec::Upsert { path, value } = spec;
        let name = format!("v{}", i);
        assignments.push(format!("{} = ${}", escape_path(path)?, name));
        params.push((name, value.clone()));
    }

    let statement = format!(
        "UPDATE {} USE KEYS $key SET {}",
        escape_identifier(bucket),
        assignments.join(", ")
    );

    let mut request =
        QueryRequest::new(statement).named_param("key", Value::String(key.to_string()));
    for (name, value) in params {
        request = request.named_param(&name, value);
    }
    Ok(request)
}

/// Form body for the management docs endpoint
pub(crate) fn upsert_form_body(document: &Value) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("value", &document.to_string())
        .finish()
}
