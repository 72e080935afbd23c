//! Query and analytics statement requests and responses
//!
//! Both services accept `{"statement": ...}` bodies and answer with the same
//! envelope: `status`, `results`, optional `errors` and `metrics`. A failed
//! statement usually comes back with a 4xx/5xx status *and* a JSON envelope,
//! so the envelope is inspected before the HTTP status.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ClusterError, Result};
use crate::service::ServiceType;

/// One entry of the `errors` array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryErrorDetail {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub msg: String,
}

impl fmt::Display for QueryErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.msg)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetrics {
    #[serde(default)]
    pub elapsed_time: Option<String>,
    #[serde(default)]
    pub execution_time: Option<String>,
    #[serde(default)]
    pub result_count: u64,
    #[serde(default)]
    pub mutation_count: u64,
}

/// Successful statement result
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub request_id: Option<String>,
    pub rows: Vec<Value>,
    pub metrics: QueryMetrics,
}

#[derive(Debug, Deserialize)]
struct QueryEnvelope {
    #[serde(rename = "requestID", default)]
    request_id: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    errors: Vec<QueryErrorDetail>,
    #[serde(default)]
    metrics: QueryMetrics,
}

/// Statement plus named parameters
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    statement: String,
    named: Map<String, Value>,
}

impl QueryRequest {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            named: Map::new(),
        }
    }

    /// Bind `$name` to `value`
    pub fn named_param(mut self, name: &str, value: Value) -> Self {
        let key = if name.starts_with('$') {
            name.to_string()
        } else {
            format!("${}", name)
        };
        self.named.insert(key, value);
        self
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// Request body sent to the service
    pub fn to_body(&self) -> Value {
        let mut body = self.named.clone();
        body.insert("statement".to_string(), Value::String(self.statement.clone()));
        Value::Object(body)
    }
}

impl From<&str> for QueryRequest {
    fn from(statement: &str) -> Self {
        QueryRequest::new(statement)
    }
}

/// Interpret a response from a query-style service
pub fn parse_query_response(service: ServiceType, status: u16, body: &[u8]) -> Result<QueryResult> {
    let envelope: QueryEnvelope = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        Err(source) => {
            if (200..300).contains(&status) {
                return Err(ClusterError::Decode { service, source });
            }
            return Err(ClusterError::Service {
                service,
                status,
                body: String::from_utf8_lossy(body).into_owned(),
            });
        }
    };

    if envelope.status != "success"
        || !envelope.errors.is_empty()
        || !(200..300).contains(&status)
    {
        return Err(ClusterError::Query {
            service,
            errors: envelope.errors,
        });
    }

    Ok(QueryResult {
        request_id: envelope.request_id,
        rows: envelope.results,
        metrics: envelope.metrics,
    })
}
