//! Error types for cbsmoke-cluster

use thiserror::Error;

use crate::query::QueryErrorDetail;
use crate::service::ServiceType;

/// Result type alias using cbsmoke-cluster's error type
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Errors raised while talking to the cluster
#[derive(Error, Debug)]
pub enum ClusterError {
    /// Transport-level failure (connect, TLS handshake, timeout)
    #[error("{service} request failed: {source}")]
    Http {
        service: ServiceType,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success HTTP status
    #[error("{service} service returned HTTP {status}: {body}")]
    Service {
        service: ServiceType,
        status: u16,
        body: String,
    },

    /// A query-style service reported statement errors
    #[error("{service} statement failed: {}", format_errors(.errors))]
    Query {
        service: ServiceType,
        errors: Vec<QueryErrorDetail>,
    },

    /// A field-level mutation matched no document
    #[error("document '{key}' not found in bucket '{bucket}'")]
    DocumentNotFound { bucket: String, key: String },

    /// No node advertises the service
    #[error("{service} service is not available on any node")]
    ServiceUnavailable { service: ServiceType },

    /// The bucket exists but is not ready for traffic
    #[error("bucket '{bucket}' is not ready: {reason}")]
    BucketNotReady { bucket: String, reason: String },

    /// The CA certificate could not be loaded
    #[error("failed to load CA certificate {path}: {message}")]
    Certificate { path: String, message: String },

    /// A response body did not have the expected shape
    #[error("failed to decode {service} response: {source}")]
    Decode {
        service: ServiceType,
        #[source]
        source: serde_json::Error,
    },

    /// Invalid client configuration
    #[error("invalid cluster configuration: {0}")]
    Config(String),
}

fn format_errors(errors: &[QueryErrorDetail]) -> String {
    if errors.is_empty() {
        return "no error details returned".to_string();
    }
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ClusterError {
    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ClusterError::Service { status, .. } => Some(*status),
            ClusterError::Http { source, .. } => source.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The server rejected the credentials. Retrying cannot help.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status(), Some(401 | 403))
    }

    /// The service the failure came from, if known
    pub fn service(&self) -> Option<ServiceType> {
        match self {
            ClusterError::Http { service, .. }
            | ClusterError::Service { service, .. }
            | ClusterError::Query { service, .. }
            | ClusterError::ServiceUnavailable { service }
            | ClusterError::Decode { service, .. } => Some(*service),
            _ => None,
        }
    }
}
