//! # cbsmoke-cluster
//!
//! Thin REST client for the services a smoke run touches: management,
//! query, analytics, search and views. Each operation is one request; the
//! only retrying happens in the readiness waits, which use the poller from
//! `cbsmoke-core`.

pub mod cluster;
pub mod error;
pub mod kv;
pub mod ops;
pub mod query;
pub mod search;
pub mod service;
pub mod views;

pub use cluster::{Bucket, Cluster, ClusterOptions};
pub use error::{ClusterError, Result};
pub use kv::MutateInSpec;
pub use ops::ClusterOps;
pub use query::{QueryErrorDetail, QueryMetrics, QueryRequest, QueryResult};
pub use search::{SearchIndex, SearchQuery, SearchResult};
pub use service::{ServiceMap, ServiceType};
pub use views::{DesignDocument, DesignDocumentNamespace, ViewResult, ViewRow};
