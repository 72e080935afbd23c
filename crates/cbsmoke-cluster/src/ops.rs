//! Data-plane operations against a connected cluster

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::cluster::Cluster;
use crate::error::{ClusterError, Result};
use crate::kv::{mutate_in_statement, upsert_form_body, MutateInSpec};
use crate::query::{parse_query_response, QueryRequest, QueryResult};
use crate::search::{SearchIndex, SearchQuery, SearchResult};
use crate::service::ServiceType;
use crate::views::{DesignDocument, DesignDocumentNamespace, ViewResult};

/// Operations the smoke suite drives
///
/// Every call is a single request; retrying is left to the caller.
#[async_trait]
pub trait ClusterOps: Send + Sync {
    /// Create or replace a whole document
    async fn upsert(&self, bucket: &str, key: &str, document: &Value) -> Result<()>;

    /// Apply field-level changes to an existing document
    async fn mutate_in(&self, bucket: &str, key: &str, specs: &[MutateInSpec]) -> Result<()>;

    async fn query(&self, statement: &str) -> Result<QueryResult>;

    async fn analytics_query(&self, statement: &str) -> Result<QueryResult>;

    async fn upsert_search_index(&self, index: &SearchIndex) -> Result<()>;

    async fn search_query(&self, index: &str, query: &SearchQuery) -> Result<SearchResult>;

    async fn drop_search_index(&self, name: &str) -> Result<()>;

    async fn upsert_design_document(
        &self,
        bucket: &str,
        design_document: &DesignDocument,
        namespace: DesignDocumentNamespace,
    ) -> Result<()>;

    async fn view_query(
        &self,
        bucket: &str,
        design_document: &str,
        view: &str,
    ) -> Result<ViewResult>;

    async fn drop_design_document(
        &self,
        bucket: &str,
        name: &str,
        namespace: DesignDocumentNamespace,
    ) -> Result<()>;
}

impl Cluster {
    async fn run_statement(
        &self,
        service: ServiceType,
        request: &QueryRequest,
    ) -> Result<QueryResult> {
        let path: &[&str] = match service {
            ServiceType::Analytics => &["analytics", "service"],
            _ => &["query", "service"],
        };
        let url = self.url(service, path)?;
        debug!("Running {} statement: {}", service, request.statement());

        let (status, body) = self
            .execute(service, self.request(Method::POST, url).json(&request.to_body()))
            .await?;
        parse_query_response(service, status, &body)
    }
}

#[async_trait]
impl ClusterOps for Cluster {
    async fn upsert(&self, bucket: &str, key: &str, document: &Value) -> Result<()> {
        let url = self.url(
            ServiceType::Management,
            &["pools", "default", "buckets", bucket, "docs", key],
        )?;
        let request = self
            .request(Method::POST, url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(upsert_form_body(document));

        self.send(ServiceType::Management, request).await?;
        debug!("Upserted {} in {}", key, bucket);
        Ok(())
    }

    async fn mutate_in(&self, bucket: &str, key: &str, specs: &[MutateInSpec]) -> Result<()> {
        let request = mutate_in_statement(bucket, key, specs)?;
        let result = self.run_statement(ServiceType::Query, &request).await?;

        if result.metrics.mutation_count == 0 {
            return Err(ClusterError::DocumentNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }
        Ok(())
    }

    async fn query(&self, statement: &str) -> Result<QueryResult> {
        self.run_statement(ServiceType::Query, &QueryRequest::new(statement))
            .await
    }

    async fn analytics_query(&self, statement: &str) -> Result<QueryResult> {
        self.run_statement(ServiceType::Analytics, &QueryRequest::new(statement))
            .await
    }

    async fn upsert_search_index(&self, index: &SearchIndex) -> Result<()> {
        let url = self.url(ServiceType::Search, &["api", "index", &index.name])?;
        self.send(ServiceType::Search, self.request(Method::PUT, url).json(index))
            .await?;
        debug!("Created search index {} on {}", index.name, index.source_name);
        Ok(())
    }

    async fn search_query(&self, index: &str, query: &SearchQuery) -> Result<SearchResult> {
        let url = self.url(ServiceType::Search, &["api", "index", index, "query"])?;
        let body = self
            .send(
                ServiceType::Search,
                self.request(Method::POST, url).json(&query.to_json()),
            )
            .await?;

        let result: SearchResult =
            serde_json::from_slice(&body).map_err(|source| ClusterError::Decode {
                service: ServiceType::Search,
                source,
            })?;

        if result.all_partitions_failed() {
            return Err(ClusterError::Service {
                service: ServiceType::Search,
                status: 200,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(result)
    }

    async fn drop_search_index(&self, name: &str) -> Result<()> {
        let url = self.url(ServiceType::Search, &["api", "index", name])?;
        self.send(ServiceType::Search, self.request(Method::DELETE, url))
            .await?;
        debug!("Dropped search index {}", name);
        Ok(())
    }

    async fn upsert_design_document(
        &self,
        bucket: &str,
        design_document: &DesignDocument,
        namespace: DesignDocumentNamespace,
    ) -> Result<()> {
        let name = namespace.qualify(design_document.name());
        let url = self.url(ServiceType::Views, &[bucket, "_design", &name])?;
        self.send(
            ServiceType::Views,
            self.request(Method::PUT, url).json(&design_document.to_json()),
        )
        .await?;
        debug!("Published design document {} on {}", name, bucket);
        Ok(())
    }

    async fn view_query(
        &self,
        bucket: &str,
        design_document: &str,
        view: &str,
    ) -> Result<ViewResult> {
        let url = self.url(
            ServiceType::Views,
            &[bucket, "_design", design_document, "_view", view],
        )?;
        let body = self
            .send(ServiceType::Views, self.request(Method::GET, url))
            .await?;

        serde_json::from_slice(&body).map_err(|source| ClusterError::Decode {
            service: ServiceType::Views,
            source,
        })
    }

    async fn drop_design_document(
        &self,
        bucket: &str,
        name: &str,
        namespace: DesignDocumentNamespace,
    ) -> Result<()> {
        let name = namespace.qualify(name);
        let url = self.url(ServiceType::Views, &[bucket, "_design", &name])?;
        self.send(ServiceType::Views, self.request(Method::DELETE, url))
            .await?;
        debug!("Dropped design document {} on {}", name, bucket);
        Ok(())
    }
}
