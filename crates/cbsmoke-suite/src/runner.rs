//! Executes the smoke steps against a cluster

use cbsmoke_cluster::{
    ClusterOps, DesignDocument, DesignDocumentNamespace, MutateInSpec, SearchIndex, SearchQuery,
};
use cbsmoke_core::poll::{ReadinessPollerBuilder, TracingObserver};
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::names::ArtifactNames;
use crate::step::{Step, StepRecord};
use crate::{CleanupRecord, OverallStatus, SmokeReport, SuiteOptions};

/// Key of the document the run writes
pub const DOCUMENT_KEY: &str = "test-key";

const QUERY_STATEMENT: &str = "SELECT *";
const ANALYTICS_STATEMENT: &str = "select \"hello\" as greeting";
const SEARCH_TERM: &str = "test";
const VIEW_MAP: &str = "function(doc,meta) { emit(meta.id, doc) }";

/// The fixed sequence of smoke steps
pub struct SmokeSuite<'a> {
    ops: &'a dyn ClusterOps,
    bucket: String,
    options: SuiteOptions,
}

/// Artifacts that exist on the server and may need dropping
#[derive(Debug, Default)]
struct Created {
    search_index: bool,
    design_document: bool,
}

impl<'a> SmokeSuite<'a> {
    pub fn new(ops: &'a dyn ClusterOps, bucket: impl Into<String>, options: SuiteOptions) -> Self {
        Self {
            ops,
            bucket: bucket.into(),
            options,
        }
    }

    /// Run every step in order, stopping at the first failure.
    ///
    /// `on_step` sees each record as soon as it is known, skipped steps
    /// included.
    pub async fn run<F>(&self, mut on_step: F) -> SmokeReport
    where
        F: FnMut(&StepRecord),
    {
        let started = Instant::now();
        let names = self
            .options
            .names
            .clone()
            .unwrap_or_else(ArtifactNames::generate);
        let mut created = Created::default();
        let mut steps = Vec::with_capacity(Step::ALL.len());
        let mut failed: Option<Step> = None;

        info!("Starting smoke run against bucket {}", self.bucket);

        for step in Step::ALL {
            let record = if failed.is_some() {
                StepRecord::skipped(step)
            } else if self.is_cancelled() {
                StepRecord::failed(step, "cancelled", std::time::Duration::ZERO)
            } else {
                let step_start = Instant::now();
                match self.run_step(step, &names, &mut created).await {
                    Ok(()) => StepRecord::passed(step, step_start.elapsed()),
                    Err(e) => {
                        warn!("Step {} failed: {}", step, e);
                        StepRecord::failed(step, e.to_string(), step_start.elapsed())
                    }
                }
            };

            if failed.is_none() && !record.is_passed() {
                failed = Some(step);
            }
            on_step(&record);
            steps.push(record);
        }

        let cleanup = if self.options.keep_artifacts {
            debug!("Keeping artifacts {:?}", names);
            Vec::new()
        } else {
            self.cleanup(&names, &created).await
        };

        let overall_status = match failed {
            Some(step) => OverallStatus::Failed { step },
            None => OverallStatus::Passed,
        };

        SmokeReport {
            bucket: self.bucket.clone(),
            steps,
            artifacts: names,
            cleanup,
            overall_status,
            duration: started.elapsed(),
        }
    }

    fn is_cancelled(&self) -> bool {
        self.options
            .cancel
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false)
    }

    async fn run_step(
        &self,
        step: Step,
        names: &ArtifactNames,
        created: &mut Created,
    ) -> cbsmoke_cluster::Result<()> {
        let ops = self.ops;
        let bucket = self.bucket.as_str();

        match step {
            Step::Upsert => {
                let document = json!({"author": "mike", "title": "My Blog Post 1"});
                ops.upsert(bucket, DOCUMENT_KEY, &document).await
            }
            Step::SubdocMutate => {
                ops.mutate_in(bucket, DOCUMENT_KEY, &[MutateInSpec::upsert("author", "steve")])
                    .await
            }
            Step::Query => {
                let result = ops.query(QUERY_STATEMENT).await?;
                debug!("Query returned {} row(s)", result.rows.len());
                Ok(())
            }
            Step::AnalyticsQuery => {
                let result = ops.analytics_query(ANALYTICS_STATEMENT).await?;
                debug!("Analytics returned {} row(s)", result.rows.len());
                Ok(())
            }
            Step::Search => {
                let index = SearchIndex::new(names.search_index.as_str(), bucket);
                ops.upsert_search_index(&index).await?;
                created.search_index = true;

                // The index is built asynchronously; queries fail until its
                // partitions are assigned.
                let query = SearchQuery::query_string(SEARCH_TERM);
                let mut builder = ReadinessPollerBuilder::new()
                    .with_policy(self.options.search_ready)
                    .with_observer(TracingObserver::new(format!(
                        "search index {}",
                        index.name
                    )));
                if let Some(cancel) = &self.options.cancel {
                    builder = builder.with_cancellation(cancel.clone());
                }
                builder
                    .build()
                    .poll(|| ops.search_query(&index.name, &query))
                    .await
            }
            Step::Views => {
                let design_document = DesignDocument::new(names.design_document.as_str())
                    .put_view(names.view.as_str(), VIEW_MAP);
                ops.upsert_design_document(
                    bucket,
                    &design_document,
                    DesignDocumentNamespace::Production,
                )
                .await?;
                created.design_document = true;

                let result = ops
                    .view_query(bucket, &names.design_document, &names.view)
                    .await?;
                debug!("View returned {} row(s)", result.rows.len());
                Ok(())
            }
        }
    }

    async fn cleanup(&self, names: &ArtifactNames, created: &Created) -> Vec<CleanupRecord> {
        let mut records = Vec::new();

        if created.search_index {
            let result = self.ops.drop_search_index(&names.search_index).await;
            records.push(self.cleanup_record("search index", &names.search_index, result));
        }

        if created.design_document {
            let result = self
                .ops
                .drop_design_document(
                    &self.bucket,
                    &names.design_document,
                    DesignDocumentNamespace::Production,
                )
                .await;
            records.push(self.cleanup_record(
                "design document",
                &names.design_document,
                result,
            ));
        }

        records
    }

    fn cleanup_record(
        &self,
        kind: &str,
        name: &str,
        result: cbsmoke_cluster::Result<()>,
    ) -> CleanupRecord {
        match result {
            Ok(()) => {
                debug!("Dropped {} {}", kind, name);
                CleanupRecord {
                    artifact: name.to_string(),
                    error: None,
                }
            }
            Err(e) => {
                warn!("Failed to drop {} {}: {}", kind, name, e);
                CleanupRecord {
                    artifact: name.to_string(),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
