//! cbsmoke suite - the fixed smoke-test sequence
//!
//! Drives one pass over the cluster's major services and records what
//! happened:
//!
//! - **Key-value**: whole-document upsert, then a field-level mutation
//! - **Query** and **analytics**: one statement each
//! - **Search**: index creation, then a query polled until the index answers
//! - **Views**: design document publication, then a view query
//!
//! The run stops at the first failing step. Generated artifacts are dropped
//! afterwards unless the caller asks to keep them.
//!
//! # Example
//!
//! ```rust,no_run
//! use cbsmoke_cluster::Cluster;
//! use cbsmoke_suite::{OutputFormat, SmokeSuite, SuiteOptions};
//!
//! async fn example(cluster: &Cluster) {
//!     let suite = SmokeSuite::new(cluster, "travel-sample", SuiteOptions::default());
//!     let report = suite.run(|record| println!("{:?}", record.status)).await;
//!     println!("{}", report.format(OutputFormat::Json));
//! }
//! ```

mod names;
mod reporter;
mod runner;
mod step;

pub use names::ArtifactNames;
pub use reporter::{JsonSmokeReport, JsonStepRecord, OutputFormat, ReportFormatter};
pub use runner::{SmokeSuite, DOCUMENT_KEY};
pub use step::{Step, StepRecord, StepStatus};

use std::time::Duration;

use cbsmoke_core::{PollPolicy, RuntimeConfig};
use thiserror::Error;
use tokio::sync::watch;

/// Errors raised by the suite crate itself
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SuiteError {
    #[error("unknown output format '{0}' (expected human, json or yaml)")]
    UnknownFormat(String),
}

/// Options for a smoke run
#[derive(Debug, Clone, Default)]
pub struct SuiteOptions {
    /// Deadline and delay for the search readiness poll
    pub search_ready: PollPolicy,
    /// Leave the search index and design document in place
    pub keep_artifacts: bool,
    /// Fixed artifact names; random ones are generated when absent
    pub names: Option<ArtifactNames>,
    /// Stops the search poll and any remaining steps once it carries `true`
    pub cancel: Option<watch::Receiver<bool>>,
}

impl SuiteOptions {
    pub fn from_runtime(runtime: &RuntimeConfig) -> Self {
        Self {
            search_ready: runtime.search_ready,
            keep_artifacts: runtime.keep_artifacts,
            ..Self::default()
        }
    }

    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }
}

/// Overall outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverallStatus {
    Passed,
    /// `step` failed and every later step was skipped
    Failed { step: Step },
}

/// Outcome of dropping one generated artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupRecord {
    pub artifact: String,
    pub error: Option<String>,
}

/// Result of a smoke run
#[derive(Debug, Clone)]
pub struct SmokeReport {
    pub bucket: String,
    pub steps: Vec<StepRecord>,
    pub artifacts: ArtifactNames,
    pub cleanup: Vec<CleanupRecord>,
    pub overall_status: OverallStatus,
    pub duration: Duration,
}

impl SmokeReport {
    pub fn format(&self, format: OutputFormat) -> String {
        ReportFormatter::new(false).format(self, format)
    }

    pub fn format_verbose(&self, format: OutputFormat) -> String {
        ReportFormatter::new(true).format(self, format)
    }

    /// Process exit code: 0 when every step passed, 1 otherwise
    pub fn exit_code(&self) -> i32 {
        match self.overall_status {
            OverallStatus::Passed => 0,
            OverallStatus::Failed { .. } => 1,
        }
    }

    pub fn is_passed(&self) -> bool {
        self.overall_status == OverallStatus::Passed
    }

    /// Error text of the failed step, if any
    pub fn failure(&self) -> Option<(Step, &str)> {
        self.steps.iter().find_map(|r| match &r.status {
            StepStatus::Failed { error } => Some((r.step, error.as_str())),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(overall_status: OverallStatus, steps: Vec<StepRecord>) -> SmokeReport {
        SmokeReport {
            bucket: "default".to_string(),
            steps,
            artifacts: ArtifactNames::with_suffix("00000000"),
            cleanup: Vec::new(),
            overall_status,
            duration: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(report(OverallStatus::Passed, vec![]).exit_code(), 0);
        assert_eq!(
            report(OverallStatus::Failed { step: Step::Search }, vec![]).exit_code(),
            1
        );
    }

    #[test]
    fn test_failure_lookup() {
        let r = report(
            OverallStatus::Failed { step: Step::Query },
            vec![
                StepRecord::passed(Step::Upsert, Duration::ZERO),
                StepRecord::failed(Step::Query, "[3000] syntax error", Duration::ZERO),
                StepRecord::skipped(Step::AnalyticsQuery),
            ],
        );
        assert_eq!(r.failure(), Some((Step::Query, "[3000] syntax error")));
        assert!(!r.is_passed());
    }

    #[test]
    fn test_options_from_runtime() {
        let mut runtime = RuntimeConfig::default();
        runtime.keep_artifacts = true;
        runtime.search_ready = PollPolicy::with_timeout(Duration::from_secs(30));

        let options = SuiteOptions::from_runtime(&runtime);
        assert!(options.keep_artifacts);
        assert_eq!(options.search_ready.timeout_ms, 30_000);
        assert_eq!(options.search_ready.delay_ms, 250);
        assert!(options.cancel.is_none());
    }
}
