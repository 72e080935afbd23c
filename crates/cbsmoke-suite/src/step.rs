//! Suite steps and their outcomes

use std::fmt;
use std::time::Duration;

/// One stage of the smoke run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Upsert,
    SubdocMutate,
    Query,
    AnalyticsQuery,
    Search,
    Views,
}

impl Step {
    /// Every step in the order the suite runs them
    pub const ALL: [Step; 6] = [
        Step::Upsert,
        Step::SubdocMutate,
        Step::Query,
        Step::AnalyticsQuery,
        Step::Search,
        Step::Views,
    ];

    /// Stable identifier for machine-readable output
    pub fn id(&self) -> &'static str {
        match self {
            Step::Upsert => "upsert",
            Step::SubdocMutate => "subdoc-mutate",
            Step::Query => "n1ql-query",
            Step::AnalyticsQuery => "analytics-query",
            Step::Search => "fts",
            Step::Views => "views",
        }
    }

    /// Name used in status lines
    pub fn label(&self) -> &'static str {
        match self {
            Step::Upsert => "upsert",
            Step::SubdocMutate => "subdoc mutate",
            Step::Query => "n1ql query",
            Step::AnalyticsQuery => "analytics query",
            Step::Search => "fts",
            Step::Views => "views",
        }
    }

    /// Line printed once the step has passed
    pub fn done_line(&self) -> String {
        format!("{} done", self.label())
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Passed,
    Failed { error: String },
    /// Not attempted because an earlier step failed
    Skipped,
}

/// Outcome of a single step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub step: Step,
    pub status: StepStatus,
    pub duration: Duration,
}

impl StepRecord {
    pub fn passed(step: Step, duration: Duration) -> Self {
        Self {
            step,
            status: StepStatus::Passed,
            duration,
        }
    }

    pub fn failed(step: Step, error: impl Into<String>, duration: Duration) -> Self {
        Self {
            step,
            status: StepStatus::Failed {
                error: error.into(),
            },
            duration,
        }
    }

    pub fn skipped(step: Step) -> Self {
        Self {
            step,
            status: StepStatus::Skipped,
            duration: Duration::ZERO,
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self.status, StepStatus::Passed)
    }
}
