//! Report formatting
//!
//! Renders a `SmokeReport` as human-readable text, JSON or YAML.

use std::fmt;
use std::str::FromStr;

use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};

use crate::step::{StepRecord, StepStatus};
use crate::{OverallStatus, SmokeReport, SuiteError};

/// Output format for smoke reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Status lines and a coloured summary
    #[default]
    Human,
    Json,
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = SuiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" | "text" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => Err(SuiteError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputFormat::Human => "human",
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        };
        write!(f, "{}", s)
    }
}

/// Smoke report formatter
pub struct ReportFormatter {
    verbose: bool,
}

impl ReportFormatter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn format(&self, report: &SmokeReport, format: OutputFormat) -> String {
        match format {
            OutputFormat::Human => self.format_human(report),
            OutputFormat::Json => self.format_json(report),
            OutputFormat::Yaml => self.format_yaml(report),
        }
    }

    /// Status line for one step, e.g. `upsert done`
    pub fn format_step(&self, record: &StepRecord) -> String {
        let mut line = match &record.status {
            StepStatus::Passed => record.step.done_line(),
            StepStatus::Failed { error } => {
                format!("{} {} failed: {}", "✗".red(), record.step.label(), error.red())
            }
            StepStatus::Skipped => format!("{} skipped", record.step.label())
                .dimmed()
                .to_string(),
        };

        if self.verbose && !matches!(record.status, StepStatus::Skipped) {
            line.push_str(&format!(" ({:?})", record.duration).dimmed().to_string());
        }
        line
    }

    fn format_human(&self, report: &SmokeReport) -> String {
        let mut output = String::new();
        for record in &report.steps {
            output.push_str(&self.format_step(record));
            output.push('\n');
        }
        output.push('\n');
        output.push_str(&self.format_summary(report));
        output
    }

    /// Summary block printed after the status lines
    pub fn format_summary(&self, report: &SmokeReport) -> String {
        let mut output = String::new();

        output.push_str(&format!("{}\n", "Summary".bold().underline()));

        let passed = report.steps.iter().filter(|r| r.is_passed()).count();
        match report.overall_status {
            OverallStatus::Passed => {
                output.push_str(&format!(
                    "  {} All {} steps passed on bucket {} in {:.1}s\n",
                    "✓".green(),
                    passed,
                    report.bucket.bold(),
                    report.duration.as_secs_f64()
                ));
            }
            OverallStatus::Failed { step } => {
                output.push_str(&format!(
                    "  {} {} failed after {} passing step(s)\n",
                    "✗".red(),
                    step.label().red(),
                    passed
                ));
                if let Some((_, error)) = report.failure() {
                    output.push_str(&format!("    {}\n", error));
                }
            }
        }

        if self.verbose {
            output.push_str(&format!(
                "  Artifacts: {}, {}/{}\n",
                report.artifacts.search_index,
                report.artifacts.design_document,
                report.artifacts.view
            ));
        }

        for cleanup in &report.cleanup {
            if let Some(error) = &cleanup.error {
                output.push_str(&format!(
                    "  {} could not drop {}: {}\n",
                    "⚠".yellow(),
                    cleanup.artifact,
                    error.dimmed()
                ));
            }
        }

        output
    }

    fn format_json(&self, report: &SmokeReport) -> String {
        let json_report = JsonSmokeReport::from(report);
        serde_json::to_string_pretty(&json_report)
            .unwrap_or_else(|e| format!("{{\"error\": \"Failed to serialize: {}\"}}", e))
    }

    fn format_yaml(&self, report: &SmokeReport) -> String {
        let json_report = JsonSmokeReport::from(report);
        serde_yaml_ng::to_string(&json_report)
            .unwrap_or_else(|e| format!("error: \"Failed to serialize: {}\"", e))
    }
}

impl Default for ReportFormatter {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Serializable smoke report
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonSmokeReport {
    pub bucket: String,
    pub overall_status: String,
    pub failed_step: Option<String>,
    pub steps: Vec<JsonStepRecord>,
    pub search_index: String,
    pub design_document: String,
    pub view: String,
    pub artifacts_dropped: Vec<String>,
    pub cleanup_errors: Vec<String>,
    pub duration_ms: u64,
}

impl From<&SmokeReport> for JsonSmokeReport {
    fn from(report: &SmokeReport) -> Self {
        let (overall_status, failed_step) = match report.overall_status {
            OverallStatus::Passed => ("passed".to_string(), None),
            OverallStatus::Failed { step } => ("failed".to_string(), Some(step.id().to_string())),
        };

        Self {
            bucket: report.bucket.clone(),
            overall_status,
            failed_step,
            steps: report.steps.iter().map(JsonStepRecord::from).collect(),
            search_index: report.artifacts.search_index.clone(),
            design_document: report.artifacts.design_document.clone(),
            view: report.artifacts.view.clone(),
            artifacts_dropped: report
                .cleanup
                .iter()
                .filter(|c| c.error.is_none())
                .map(|c| c.artifact.clone())
                .collect(),
            cleanup_errors: report
                .cleanup
                .iter()
                .filter_map(|c| {
                    c.error
                        .as_ref()
                        .map(|e| format!("{}: {}", c.artifact, e))
                })
                .collect(),
            duration_ms: report.duration.as_millis() as u64,
        }
    }
}

/// Serializable step outcome
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonStepRecord {
    pub step: String,
    pub status: String,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl From<&StepRecord> for JsonStepRecord {
    fn from(record: &StepRecord) -> Self {
        let (status, error) = match &record.status {
            StepStatus::Passed => ("passed", None),
            StepStatus::Failed { error } => ("failed", Some(error.clone())),
            StepStatus::Skipped => ("skipped", None),
        };
        Self {
            step: record.step.id().to_string(),
            status: status.to_string(),
            error,
            duration_ms: record.duration.as_millis() as u64,
        }
    }
}
