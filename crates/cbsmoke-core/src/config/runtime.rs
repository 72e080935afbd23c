//! Runtime configuration: timeouts and readiness poll policies

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

use crate::error::{Error, Result};

/// Timing for a readiness poll: an overall deadline and a fixed pause
/// between failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PollPolicy {
    /// Total time budget in milliseconds, measured from the first attempt
    #[serde(default = "default_poll_timeout")]
    pub timeout_ms: u64,

    /// Pause after each failed attempt in milliseconds
    #[serde(default = "default_poll_delay")]
    pub delay_ms: u64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout_ms: default_poll_timeout(),
            delay_ms: default_poll_delay(),
        }
    }
}

impl PollPolicy {
    /// Policy with the given timeout and the default 250ms delay
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout_ms: timeout.as_millis() as u64,
            ..Self::default()
        }
    }

    /// Replace the inter-attempt delay
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn delay_duration(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

fn default_poll_timeout() -> u64 {
    5_000
}
fn default_poll_delay() -> u64 {
    250
}

/// Runtime settings for a smoke run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RuntimeConfig {
    /// How long to wait for the cluster topology to become reachable
    #[serde(default = "default_ready_timeout")]
    pub cluster_ready_timeout_ms: u64,

    /// How long to wait for the bucket to report healthy nodes
    #[serde(default = "default_ready_timeout")]
    pub bucket_ready_timeout_ms: u64,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Poll policy for the search index to become queryable
    #[serde(default)]
    pub search_ready: PollPolicy,

    /// Leave the generated search index and design document in place
    #[serde(default)]
    pub keep_artifacts: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            cluster_ready_timeout_ms: default_ready_timeout(),
            bucket_ready_timeout_ms: default_ready_timeout(),
            request_timeout_ms: default_request_timeout(),
            search_ready: PollPolicy::default(),
            keep_artifacts: false,
        }
    }
}

fn default_ready_timeout() -> u64 {
    5_000
}
fn default_request_timeout() -> u64 {
    75_000
}

impl RuntimeConfig {
    /// Load from `path`, or return defaults when no path is given
    pub fn load(path: Option<&Utf8Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::config_not_found(path.as_str())
            } else {
                Error::Io(e)
            }
        })?;

        Self::from_yaml(&content)
    }

    /// Parse and validate YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty document means "all defaults"
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: RuntimeConfig = serde_yaml_ng::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.request_timeout_ms == 0 {
            return Err(Error::invalid_config("request-timeout-ms must be positive"));
        }
        if self.search_ready.delay_ms == 0 {
            return Err(Error::invalid_config("search-ready.delay-ms must be positive"));
        }
        Ok(())
    }

    pub fn cluster_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.cluster_ready_timeout_ms)
    }

    pub fn bucket_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.bucket_ready_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
