//! Poll attempt observation and logging
//!
//! The `PollObserver` trait receives callbacks while a readiness poll runs.
//! `TracingObserver` logs through `tracing`; `StatsObserver` counts events
//! and is mostly useful in tests.

use std::fmt::Display;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Observer trait for readiness poll events
pub trait PollObserver: Send + Sync {
    /// Called right before the probe runs
    ///
    /// # Arguments
    ///
    /// * `attempt` - The attempt number (1-indexed)
    fn on_attempt_start(&self, attempt: u32);

    /// Called when an attempt failed and the poller will sleep and retry
    fn on_attempt_failed(&self, attempt: u32, error: &dyn Display, delay: Duration);

    /// Called when the probe succeeded
    fn on_ready(&self, attempt: u32, elapsed: Duration);

    /// Called when the deadline has passed; `final_error` is returned to the caller
    fn on_deadline_exceeded(&self, attempts: u32, final_error: &dyn Display);

    /// Called when the cancellation signal interrupted the wait
    fn on_cancelled(&self, attempts: u32, last_error: &dyn Display) {
        let _ = (attempts, last_error);
    }
}

/// An observer that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl PollObserver for NoOpObserver {
    fn on_attempt_start(&self, _attempt: u32) {}

    fn on_attempt_failed(&self, _attempt: u32, _error: &dyn Display, _delay: Duration) {}

    fn on_ready(&self, _attempt: u32, _elapsed: Duration) {}

    fn on_deadline_exceeded(&self, _attempts: u32, _final_error: &dyn Display) {}
}

/// An observer that logs poll events using the `tracing` crate
///
/// # Log Levels
///
/// - `on_attempt_start`: TRACE
/// - `on_attempt_failed`: WARN
/// - `on_ready`: INFO after retries, DEBUG on the first attempt
/// - `on_deadline_exceeded`: ERROR
/// - `on_cancelled`: WARN
#[derive(Debug, Clone)]
pub struct TracingObserver {
    /// What is being waited for (for log context)
    resource: String,
}

impl TracingObserver {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new("resource")
    }
}

impl PollObserver for TracingObserver {
    fn on_attempt_start(&self, attempt: u32) {
        tracing::trace!(resource = %self.resource, attempt, "probing");
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn Display, delay: Duration) {
        tracing::warn!(
            resource = %self.resource,
            attempt,
            error = %error,
            delay_ms = delay.as_millis() as u64,
            "retrying {} (waiting for readiness)",
            self.resource
        );
    }

    fn on_ready(&self, attempt: u32, elapsed: Duration) {
        if attempt > 1 {
            tracing::info!(
                resource = %self.resource,
                attempt,
                elapsed_ms = elapsed.as_millis() as u64,
                "ready after retry"
            );
        } else {
            tracing::debug!(
                resource = %self.resource,
                elapsed_ms = elapsed.as_millis() as u64,
                "ready on first attempt"
            );
        }
    }

    fn on_deadline_exceeded(&self, attempts: u32, final_error: &dyn Display) {
        tracing::error!(
            resource = %self.resource,
            attempts,
            error = %final_error,
            "gave up waiting for readiness"
        );
    }

    fn on_cancelled(&self, attempts: u32, last_error: &dyn Display) {
        tracing::warn!(
            resource = %self.resource,
            attempts,
            error = %last_error,
            "readiness wait cancelled"
        );
    }
}

/// An observer that counts poll events
#[derive(Debug, Default)]
pub struct StatsObserver {
    pub attempt_starts: AtomicU32,
    pub failures: AtomicU32,
    pub readies: AtomicU32,
    pub deadlines: AtomicU32,
    pub cancellations: AtomicU32,
}

impl StatsObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempt_starts(&self) -> u32 {
        self.attempt_starts.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn readies(&self) -> u32 {
        self.readies.load(Ordering::SeqCst)
    }

    pub fn deadlines(&self) -> u32 {
        self.deadlines.load(Ordering::SeqCst)
    }

    pub fn cancellations(&self) -> u32 {
        self.cancellations.load(Ordering::SeqCst)
    }
}

impl PollObserver for StatsObserver {
    fn on_attempt_start(&self, _attempt: u32) {
        self.attempt_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_attempt_failed(&self, _attempt: u32, _error: &dyn Display, _delay: Duration) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    fn on_ready(&self, _attempt: u32, _elapsed: Duration) {
        self.readies.fetch_add(1, Ordering::SeqCst);
    }

    fn on_deadline_exceeded(&self, _attempts: u32, _final_error: &dyn Display) {
        self.deadlines.fetch_add(1, Ordering::SeqCst);
    }

    fn on_cancelled(&self, _attempts: u32, _last_error: &dyn Display) {
        self.cancellations.fetch_add(1, Ordering::SeqCst);
    }
}

impl<T: PollObserver + ?Sized> PollObserver for std::sync::Arc<T> {
    fn on_attempt_start(&self, attempt: u32) {
        (**self).on_attempt_start(attempt)
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn Display, delay: Duration) {
        (**self).on_attempt_failed(attempt, error, delay)
    }

    fn on_ready(&self, attempt: u32, elapsed: Duration) {
        (**self).on_ready(attempt, elapsed)
    }

    fn on_deadline_exceeded(&self, attempts: u32, final_error: &dyn Display) {
        (**self).on_deadline_exceeded(attempts, final_error)
    }

    fn on_cancelled(&self, attempts: u32, last_error: &dyn Display) {
        (**self).on_cancelled(attempts, last_error)
    }
}

impl<T: PollObserver + ?Sized> PollObserver for Box<T> {
    fn on_attempt_start(&self, attempt: u32) {
        (**self).on_attempt_start(attempt)
    }

    fn on_attempt_failed(&self, attempt: u32, error: &dyn Display, delay: Duration) {
        (**self).on_attempt_failed(attempt, error, delay)
    }

    fn on_ready(&self, attempt: u32, elapsed: Duration) {
        (**self).on_ready(attempt, elapsed)
    }

    fn on_deadline_exceeded(&self, attempts: u32, final_error: &dyn Display) {
        (**self).on_deadline_exceeded(attempts, final_error)
    }

    fn on_cancelled(&self, attempts: u32, last_error: &dyn Display) {
        (**self).on_cancelled(attempts, last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_observer() {
        let observer = NoOpObserver;
        let error = "index not ready";

        observer.on_attempt_start(1);
        observer.on_attempt_failed(1, &error, Duration::from_millis(250));
        observer.on_ready(2, Duration::from_millis(250));
        observer.on_deadline_exceeded(3, &error);
        observer.on_cancelled(2, &error);
    }

    #[test]
    fn test_stats_observer_counts() {
        let observer = StatsObserver::new();
        let error = "index not ready";

        observer.on_attempt_start(1);
        observer.on_attempt_failed(1, &error, Duration::from_millis(250));
        observer.on_attempt_start(2);
        observer.on_deadline_exceeded(2, &error);

        assert_eq!(observer.attempt_starts(), 2);
        assert_eq!(observer.failures(), 1);
        assert_eq!(observer.readies(), 0);
        assert_eq!(observer.deadlines(), 1);
    }

    #[test]
    fn test_tracing_observer_resource() {
        let observer = TracingObserver::new("search index idx-1234abcd");
        assert_eq!(observer.resource(), "search index idx-1234abcd");
        assert_eq!(TracingObserver::default().resource(), "resource");
    }

    #[test]
    fn test_arc_observer_forwards() {
        let observer = std::sync::Arc::new(StatsObserver::new());
        observer.on_attempt_start(1);
        observer.on_ready(1, Duration::ZERO);
        observer.on_cancelled(1, &"stop");

        assert_eq!(observer.attempt_starts(), 1);
        assert_eq!(observer.readies(), 1);
        assert_eq!(observer.cancellations(), 1);
    }
}
