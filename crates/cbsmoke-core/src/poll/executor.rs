//! Readiness poll execution
//!
//! The deadline is measured with `tokio::time::Instant`, so tests running on
//! a paused runtime clock control both the deadline and the sleeps.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::PollPolicy;

use super::observer::{NoOpObserver, PollObserver};

/// Poll `probe` until it succeeds or `timeout` has elapsed, using the default
/// 250ms inter-attempt delay.
///
/// # Returns
///
/// `Ok(())` on the first successful attempt, or the last probe error once
/// the deadline has passed.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
/// use cbsmoke_core::poll::poll_until_ready;
///
/// async fn example() {
///     let result = poll_until_ready(Duration::from_secs(5), || async {
///         Ok::<_, std::io::Error>("hits")
///     })
///     .await;
///     assert!(result.is_ok());
/// }
/// ```
pub async fn poll_until_ready<F, Fut, T, E>(timeout: Duration, probe: F) -> Result<(), E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    ReadinessPollerBuilder::new()
        .with_policy(PollPolicy::with_timeout(timeout))
        .build()
        .poll(probe)
        .await
}

/// Builder for configuring a `ReadinessPoller`
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use cbsmoke_core::poll::{ReadinessPollerBuilder, TracingObserver};
/// use cbsmoke_core::PollPolicy;
///
/// let poller = ReadinessPollerBuilder::new()
///     .with_policy(PollPolicy::with_timeout(Duration::from_secs(5)))
///     .with_observer(TracingObserver::new("search index"))
///     .build();
/// ```
pub struct ReadinessPollerBuilder<O = NoOpObserver> {
    policy: PollPolicy,
    observer: O,
    cancel: Option<watch::Receiver<bool>>,
}

impl Default for ReadinessPollerBuilder<NoOpObserver> {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadinessPollerBuilder<NoOpObserver> {
    pub fn new() -> Self {
        Self {
            policy: PollPolicy::default(),
            observer: NoOpObserver,
            cancel: None,
        }
    }
}

impl<O> ReadinessPollerBuilder<O> {
    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_observer<O2>(self, observer: O2) -> ReadinessPollerBuilder<O2> {
        ReadinessPollerBuilder {
            policy: self.policy,
            observer,
            cancel: self.cancel,
        }
    }

    /// Abort the wait between attempts once the channel carries `true`.
    ///
    /// A dropped sender never cancels.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> ReadinessPoller<O> {
        ReadinessPoller {
            timeout: self.policy.timeout_duration(),
            delay: self.policy.delay_duration(),
            observer: self.observer,
            cancel: self.cancel,
        }
    }
}

/// Retries a probe until it succeeds or the deadline passes
///
/// Use `ReadinessPollerBuilder` to create an instance.
pub struct ReadinessPoller<O> {
    timeout: Duration,
    delay: Duration,
    observer: O,
    cancel: Option<watch::Receiver<bool>>,
}

impl<O> ReadinessPoller<O>
where
    O: PollObserver,
{
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `probe` until it succeeds or the deadline passes.
    ///
    /// The probe's success value is dropped; only readiness is reported.
    pub async fn poll<F, Fut, T, E>(&self, mut probe: F) -> Result<(), E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let start = Instant::now();
        let mut cancel = self.cancel.clone();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            self.observer.on_attempt_start(attempt);

            let last_error = match probe().await {
                Ok(_) => {
                    self.observer.on_ready(attempt, start.elapsed());
                    return Ok(());
                }
                Err(err) => err,
            };

            if start.elapsed() >= self.timeout {
                self.observer.on_deadline_exceeded(attempt, &last_error);
                return Err(last_error);
            }

            self.observer
                .on_attempt_failed(attempt, &last_error, self.delay);

            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = cancelled(&mut cancel) => {
                    self.observer.on_cancelled(attempt, &last_error);
                    return Err(last_error);
                }
            }
        }
    }
}

/// Resolves once the cancellation channel carries `true`; pending forever
/// when there is no channel or its sender is gone.
async fn cancelled(cancel: &mut Option<watch::Receiver<bool>>) {
    if let Some(rx) = cancel.as_mut() {
        if rx.wait_for(|stop| *stop).await.is_ok() {
            return;
        }
    }
    std::future::pending::<()>().await
}
