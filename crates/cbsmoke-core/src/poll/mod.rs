//! Readiness polling against a deadline
//!
//! Resources created asynchronously on the server (a search index, a bucket
//! after creation, the cluster topology during startup) become usable only
//! after an unspecified delay. The poller repeatedly invokes a caller-supplied
//! probe until it succeeds or a wall-clock budget runs out.
//!
//! # Contract
//!
//! - The probe always runs at least once, whatever the timeout.
//! - The first success returns `Ok(())` immediately, without sleeping. The
//!   probe's success value is discarded.
//! - After a failure the poller sleeps for a fixed delay (250ms by default)
//!   while the deadline has not passed, then tries again.
//! - Once the deadline has passed, the most recent probe error is returned
//!   unchanged. No synthetic timeout error exists.
//! - Every failure is retried; classification is left to the probe.
//! - An optional cancellation signal cuts the inter-attempt sleep short and
//!   returns the last error.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use cbsmoke_core::poll::poll_until_ready;
//!
//! async fn example() -> Result<(), std::io::Error> {
//!     poll_until_ready(Duration::from_secs(5), || async {
//!         // Query something that becomes available eventually
//!         Ok::<_, std::io::Error>(())
//!     })
//!     .await
//! }
//! ```

mod executor;
mod observer;

pub use executor::{poll_until_ready, ReadinessPoller, ReadinessPollerBuilder};
pub use observer::{NoOpObserver, PollObserver, StatsObserver, TracingObserver};

#[cfg(test)]
mod tests;
