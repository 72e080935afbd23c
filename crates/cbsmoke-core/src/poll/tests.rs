//! Behavioural tests for the readiness poller
//!
//! All tests run on a paused tokio clock: sleeps advance virtual time
//! instantly, so deadlines and spacing are exact.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::config::PollPolicy;
use crate::poll::executor::ReadinessPollerBuilder;
use crate::poll::observer::StatsObserver;

#[derive(Debug, Clone, PartialEq, Eq)]
enum ProbeError {
    NotReady { attempt: u32 },
}

impl std::fmt::Display for ProbeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeError::NotReady { attempt } => write!(f, "index not ready (attempt {})", attempt),
        }
    }
}

fn policy(timeout_ms: u64, delay_ms: u64) -> PollPolicy {
    PollPolicy {
        timeout_ms,
        delay_ms,
    }
}

/// Probe that fails the first `failures` calls and records call instants
struct ScriptedProbe {
    failures: u32,
    calls: AtomicU32,
    instants: Mutex<Vec<Instant>>,
}

impl ScriptedProbe {
    fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: AtomicU32::new(0),
            instants: Mutex::new(Vec::new()),
        })
    }

    async fn call(&self) -> Result<&'static str, ProbeError> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.instants.lock().unwrap().push(Instant::now());
        if attempt <= self.failures {
            Err(ProbeError::NotReady { attempt })
        } else {
            Ok("search hits")
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn instants(&self) -> Vec<Instant> {
        self.instants.lock().unwrap().clone()
    }
}

// ============================================================================
// Eventual success
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_eventual_success_invokes_probe_n_plus_one_times() {
    for failures in [0u32, 1, 4, 10] {
        let probe = ScriptedProbe::new(failures);
        let p = probe.clone();

        let result = ReadinessPollerBuilder::new()
            .with_policy(policy(60_000, 250))
            .build()
            .poll(|| {
                let p = p.clone();
                async move { p.call().await }
            })
            .await;

        assert_eq!(result, Ok(()));
        assert_eq!(probe.calls(), failures + 1);
    }
}

// ============================================================================
// Deadline exhaustion
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_deadline_exhaustion_surfaces_last_error() {
    let probe = ScriptedProbe::new(u32::MAX);
    let p = probe.clone();
    let start = Instant::now();

    let err = ReadinessPollerBuilder::new()
        .with_policy(policy(2_000, 250))
        .build()
        .poll(|| {
            let p = p.clone();
            async move { p.call().await }
        })
        .await
        .unwrap_err();

    assert!(start.elapsed() >= Duration::from_secs(2));
    // The error is the exact one produced by the final attempt
    assert_eq!(err, ProbeError::NotReady { attempt: probe.calls() });
}

#[tokio::test(start_paused = true)]
async fn test_no_attempt_after_deadline() {
    let observer = Arc::new(StatsObserver::new());
    let probe = ScriptedProbe::new(u32::MAX);
    let p = probe.clone();

    let _ = ReadinessPollerBuilder::new()
        .with_policy(policy(1_000, 300))
        .with_observer(observer.clone())
        .build()
        .poll(|| {
            let p = p.clone();
            async move { p.call().await }
        })
        .await;

    // Attempts at 0, 300, 600, 900 and 1200ms; the last one is past the deadline
    assert_eq!(probe.calls(), 5);
    assert_eq!(observer.deadlines(), 1);
    assert_eq!(observer.failures(), 4);
}

// ============================================================================
// At-least-one attempt
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_zero_timeout_still_attempts_once() {
    let probe = ScriptedProbe::new(u32::MAX);
    let p = probe.clone();
    let start = Instant::now();

    let err = ReadinessPollerBuilder::new()
        .with_policy(policy(0, 250))
        .build()
        .poll(|| {
            let p = p.clone();
            async move { p.call().await }
        })
        .await
        .unwrap_err();

    assert_eq!(probe.calls(), 1);
    assert_eq!(err, ProbeError::NotReady { attempt: 1 });
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_slow_probe_past_deadline_is_attempted_once() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();

    let result = ReadinessPollerBuilder::new()
        .with_policy(policy(1_000, 250))
        .build()
        .poll(|| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(3)).await;
                Err::<(), _>("request timed out")
            }
        })
        .await;

    assert_eq!(result, Err("request timed out"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Immediate success short-circuits
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_immediate_success_has_no_delay() {
    let probe = ScriptedProbe::new(0);
    let p = probe.clone();
    let start = Instant::now();

    let result = ReadinessPollerBuilder::new()
        .with_policy(policy(5_000, 250))
        .build()
        .poll(|| {
            let p = p.clone();
            async move { p.call().await }
        })
        .await;

    assert!(result.is_ok());
    assert_eq!(probe.calls(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

// ============================================================================
// Success payload is not leaked
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_success_payload_is_discarded() {
    let result: Result<(), std::io::Error> = ReadinessPollerBuilder::new()
        .build()
        .poll(|| async { Ok(vec![1u8, 2, 3]) })
        .await;

    assert!(matches!(result, Ok(())));
}

// ============================================================================
// Delay spacing
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_failed_attempts_are_spaced_by_delay() {
    let probe = ScriptedProbe::new(6);
    let p = probe.clone();

    ReadinessPollerBuilder::new()
        .with_policy(policy(10_000, 400))
        .build()
        .poll(|| {
            let p = p.clone();
            async move { p.call().await }
        })
        .await
        .unwrap();

    let instants = probe.instants();
    assert_eq!(instants.len(), 7);
    for pair in instants.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(400));
    }
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_pre_cancelled_still_attempts_once() {
    let (tx, rx) = watch::channel(true);
    let observer = Arc::new(StatsObserver::new());
    let probe = ScriptedProbe::new(u32::MAX);
    let p = probe.clone();

    let err = ReadinessPollerBuilder::new()
        .with_policy(policy(60_000, 250))
        .with_observer(observer.clone())
        .with_cancellation(rx)
        .build()
        .poll(|| {
            let p = p.clone();
            async move { p.call().await }
        })
        .await
        .unwrap_err();

    assert_eq!(probe.calls(), 1);
    assert_eq!(err, ProbeError::NotReady { attempt: 1 });
    assert_eq!(observer.cancellations(), 1);
    drop(tx);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_wait() {
    let (tx, rx) = watch::channel(false);
    let probe = ScriptedProbe::new(u32::MAX);
    let p = probe.clone();
    let start = Instant::now();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(600)).await;
        let _ = tx.send(true);
    });

    let err = ReadinessPollerBuilder::new()
        .with_policy(policy(60_000, 250))
        .with_cancellation(rx)
        .build()
        .poll(|| {
            let p = p.clone();
            async move { p.call().await }
        })
        .await
        .unwrap_err();

    // Attempts at 0, 250 and 500ms; the wait towards 750ms is cut at 600ms
    assert_eq!(probe.calls(), 3);
    assert_eq!(err, ProbeError::NotReady { attempt: 3 });
    assert!(start.elapsed() < Duration::from_millis(750));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_sender_never_cancels() {
    let (tx, rx) = watch::channel(false);
    drop(tx);
    let probe = ScriptedProbe::new(3);
    let p = probe.clone();

    let result = ReadinessPollerBuilder::new()
        .with_policy(policy(60_000, 250))
        .with_cancellation(rx)
        .build()
        .poll(|| {
            let p = p.clone();
            async move { p.call().await }
        })
        .await;

    assert_eq!(result, Ok(()));
    assert_eq!(probe.calls(), 4);
}
