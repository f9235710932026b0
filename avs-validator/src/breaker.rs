//! Circuit breaker guarding the external address provider
//!
//! ## States
//!
//! - **Closed** (initial): calls pass through; every outcome feeds a bucketed
//!   rolling window.
//! - **Open**: entered when the window holds at least `volume_threshold`
//!   calls and the failure percentage meets `error_threshold_percentage`.
//!   Calls are rejected without running the operation.
//! - **Half-open**: the first call after `reset_timeout` becomes the single
//!   trial. Success closes the breaker and clears the window; failure
//!   reopens it with a fresh timer.
//!
//! While a trial is in flight every other caller is rejected as if the
//! breaker were open. A trial future dropped before completion counts as a
//! failed trial so the breaker can never wedge in half-open.
//!
//! Each call is bounded by `call_timeout`; expiry is a failure.
//!
//! State and counters sit behind one mutex. The lock is only taken for
//! admission and for recording an outcome, never across an `.await`.

use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Breaker tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Upper bound for a single provider call
    pub call_timeout: Duration,
    /// Failure percentage (1-100) at which the breaker opens
    pub error_threshold_percentage: u8,
    /// Time spent open before a trial call is admitted
    pub reset_timeout: Duration,
    /// Span of the rolling statistics window
    pub rolling_window: Duration,
    /// Number of buckets the window is divided into
    pub rolling_buckets: u32,
    /// Minimum calls in the window before the error rate is evaluated
    pub volume_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(10),
            error_threshold_percentage: 50,
            reset_timeout: Duration::from_secs(30),
            rolling_window: Duration::from_secs(10),
            rolling_buckets: 10,
            volume_threshold: 5,
        }
    }
}

/// Externally visible breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Point-in-time view for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub window_successes: u32,
    pub window_failures: u32,
    /// Milliseconds until a trial call will be admitted (open state only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

/// Failure of a guarded call
#[derive(Debug, Error)]
pub enum GateError<E> {
    /// Rejected without running the operation
    #[error("circuit breaker is open")]
    Open { retry_after: Option<Duration> },

    /// Operation exceeded the per-call timeout
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// Operation ran and failed
    #[error("{0}")]
    Failed(E),
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Closed,
    Open { since: Instant },
    /// A trial call is in flight
    HalfOpen,
}

#[derive(Debug, Clone, Copy)]
enum Admission {
    /// Closed-state call; `generation` ties the outcome to one closed period
    Normal { generation: u64 },
    Trial,
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    started: Instant,
    successes: u32,
    failures: u32,
}

/// Bucketed success/failure counts over a sliding time span
#[derive(Debug)]
struct RollingWindow {
    bucket_span: Duration,
    capacity: usize,
    buckets: VecDeque<Bucket>,
}

impl RollingWindow {
    fn new(window: Duration, buckets: u32) -> Self {
        let capacity = buckets.max(1) as usize;
        let bucket_span = (window / capacity as u32).max(Duration::from_millis(1));
        Self {
            bucket_span,
            capacity,
            buckets: VecDeque::with_capacity(capacity),
        }
    }

    fn span(&self) -> Duration {
        self.bucket_span * self.capacity as u32
    }

    fn evict(&mut self, now: Instant) {
        let span = self.span();
        while let Some(front) = self.buckets.front() {
            if now.saturating_duration_since(front.started) >= span {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }

    fn record(&mut self, now: Instant, success: bool) {
        self.evict(now);

        let needs_bucket = match self.buckets.back() {
            Some(last) => now.saturating_duration_since(last.started) >= self.bucket_span,
            None => true,
        };
        if needs_bucket {
            self.buckets.push_back(Bucket {
                started: now,
                successes: 0,
                failures: 0,
            });
            while self.buckets.len() > self.capacity {
                self.buckets.pop_front();
            }
        }

        if let Some(current) = self.buckets.back_mut() {
            if success {
                current.successes += 1;
            } else {
                current.failures += 1;
            }
        }
    }

    /// (successes, failures) still inside the window
    fn totals(&mut self, now: Instant) -> (u32, u32) {
        self.evict(now);
        self.buckets
            .iter()
            .fold((0, 0), |(s, f), b| (s + b.successes, f + b.failures))
    }

    fn clear(&mut self) {
        self.buckets.clear();
    }
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    window: RollingWindow,
    /// Bumped every time the breaker leaves the closed state
    generation: u64,
}

/// Circuit breaker for one external dependency
///
/// Construct once at startup and share via `Arc`.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        let window = RollingWindow::new(config.rolling_window, config.rolling_buckets);
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                phase: Phase::Closed,
                window,
                generation: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Current state
    ///
    /// An open breaker whose reset timeout has elapsed reports `HalfOpen`:
    /// the next call will be admitted as the trial.
    pub fn state(&self) -> CircuitState {
        self.snapshot().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let now = Instant::now();
        let mut inner = self.lock();
        let (window_successes, window_failures) = inner.window.totals(now);

        let (state, retry_after_ms) = match inner.phase {
            Phase::Closed => (CircuitState::Closed, None),
            Phase::HalfOpen => (CircuitState::HalfOpen, None),
            Phase::Open { since } => match self.remaining_open(since, now) {
                Some(remaining) => (CircuitState::Open, Some(remaining.as_millis() as u64)),
                None => (CircuitState::HalfOpen, None),
            },
        };

        BreakerSnapshot {
            state,
            window_successes,
            window_failures,
            retry_after_ms,
        }
    }

    /// Run `op` under the breaker
    ///
    /// `op` is only invoked when the call is admitted.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, GateError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let admission = self
            .admit()
            .map_err(|retry_after| GateError::Open { retry_after })?;

        let mut outcome = Outcome {
            breaker: self,
            admission,
            settled: false,
        };

        match tokio::time::timeout(self.config.call_timeout, op()).await {
            Ok(Ok(value)) => {
                outcome.settle(true);
                Ok(value)
            }
            Ok(Err(err)) => {
                outcome.settle(false);
                Err(GateError::Failed(err))
            }
            Err(_) => {
                outcome.settle(false);
                warn!(
                    breaker = %self.name,
                    timeout_ms = self.config.call_timeout.as_millis() as u64,
                    "Guarded call timed out"
                );
                Err(GateError::Timeout(self.config.call_timeout))
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remaining_open(&self, since: Instant, now: Instant) -> Option<Duration> {
        let elapsed = now.saturating_duration_since(since);
        self.config
            .reset_timeout
            .checked_sub(elapsed)
            .filter(|remaining| !remaining.is_zero())
    }

    /// Admission decision; `Err` carries the time until a trial is possible
    fn admit(&self) -> Result<Admission, Option<Duration>> {
        let now = Instant::now();
        let mut inner = self.lock();

        match inner.phase {
            Phase::Closed => Ok(Admission::Normal {
                generation: inner.generation,
            }),
            Phase::Open { since } => match self.remaining_open(since, now) {
                Some(remaining) => {
                    debug!(breaker = %self.name, "Rejecting call: circuit open");
                    Err(Some(remaining))
                }
                None => {
                    inner.phase = Phase::HalfOpen;
                    info!(breaker = %self.name, "Circuit half-open: admitting trial call");
                    Ok(Admission::Trial)
                }
            },
            Phase::HalfOpen => {
                debug!(breaker = %self.name, "Rejecting call: trial already in flight");
                Err(None)
            }
        }
    }

    fn record(&self, admission: Admission, success: bool) {
        let now = Instant::now();
        let mut inner = self.lock();

        match admission {
            Admission::Trial => {
                if success {
                    inner.phase = Phase::Closed;
                    inner.window.clear();
                    info!(breaker = %self.name, "Circuit closed: trial call succeeded");
                } else {
                    inner.phase = Phase::Open { since: now };
                    inner.generation += 1;
                    warn!(
                        breaker = %self.name,
                        reset_ms = self.config.reset_timeout.as_millis() as u64,
                        "Circuit reopened: trial call failed"
                    );
                }
            }
            Admission::Normal { generation } => {
                // Outcome belongs to a closed period that already ended
                if generation != inner.generation || !matches!(inner.phase, Phase::Closed) {
                    return;
                }

                inner.window.record(now, success);
                if success {
                    return;
                }

                let (successes, failures) = inner.window.totals(now);
                if self.should_trip(successes, failures) {
                    inner.phase = Phase::Open { since: now };
                    inner.generation += 1;
                    warn!(
                        breaker = %self.name,
                        successes,
                        failures,
                        threshold = self.config.error_threshold_percentage,
                        "Circuit opened: error rate threshold reached"
                    );
                }
            }
        }
    }

    fn should_trip(&self, successes: u32, failures: u32) -> bool {
        let total = u64::from(successes) + u64::from(failures);
        if total == 0 || total < u64::from(self.config.volume_threshold) {
            return false;
        }
        u64::from(failures) * 100 >= u64::from(self.config.error_threshold_percentage) * total
    }
}

/// Records the call outcome exactly once, including on cancellation
struct Outcome<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    settled: bool,
}

impl Outcome<'_> {
    fn settle(&mut self, success: bool) {
        self.settled = true;
        self.breaker.record(self.admission, success);
    }
}

impl Drop for Outcome<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        // Abandoned normal calls say nothing about the provider; an abandoned
        // trial must release half-open.
        if let Admission::Trial = self.admission {
            debug!(breaker = %self.breaker.name, "Trial call abandoned");
            self.breaker.record(self.admission, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_config() -> BreakerConfig {
        BreakerConfig {
            call_timeout: Duration::from_secs(1),
            error_threshold_percentage: 50,
            reset_timeout: Duration::from_secs(30),
            rolling_window: Duration::from_secs(10),
            rolling_buckets: 10,
            volume_threshold: 4,
        }
    }

    async fn succeed(breaker: &CircuitBreaker) {
        let result: Result<(), GateError<&str>> = breaker.call(|| async { Ok(()) }).await;
        assert!(result.is_ok());
    }

    async fn fail(breaker: &CircuitBreaker) {
        let result: Result<(), GateError<&str>> = breaker.call(|| async { Err("boom") }).await;
        assert!(matches!(result, Err(GateError::Failed("boom"))));
    }

    async fn trip(breaker: &CircuitBreaker) {
        for _ in 0..breaker.config().volume_threshold {
            fail(breaker).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_closed() {
        let breaker = CircuitBreaker::new("test", test_config());
        assert_eq!(breaker.state(), CircuitState::Closed);
        succeed(&breaker).await;
        assert_eq!(breaker.snapshot().window_successes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_at_threshold() {
        let breaker = CircuitBreaker::new("test", test_config());

        succeed(&breaker).await;
        succeed(&breaker).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
        fail(&breaker).await;

        // 2 of 4 failed = 50%
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_below_volume_threshold_stays_closed() {
        let breaker = CircuitBreaker::new("test", test_config());

        for _ in 0..3 {
            fail(&breaker).await;
        }

        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_rejects_without_running_op() {
        let breaker = CircuitBreaker::new("test", test_config());
        trip(&breaker).await;

        let calls = AtomicUsize::new(0);
        let result: Result<(), GateError<&str>> = breaker
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        match result {
            Err(GateError::Open { retry_after }) => {
                assert_eq!(retry_after, Some(Duration::from_secs(30)));
            }
            other => panic!("expected Open, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_success_closes() {
        let breaker = CircuitBreaker::new("test", test_config());
        trip(&breaker).await;

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        succeed(&breaker).await;

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.window_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens_with_fresh_timer() {
        let breaker = CircuitBreaker::new("test", test_config());
        trip(&breaker).await;

        tokio::time::advance(Duration::from_secs(31)).await;
        fail(&breaker).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_trial_in_flight() {
        let breaker = CircuitBreaker::new("test", test_config());
        trip(&breaker).await;
        tokio::time::advance(Duration::from_secs(30)).await;

        let (release, released) = tokio::sync::oneshot::channel::<()>();
        let trial = breaker.call(|| async move {
            let _ = released.await;
            Ok::<_, &str>("trial")
        });
        tokio::pin!(trial);
        assert!(futures::poll!(&mut trial).is_pending());

        let calls = AtomicUsize::new(0);
        let second: Result<(), GateError<&str>> = breaker
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(second, Err(GateError::Open { retry_after: None })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        release.send(()).unwrap();
        assert_eq!(trial.await.unwrap(), "trial");
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_trial_reopens() {
        let breaker = CircuitBreaker::new("test", test_config());
        trip(&breaker).await;
        tokio::time::advance(Duration::from_secs(30)).await;

        {
            let trial = breaker.call(|| std::future::pending::<Result<(), &str>>());
            tokio::pin!(trial);
            assert!(futures::poll!(&mut trial).is_pending());
        }

        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let config = BreakerConfig {
            volume_threshold: 1,
            ..test_config()
        };
        let breaker = CircuitBreaker::new("test", config);

        let result: Result<(), GateError<&str>> = breaker
            .call(|| async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(GateError::Timeout(d)) if d == Duration::from_secs(1)));
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_forgets_old_failures() {
        let breaker = CircuitBreaker::new("test", test_config());

        fail(&breaker).await;
        fail(&breaker).await;
        tokio::time::advance(Duration::from_secs(11)).await;

        succeed(&breaker).await;
        succeed(&breaker).await;
        succeed(&breaker).await;
        fail(&breaker).await;

        // Only 1 of 4 inside the window failed
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.window_failures, 1);
        assert_eq!(snapshot.window_successes, 3);
    }

    #[test]
    fn test_should_trip_math() {
        let breaker = CircuitBreaker::new("test", test_config());
        assert!(!breaker.should_trip(0, 0));
        assert!(!breaker.should_trip(0, 3));
        assert!(breaker.should_trip(2, 2));
        assert!(!breaker.should_trip(3, 2) && breaker.should_trip(2, 3));
    }
}
