//! Generic three-state circuit breaker.
//!
//! # Design
//! - All mutable state sits behind one mutex that is never held across an
//!   await; the protected future runs with the lock released.
//! - Open becomes half-open lazily, on the first observation after the
//!   cool-down. There is no background timer.
//! - Each transition bumps a generation number. Outcomes are recorded only if
//!   the generation still matches the one the call was admitted under, so a
//!   slow call from an older state cannot flip a newer one.
//! - Listeners run after the lock is released.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use turnstile_config::BreakerConfig;

/// Callback invoked with `(name, from, to)` on every state change.
pub type TransitionListener = Arc<dyn Fn(&str, BreakerState, BreakerState) + Send + Sync>;

/// Breaker state as observed by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakerState {
    /// Calls pass through; failures are counted.
    Closed,
    /// Calls are rejected without invoking the operation.
    Open,
    /// A limited number of trial calls are admitted.
    HalfOpen,
}

impl BreakerState {
    /// Stable lowercase label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half-open",
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure returned by [`CircuitBreaker::call`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The breaker is open; the operation was not invoked.
    #[error("circuit breaker is open")]
    Open,
    /// The half-open trial budget is exhausted; the operation was not invoked.
    #[error("circuit breaker half-open trial budget exhausted")]
    TooManyRequests,
    /// The operation ran and failed.
    #[error(transparent)]
    Inner(E),
}

/// Tuning for a [`CircuitBreaker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerSettings {
    /// Name reported to listeners.
    pub name: String,
    /// Consecutive failures in the closed state that open the breaker.
    pub failure_threshold: u32,
    /// Time spent open before a trial call is admitted.
    pub cooldown: Duration,
    /// Concurrent trial calls admitted while half-open.
    pub half_open_max_calls: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            name: "circuit-breaker".to_string(),
            failure_threshold: 5,
            cooldown: Duration::from_secs(10),
            half_open_max_calls: 1,
        }
    }
}

impl From<&BreakerConfig> for BreakerSettings {
    fn from(config: &BreakerConfig) -> Self {
        Self {
            name: config.name.clone(),
            failure_threshold: config.failure_threshold,
            cooldown: config.cooldown,
            half_open_max_calls: config.half_open_max_calls,
        }
    }
}

/// Failure-counting breaker shared across concurrent callers.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<Inner>,
}

struct Inner {
    settings: BreakerSettings,
    machine: Mutex<Machine>,
    listeners: Mutex<Vec<TransitionListener>>,
}

struct Machine {
    state: BreakerState,
    generation: u64,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trials_in_flight: u32,
}

type Transition = (BreakerState, BreakerState);

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("settings", &self.inner.settings)
            .field("state", &self.lock().state)
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    /// Create a closed breaker.
    #[must_use]
    pub fn new(mut settings: BreakerSettings) -> Self {
        settings.failure_threshold = settings.failure_threshold.max(1);
        settings.half_open_max_calls = settings.half_open_max_calls.max(1);
        Self {
            inner: Arc::new(Inner {
                settings,
                machine: Mutex::new(Machine {
                    state: BreakerState::Closed,
                    generation: 0,
                    consecutive_failures: 0,
                    opened_at: None,
                    trials_in_flight: 0,
                }),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Breaker name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.settings.name
    }

    /// Register a transition listener.
    pub fn on_transition(&self, listener: TransitionListener) {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Current state, applying the lazy open to half-open step.
    #[must_use]
    pub fn state(&self) -> BreakerState {
        let mut machine = self.lock();
        let transition = self.maybe_half_open(&mut machine);
        let state = machine.state;
        drop(machine);
        self.notify(transition);
        state
    }

    /// Run `operation` under breaker protection.
    ///
    /// # Errors
    ///
    /// Returns [`BreakerError::Open`] or [`BreakerError::TooManyRequests`]
    /// without invoking `operation` when the breaker rejects the call, and
    /// [`BreakerError::Inner`] when the operation itself fails.
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut permit = self.admit()?;
        let outcome = operation().await;
        permit.complete(outcome.is_ok());
        outcome.map_err(BreakerError::Inner)
    }

    fn admit<E>(&self) -> Result<Permit<'_>, BreakerError<E>> {
        let mut machine = self.lock();
        let transition = self.maybe_half_open(&mut machine);
        let admitted = match machine.state {
            BreakerState::Closed => Ok(Permit {
                breaker: self,
                generation: machine.generation,
                trial: false,
                done: false,
            }),
            BreakerState::Open => Err(BreakerError::Open),
            BreakerState::HalfOpen => {
                if machine.trials_in_flight >= self.inner.settings.half_open_max_calls {
                    Err(BreakerError::TooManyRequests)
                } else {
                    machine.trials_in_flight += 1;
                    Ok(Permit {
                        breaker: self,
                        generation: machine.generation,
                        trial: true,
                        done: false,
                    })
                }
            }
        };
        drop(machine);
        self.notify(transition);
        admitted
    }

    fn record(&self, generation: u64, success: bool) {
        let mut machine = self.lock();
        if machine.generation != generation {
            return;
        }
        let transition = match (machine.state, success) {
            (BreakerState::Closed, true) => {
                machine.consecutive_failures = 0;
                None
            }
            (BreakerState::Closed, false) => {
                machine.consecutive_failures += 1;
                if machine.consecutive_failures >= self.inner.settings.failure_threshold {
                    Some(Self::transition(&mut machine, BreakerState::Open))
                } else {
                    None
                }
            }
            (BreakerState::HalfOpen, true) => {
                Some(Self::transition(&mut machine, BreakerState::Closed))
            }
            (BreakerState::HalfOpen, false) => {
                Some(Self::transition(&mut machine, BreakerState::Open))
            }
            (BreakerState::Open, _) => None,
        };
        drop(machine);
        self.notify(transition);
    }

    fn release_trial(&self, generation: u64) {
        let mut machine = self.lock();
        if machine.generation == generation && machine.state == BreakerState::HalfOpen {
            machine.trials_in_flight = machine.trials_in_flight.saturating_sub(1);
        }
    }

    fn maybe_half_open(&self, machine: &mut Machine) -> Option<Transition> {
        if machine.state != BreakerState::Open {
            return None;
        }
        let elapsed = machine
            .opened_at
            .is_none_or(|opened| opened.elapsed() >= self.inner.settings.cooldown);
        elapsed.then(|| Self::transition(machine, BreakerState::HalfOpen))
    }

    fn transition(machine: &mut Machine, to: BreakerState) -> Transition {
        let from = machine.state;
        machine.state = to;
        machine.generation = machine.generation.wrapping_add(1);
        machine.consecutive_failures = 0;
        machine.trials_in_flight = 0;
        machine.opened_at = (to == BreakerState::Open).then(Instant::now);
        (from, to)
    }

    fn notify(&self, transition: Option<Transition>) {
        let Some((from, to)) = transition else {
            return;
        };
        let listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener(&self.inner.settings.name, from, to);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Machine> {
        self.inner
            .machine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission for one call. Dropping it without an outcome (the caller's
/// future was cancelled) frees a half-open trial slot without counting a
/// success or failure.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    trial: bool,
    done: bool,
}

impl Permit<'_> {
    fn complete(&mut self, success: bool) {
        self.done = true;
        self.breaker.record(self.generation, success);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.done && self.trial {
            self.breaker.release_trial(self.generation);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn settings(threshold: u32, cooldown_ms: u64, half_open: u32) -> BreakerSettings {
        BreakerSettings {
            name: "test-cb".to_string(),
            failure_threshold: threshold,
            cooldown: Duration::from_millis(cooldown_ms),
            half_open_max_calls: half_open,
        }
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
        breaker.call(|| async { Err::<(), _>("boom") }).await
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<u32, BreakerError<&'static str>> {
        breaker.call(|| async { Ok(7) }).await
    }

    fn recorder(breaker: &CircuitBreaker) -> Arc<Mutex<Vec<(String, BreakerState, BreakerState)>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        breaker.on_transition(Arc::new(move |name, from, to| {
            sink.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((name.to_string(), from, to));
        }));
        seen
    }

    #[tokio::test(start_paused = true)]
    async fn opens_on_the_nth_consecutive_failure() {
        let breaker = CircuitBreaker::new(settings(3, 1_000, 1));
        for _ in 0..2 {
            assert!(matches!(fail(&breaker).await, Err(BreakerError::Inner("boom"))));
        }
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(matches!(fail(&breaker).await, Err(BreakerError::Inner(_))));
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_the_failure_count() {
        let breaker = CircuitBreaker::new(settings(3, 1_000, 1));
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        assert!(matches!(succeed(&breaker).await, Ok(7)));
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn open_breaker_never_invokes_the_operation() {
        let breaker = CircuitBreaker::new(settings(1, 1_000, 1));
        let _ = fail(&breaker).await;

        let invoked = AtomicUsize::new(0);
        let result = breaker
            .call(|| async {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &'static str>(())
            })
            .await;
        assert!(matches!(result, Err(BreakerError::Open)));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_success_closes_and_failure_reopens() {
        let breaker = CircuitBreaker::new(settings(1, 500, 1));
        let seen = recorder(&breaker);

        let _ = fail(&breaker).await;
        tokio::time::advance(Duration::from_millis(499)).await;
        assert_eq!(breaker.state(), BreakerState::Open);
        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(succeed(&breaker).await.is_ok());
        assert_eq!(breaker.state(), BreakerState::Closed);

        let transitions: Vec<_> = seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, from, to)| (name.clone(), from.as_str(), to.as_str()))
            .collect();
        assert_eq!(
            transitions,
            vec![
                ("test-cb".to_string(), "closed", "open"),
                ("test-cb".to_string(), "open", "half-open"),
                ("test-cb".to_string(), "half-open", "open"),
                ("test-cb".to_string(), "open", "half-open"),
                ("test-cb".to_string(), "half-open", "closed"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn half_open_admits_exactly_the_trial_budget() {
        let breaker = CircuitBreaker::new(settings(1, 100, 2));
        let _ = fail(&breaker).await;
        tokio::time::advance(Duration::from_millis(100)).await;

        let (release_tx, release_rx) = tokio::sync::watch::channel(false);
        let mut trials = Vec::new();
        for _ in 0..2 {
            let breaker = breaker.clone();
            let mut release = release_rx.clone();
            trials.push(tokio::spawn(async move {
                breaker
                    .call(|| async move {
                        let _ = release.changed().await;
                        Ok::<_, &'static str>(())
                    })
                    .await
            }));
        }
        tokio::task::yield_now().await;

        assert!(matches!(
            succeed(&breaker).await,
            Err(BreakerError::TooManyRequests)
        ));

        let _ = release_tx.send(true);
        for trial in trials {
            assert!(matches!(trial.await, Ok(Ok(()))));
        }
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_outcomes_do_not_flip_a_newer_state() {
        let breaker = CircuitBreaker::new(settings(1, 100, 1));
        let (release_tx, release_rx) = tokio::sync::watch::channel(false);

        let slow = {
            let breaker = breaker.clone();
            let mut release = release_rx.clone();
            tokio::spawn(async move {
                breaker
                    .call(|| async move {
                        let _ = release.changed().await;
                        Err::<(), _>("late failure")
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        let _ = fail(&breaker).await;
        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(succeed(&breaker).await.is_ok());
        assert_eq!(breaker.state(), BreakerState::Closed);

        let _ = release_tx.send(true);
        assert!(matches!(slow.await, Ok(Err(BreakerError::Inner(_)))));
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_trial_frees_its_slot() {
        let breaker = CircuitBreaker::new(settings(1, 100, 1));
        let _ = fail(&breaker).await;
        tokio::time::advance(Duration::from_millis(100)).await;

        let pending = breaker.call(|| std::future::pending::<Result<(), &'static str>>());
        let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());

        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        assert!(succeed(&breaker).await.is_ok());
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[test]
    fn zero_limits_are_clamped() {
        let breaker = CircuitBreaker::new(settings(0, 10, 0));
        assert_eq!(breaker.inner.settings.failure_threshold, 1);
        assert_eq!(breaker.inner.settings.half_open_max_calls, 1);
        assert_eq!(breaker.name(), "test-cb");
    }
}
