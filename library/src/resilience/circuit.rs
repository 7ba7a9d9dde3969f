use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// State of a [`CircuitBreaker`]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through, failures are counted
    Closed = 0,
    /// Calls are rejected until the cool-down elapsed
    Open = 1,
    /// A single trial call is admitted to decide whether to close again
    HalfOpen = 2,
}

impl CircuitState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            _ => CircuitState::HalfOpen,
        }
    }
}

/// Thresholds of a [`CircuitBreaker`]
#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    /// Consecutive failures after which the circuit opens
    pub failure_threshold: u32,
    /// Time the circuit stays open before admitting a trial call
    pub cool_down: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 2,
            cool_down: Duration::from_secs(10 * 60 * 60),
        }
    }
}

struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Consecutive-failure circuit breaker
///
/// Transitions happen under a mutex, the current state is mirrored into an atomic for lock-free reads.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    state: AtomicU8,
    circuit: Mutex<Circuit>,
}

impl CircuitBreaker {
    /// Creates a closed breaker
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: AtomicU8::new(CircuitState::Closed as u8),
            circuit: Mutex::new(Circuit {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Current state without taking the lock
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn lock(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, circuit: &mut Circuit, to: CircuitState) {
        if circuit.state != to {
            info!(breaker = %self.name, from = ?circuit.state, ?to, "Circuit breaker changed state");
        }

        circuit.state = to;
        self.state.store(to as u8, Ordering::Release);
    }

    /// Asks for permission to call the guarded provider
    ///
    /// Always granted while closed. Once the cool-down of an open circuit elapsed exactly one caller
    /// is admitted for a trial call, everybody else is rejected until its [`Permit`] has been settled or dropped.
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        let mut circuit = self.lock();

        let granted = match circuit.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let cooled_down = circuit
                    .opened_at
                    .map(|opened_at| opened_at.elapsed() >= self.config.cool_down)
                    .unwrap_or(true);

                if cooled_down {
                    self.transition(&mut circuit, CircuitState::HalfOpen);
                    circuit.trial_in_flight = true;
                }

                cooled_down
            }
            CircuitState::HalfOpen => {
                if circuit.trial_in_flight {
                    false
                } else {
                    circuit.trial_in_flight = true;
                    true
                }
            }
        };

        granted.then(|| Permit {
            breaker: self,
            settled: false,
        })
    }

    fn record_success(&self) {
        let mut circuit = self.lock();
        circuit.consecutive_failures = 0;
        circuit.trial_in_flight = false;
        circuit.opened_at = None;
        self.transition(&mut circuit, CircuitState::Closed);
    }

    fn record_failure(&self) {
        let mut circuit = self.lock();
        circuit.consecutive_failures = circuit.consecutive_failures.saturating_add(1);
        circuit.trial_in_flight = false;

        let trip = match circuit.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => circuit.consecutive_failures >= self.config.failure_threshold,
            CircuitState::Open => false,
        };

        if trip {
            warn!(
                breaker = %self.name,
                failures = circuit.consecutive_failures,
                cool_down = ?self.config.cool_down,
                "Opening circuit"
            );
            circuit.opened_at = Some(Instant::now());
            self.transition(&mut circuit, CircuitState::Open);
        }
    }

    fn release(&self) {
        self.lock().trial_in_flight = false;
    }
}

/// Admission to call the provider guarded by a [`CircuitBreaker`]
///
/// The outcome of the call is reported by consuming the permit. A permit dropped without a verdict,
/// e.g. because the call was cancelled, is released without affecting the failure count and a
/// half-open circuit admits the next trial call.
#[must_use = "an unsettled permit does not report the outcome of the call"]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl Permit<'_> {
    /// Reports a successful call, closing the circuit
    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    /// Reports a failed call
    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }

    /// Reports a call whose outcome says nothing about the health of the provider
    pub fn release(mut self) {
        self.settled = true;
        self.breaker.release();
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!(breaker = %self.breaker.name, "Permit dropped without verdict");
            self.breaker.release();
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;

    fn breaker(cool_down: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            BreakerConfig {
                failure_threshold: 2,
                cool_down,
            },
        )
    }

    fn fail(breaker: &CircuitBreaker) {
        if let Some(permit) = breaker.try_acquire() {
            permit.failure();
        }
    }

    async fn opened(cool_down: Duration) -> CircuitBreaker {
        let breaker = breaker(cool_down);
        fail(&breaker);
        fail(&breaker);
        assert_eq!(breaker.state(), CircuitState::Open);
        breaker
    }

    #[tokio::test]
    async fn open_after_consecutive_failures() {
        let breaker = breaker(Duration::from_secs(60));

        fail(&breaker);
        assert_eq!(breaker.state(), CircuitState::Closed);

        fail(&breaker);
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.try_acquire().is_none());
    }

    #[tokio::test]
    async fn reset_failure_count_on_success() {
        let breaker = breaker(Duration::from_secs(60));

        fail(&breaker);
        if let Some(permit) = breaker.try_acquire() {
            permit.success();
        }
        fail(&breaker);

        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn ignore_released_permits() {
        let breaker = breaker(Duration::from_secs(60));

        for _ in 0..5 {
            if let Some(permit) = breaker.try_acquire() {
                permit.release();
            }
        }

        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn admit_a_single_trial_after_cool_down() {
        let breaker = opened(Duration::from_millis(10)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let trial = breaker.try_acquire();
        assert!(trial.is_some());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.try_acquire().is_none());

        if let Some(permit) = trial {
            permit.success();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.try_acquire().is_some());
    }

    #[tokio::test]
    async fn reopen_when_the_trial_fails() {
        let breaker = opened(Duration::from_millis(10)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        if let Some(permit) = breaker.try_acquire() {
            permit.failure();
        }

        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(breaker.try_acquire().is_none());
    }

    #[tokio::test]
    async fn admit_a_new_trial_when_one_is_dropped() {
        let breaker = opened(Duration::from_millis(10)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let abandoned = breaker.try_acquire();
        assert!(abandoned.is_some());
        drop(abandoned);

        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        assert!(breaker.try_acquire().is_some());
    }
}
