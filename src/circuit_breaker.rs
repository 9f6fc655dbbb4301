//! Circuit breaker guarding a failing dependency.
//!
//! # States
//! - Closed: normal operation, every call is admitted
//! - Open: dependency assumed down, calls are rejected without running
//! - Half-Open: a limited number of probe calls test for recovery
//!
//! # State Transitions
//! ```text
//! Closed    → Open:      ready_to_trip(counts) after a failure
//! Open      → Half-Open: after `timeout`
//! Half-Open → Closed:    a probe succeeds
//! Half-Open → Open:      a probe fails
//! ```
//!
//! Every transition clears the [`Counts`] and starts a new generation. A call is
//! tagged with the generation current at admission; if the breaker moved to a new
//! generation before the call finished, its outcome is discarded. This keeps a
//! slow call admitted while Closed from closing or re-opening a breaker that has
//! since tripped and started probing.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Default cooldown before an open breaker starts probing.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of consecutive failures that trips a closed breaker.
pub const DEFAULT_CONSECUTIVE_FAILURES: u32 = 5;

/// The state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Calls are admitted.
    Closed,
    /// A limited number of probe calls are admitted.
    HalfOpen,
    /// Calls are rejected.
    Open,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Closed => f.write_str("closed"),
            State::HalfOpen => f.write_str("half-open"),
            State::Open => f.write_str("open"),
        }
    }
}

/// Request and outcome counters for the current generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Calls admitted.
    pub requests: u32,
    /// Calls that succeeded.
    pub total_successes: u32,
    /// Calls that failed.
    pub total_failures: u32,
    /// Successes since the last failure.
    pub consecutive_successes: u32,
    /// Failures since the last success.
    pub consecutive_failures: u32,
}

impl Counts {
    fn on_request(&mut self) {
        self.requests = self.requests.saturating_add(1);
    }

    fn on_success(&mut self) {
        self.total_successes = self.total_successes.saturating_add(1);
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures = self.total_failures.saturating_add(1);
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.consecutive_successes = 0;
    }

    fn clear(&mut self) {
        *self = Counts::default();
    }
}

/// The error returned when the breaker refuses to admit a call.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CircuitOpenError {
    /// The breaker is open.
    #[error("circuit breaker '{name}' is open")]
    Open {
        /// The breaker name
        name: String,
    },
    /// The breaker is half-open and every probe slot is taken.
    #[error("circuit breaker '{name}' is half-open and has too many requests in flight")]
    TooManyRequests {
        /// The breaker name
        name: String,
    },
}

/// Predicate over [`Counts`] deciding whether a closed breaker trips.
pub type ReadyToTrip = Arc<dyn Fn(&Counts) -> bool + Send + Sync>;

/// Callback invoked with the breaker name and the `from`/`to` states of a transition.
pub type StateChangeHook = Arc<dyn Fn(&str, State, State) + Send + Sync>;

/// Settings for a [`CircuitBreaker`].
///
/// # Examples
///
/// ```
/// use rampart::circuit_breaker::CircuitBreakerConfig;
/// use std::time::Duration;
///
/// let config = CircuitBreakerConfig::new()
///     .with_name("payments")
///     .with_max_requests(2)
///     .with_timeout(Duration::from_secs(15))
///     .with_ready_to_trip(|counts| {
///         counts.requests >= 10 && counts.total_failures * 2 >= counts.requests
///     });
/// assert_eq!(config.max_requests(), 2);
/// ```
#[derive(Clone)]
pub struct CircuitBreakerConfig {
    name: String,
    max_requests: u32,
    interval: Duration,
    timeout: Duration,
    ready_to_trip: ReadyToTrip,
    on_state_change: Option<StateChangeHook>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            max_requests: 1,
            interval: Duration::ZERO,
            timeout: DEFAULT_TIMEOUT,
            ready_to_trip: Arc::new(|counts: &Counts| {
                counts.consecutive_failures >= DEFAULT_CONSECUTIVE_FAILURES
            }),
            on_state_change: None,
        }
    }
}

impl fmt::Debug for CircuitBreakerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerConfig")
            .field("name", &self.name)
            .field("max_requests", &self.max_requests)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .field("on_state_change", &self.on_state_change.is_some())
            .finish_non_exhaustive()
    }
}

impl CircuitBreakerConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name used in errors and log events
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set how many probes Half-Open admits at once. Zero is treated as one.
    pub fn with_max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests.max(1);
        self
    }

    /// Set the rolling window after which Closed clears its counts. Zero disables it.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set how long Open waits before probing. Zero restores the 60s default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = if timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            timeout
        };
        self
    }

    /// Set the predicate that trips a closed breaker
    pub fn with_ready_to_trip<F>(mut self, ready_to_trip: F) -> Self
    where
        F: Fn(&Counts) -> bool + Send + Sync + 'static,
    {
        self.ready_to_trip = Arc::new(ready_to_trip);
        self
    }

    /// Set a callback run after every state transition, outside the breaker lock
    pub fn with_on_state_change<F>(mut self, hook: F) -> Self
    where
        F: Fn(&str, State, State) + Send + Sync + 'static,
    {
        self.on_state_change = Some(Arc::new(hook));
        self
    }

    /// The name reported in rejections and log events.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Probes admitted at once while Half-Open.
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Rolling window of the Closed state; zero when disabled.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Cooldown spent Open before probing.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// State and counts observed together under the breaker lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerSnapshot {
    /// The state after applying any elapsed expiry.
    pub state: State,
    /// Counts of the current generation.
    pub counts: Counts,
    /// Bumped on every transition and window reset.
    pub generation: u64,
    /// Remaining cooldown, if currently open.
    pub open_remaining: Option<Duration>,
}

#[derive(Debug)]
struct Inner {
    state: State,
    generation: u64,
    counts: Counts,
    /// Closed: end of the rolling window. Open: end of the cooldown. Half-Open: unused.
    expiry: Option<Instant>,
}

/// Transitions made while holding the lock, reported once it is released.
type Transitions = Vec<(State, State)>;

/// A thread-safe circuit breaker.
///
/// All reads and writes of the state, counts and expiry happen under a single
/// mutex, so a transition is always computed from the counts it resets.
///
/// # Examples
///
/// ```
/// use rampart::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitOpenError, State};
///
/// # async fn example() {
/// let breaker = CircuitBreaker::new(CircuitBreakerConfig::new().with_name("inventory"));
///
/// let result: Result<u32, CircuitOpenError> = breaker.call(|| async { Ok(7) }).await;
/// assert_eq!(result, Ok(7));
/// assert_eq!(breaker.state(), State::Closed);
/// # }
/// ```
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("inner", &*self.lock())
            .finish()
    }
}

impl CircuitBreaker {
    /// Creates a Closed breaker with zero counts.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        let now = Instant::now();
        let mut inner = Inner {
            state: State::Closed,
            generation: 0,
            counts: Counts::default(),
            expiry: None,
        };
        inner.new_generation(now, &config);
        Self {
            config,
            inner: Mutex::new(inner),
        }
    }

    /// The configured breaker name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// The settings this breaker was created with.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Returns the current state, applying any cooldown or window expiry first.
    pub fn state(&self) -> State {
        self.snapshot().state
    }

    /// Returns the counts of the current generation.
    pub fn counts(&self) -> Counts {
        self.snapshot().counts
    }

    /// Returns state and counts as they were at a single instant.
    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let now = Instant::now();
        let mut transitions = Transitions::new();
        let snapshot = {
            let mut inner = self.lock();
            inner.refresh(now, &self.config, &mut transitions);
            CircuitBreakerSnapshot {
                state: inner.state,
                counts: inner.counts,
                generation: inner.generation,
                open_remaining: match inner.state {
                    State::Open => inner.expiry.map(|until| until.saturating_duration_since(now)),
                    _ => None,
                },
            }
        };
        self.notify(&transitions);
        snapshot
    }

    /// Forces the breaker Closed with zero counts, whatever its current state.
    ///
    /// Any cooldown is discarded and outcomes of calls still in flight are ignored.
    pub fn reset(&self) {
        let now = Instant::now();
        let mut transitions = Transitions::new();
        {
            let mut inner = self.lock();
            let from = inner.state;
            inner.state = State::Closed;
            inner.new_generation(now, &self.config);
            if from != State::Closed {
                transitions.push((from, State::Closed));
            }
        }
        self.notify(&transitions);
    }

    /// Asks for admission of one unit of work.
    ///
    /// The returned [`Permit`] must be settled with [`Permit::success`] or
    /// [`Permit::failure`]; dropping it unsettled records a failure.
    ///
    /// # Errors
    ///
    /// Returns [`CircuitOpenError`] if the breaker is open, or half-open with every
    /// probe slot taken.
    pub fn try_acquire(&self) -> Result<Permit<'_>, CircuitOpenError> {
        let now = Instant::now();
        let mut transitions = Transitions::new();
        let admitted = {
            let mut inner = self.lock();
            inner.refresh(now, &self.config, &mut transitions);
            match inner.state {
                State::Open => Err(CircuitOpenError::Open {
                    name: self.config.name.clone(),
                }),
                State::HalfOpen if inner.counts.requests >= self.config.max_requests => {
                    Err(CircuitOpenError::TooManyRequests {
                        name: self.config.name.clone(),
                    })
                }
                _ => {
                    inner.counts.on_request();
                    Ok(inner.generation)
                }
            }
        };
        self.notify(&transitions);

        admitted.map(|generation| Permit {
            breaker: self,
            generation,
            settled: false,
        })
    }

    /// Runs `work` if the breaker admits it, recording any `Err` as a failure.
    ///
    /// The work is never invoked when admission is refused.
    ///
    /// # Errors
    ///
    /// Returns the work's error, or the rejection converted into `E`.
    pub async fn call<T, E, F, Fut>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitOpenError>,
    {
        self.call_with(work, Result::is_ok).await
    }

    /// Like [`call`](Self::call), with a custom predicate deciding which results
    /// count as successes.
    pub async fn call_with<T, E, F, Fut, P>(&self, work: F, is_success: P) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitOpenError>,
        P: FnOnce(&Result<T, E>) -> bool,
    {
        let permit = self.try_acquire()?;
        let result = work().await;
        if is_success(&result) {
            permit.success();
        } else {
            permit.failure();
        }
        result
    }

    fn after_request(&self, generation: u64, success: bool) {
        let now = Instant::now();
        let mut transitions = Transitions::new();
        {
            let mut inner = self.lock();
            inner.refresh(now, &self.config, &mut transitions);
            if inner.generation != generation {
                tracing::trace!(
                    breaker = %self.config.name,
                    admitted_generation = generation,
                    current_generation = inner.generation,
                    "Discarding outcome from a previous generation"
                );
            } else if success {
                inner.on_success(now, &self.config, &mut transitions);
            } else {
                inner.on_failure(now, &self.config, &mut transitions);
            }
        }
        self.notify(&transitions);
    }

    fn notify(&self, transitions: &[(State, State)]) {
        for &(from, to) in transitions {
            if to == State::Open {
                tracing::warn!(breaker = %self.config.name, %from, %to, "Circuit breaker opened");
            } else {
                tracing::info!(
                    breaker = %self.config.name,
                    %from,
                    %to,
                    "Circuit breaker state changed"
                );
            }
            if let Some(hook) = &self.config.on_state_change {
                hook(&self.config.name, from, to);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Inner {
    /// Applies expiries that elapsed since the last access.
    fn refresh(
        &mut self,
        now: Instant,
        config: &CircuitBreakerConfig,
        transitions: &mut Transitions,
    ) {
        match self.state {
            State::Closed => {
                if self.expiry.is_some_and(|expiry| expiry <= now) {
                    self.new_generation(now, config);
                }
            }
            State::Open => {
                if self.expiry.is_some_and(|expiry| expiry <= now) {
                    self.set_state(State::HalfOpen, now, config, transitions);
                }
            }
            State::HalfOpen => {}
        }
    }

    fn on_success(
        &mut self,
        now: Instant,
        config: &CircuitBreakerConfig,
        transitions: &mut Transitions,
    ) {
        self.counts.on_success();
        if self.state == State::HalfOpen {
            self.set_state(State::Closed, now, config, transitions);
        }
    }

    fn on_failure(
        &mut self,
        now: Instant,
        config: &CircuitBreakerConfig,
        transitions: &mut Transitions,
    ) {
        self.counts.on_failure();
        match self.state {
            State::Closed => {
                if (config.ready_to_trip)(&self.counts) {
                    self.set_state(State::Open, now, config, transitions);
                }
            }
            State::HalfOpen => self.set_state(State::Open, now, config, transitions),
            State::Open => {}
        }
    }

    fn set_state(
        &mut self,
        to: State,
        now: Instant,
        config: &CircuitBreakerConfig,
        transitions: &mut Transitions,
    ) {
        if self.state == to {
            return;
        }
        let from = self.state;
        self.state = to;
        self.new_generation(now, config);
        transitions.push((from, to));
    }

    fn new_generation(&mut self, now: Instant, config: &CircuitBreakerConfig) {
        self.generation = self.generation.wrapping_add(1);
        self.counts.clear();
        self.expiry = match self.state {
            State::Closed if config.interval.is_zero() => None,
            State::Closed => Some(now + config.interval),
            State::Open => Some(now + config.timeout),
            State::HalfOpen => None,
        };
    }
}

/// Admission granted by [`CircuitBreaker::try_acquire`].
///
/// Dropping a permit without settling it records a failure, so a call abandoned
/// by cancellation or a panic never holds a Half-Open probe slot forever.
#[must_use = "a dropped permit is recorded as a failure"]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    settled: bool,
}

impl Permit<'_> {
    /// Records a successful outcome.
    pub fn success(mut self) {
        self.settled = true;
        self.breaker.after_request(self.generation, true);
    }

    /// Records a failed outcome.
    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.after_request(self.generation, false);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.after_request(self.generation, false);
        }
    }
}

impl fmt::Debug for Permit<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit")
            .field("breaker", &self.breaker.name())
            .field("generation", &self.generation)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn breaker_with_timeout(timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(
            CircuitBreakerConfig::new()
                .with_name("test")
                .with_timeout(timeout)
                .with_ready_to_trip(|c| c.consecutive_failures >= 3),
        )
    }

    fn fail_times(cb: &CircuitBreaker, n: usize) {
        for _ in 0..n {
            cb.try_acquire().unwrap().failure();
        }
    }

    #[test]
    fn test_circuit_breaker_config_defaults() {
        let config = CircuitBreakerConfig::default();
        assert_eq!(config.max_requests(), 1);
        assert_eq!(config.interval(), Duration::ZERO);
        assert_eq!(config.timeout(), Duration::from_secs(60));

        let trips = |failures: u32| {
            (config.ready_to_trip)(&Counts {
                consecutive_failures: failures,
                ..Counts::default()
            })
        };
        assert!(!trips(4));
        assert!(trips(5));
    }

    #[test]
    fn test_circuit_breaker_config_normalizes_zero_values() {
        let config = CircuitBreakerConfig::new()
            .with_max_requests(0)
            .with_timeout(Duration::ZERO);
        assert_eq!(config.max_requests(), 1);
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_initial_state() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::default());
        assert_eq!(cb.state(), State::Closed);
        assert_eq!(cb.counts(), Counts::default());
        assert!(cb.snapshot().open_remaining.is_none());
    }

    #[test]
    fn test_counts_track_outcomes() {
        let cb = breaker_with_timeout(Duration::from_secs(60));

        cb.try_acquire().unwrap().success();
        cb.try_acquire().unwrap().success();
        cb.try_acquire().unwrap().failure();

        assert_eq!(
            cb.counts(),
            Counts {
                requests: 3,
                total_successes: 2,
                total_failures: 1,
                consecutive_successes: 0,
                consecutive_failures: 1,
            }
        );
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let cb = breaker_with_timeout(Duration::from_secs(60));
        fail_times(&cb, 2);
        cb.try_acquire().unwrap().success();
        fail_times(&cb, 2);

        assert_eq!(cb.state(), State::Closed);
        assert_eq!(cb.counts().consecutive_failures, 2);
    }

    #[test]
    fn test_opens_at_threshold_and_clears_counts() {
        let cb = breaker_with_timeout(Duration::from_secs(60));
        fail_times(&cb, 3);

        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, State::Open);
        assert_eq!(snapshot.counts, Counts::default());
        assert!(snapshot.open_remaining.is_some_and(|d| d > Duration::ZERO));

        assert_eq!(
            cb.try_acquire().unwrap_err(),
            CircuitOpenError::Open {
                name: "test".to_string()
            }
        );
    }

    #[test]
    fn test_half_open_after_timeout_then_closes_on_success() {
        let cb = breaker_with_timeout(Duration::from_millis(50));
        fail_times(&cb, 3);
        assert_eq!(cb.state(), State::Open);

        thread::sleep(Duration::from_millis(70));
        assert_eq!(cb.state(), State::HalfOpen);

        let probe = cb.try_acquire().unwrap();
        assert_eq!(cb.counts().requests, 1);
        probe.success();

        assert_eq!(cb.state(), State::Closed);
        assert_eq!(cb.counts(), Counts::default());
    }

    #[test]
    fn test_half_open_failure_reopens_with_fresh_expiry() {
        let cb = breaker_with_timeout(Duration::from_millis(50));
        fail_times(&cb, 3);
        thread::sleep(Duration::from_millis(70));

        cb.try_acquire().unwrap().failure();

        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, State::Open);
        let remaining = snapshot.open_remaining.unwrap();
        assert!(remaining > Duration::from_millis(30), "remaining {:?}", remaining);
        assert!(cb.try_acquire().is_err());
    }

    #[test]
    fn test_half_open_limits_probes() {
        let cb = CircuitBreaker::new(
            CircuitBreakerConfig::new()
                .with_name("probes")
                .with_max_requests(2)
                .with_timeout(Duration::from_millis(30))
                .with_ready_to_trip(|c| c.consecutive_failures >= 1),
        );
        fail_times(&cb, 1);
        thread::sleep(Duration::from_millis(50));

        let first = cb.try_acquire().unwrap();
        let second = cb.try_acquire().unwrap();
        assert_eq!(
            cb.try_acquire().unwrap_err(),
            CircuitOpenError::TooManyRequests {
                name: "probes".to_string()
            }
        );

        first.success();
        assert_eq!(cb.state(), State::Closed);
        // The second probe belongs to the half-open generation and is ignored.
        second.failure();
        assert_eq!(cb.state(), State::Closed);
        assert_eq!(cb.counts(), Counts::default());
    }

    #[test]
    fn test_dropped_permit_counts_as_failure() {
        let cb = breaker_with_timeout(Duration::from_millis(30));
        fail_times(&cb, 3);
        thread::sleep(Duration::from_millis(50));

        drop(cb.try_acquire().unwrap());
        assert_eq!(cb.state(), State::Open);
    }

    #[test]
    fn test_stale_outcome_is_discarded() {
        let cb = breaker_with_timeout(Duration::from_secs(60));
        let slow = cb.try_acquire().unwrap();
        fail_times(&cb, 3);
        assert_eq!(cb.state(), State::Open);

        // Admitted while closed; must not affect the open breaker.
        slow.success();
        assert_eq!(cb.state(), State::Open);
    }

    #[test]
    fn test_interval_clears_closed_counts() {
        let cb = CircuitBreaker::new(
            CircuitBreakerConfig::new()
                .with_interval(Duration::from_millis(40))
                .with_ready_to_trip(|c| c.total_failures >= 3),
        );
        fail_times(&cb, 2);
        assert_eq!(cb.counts().total_failures, 2);

        thread::sleep(Duration::from_millis(60));
        assert_eq!(cb.counts(), Counts::default());

        fail_times(&cb, 2);
        assert_eq!(cb.state(), State::Closed);
    }

    #[test]
    fn test_reset_forces_closed() {
        let cb = breaker_with_timeout(Duration::from_secs(60));
        fail_times(&cb, 3);
        assert_eq!(cb.state(), State::Open);

        cb.reset();

        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, State::Closed);
        assert_eq!(snapshot.counts, Counts::default());
        assert!(snapshot.open_remaining.is_none());
        assert!(cb.try_acquire().is_ok());
    }

    #[test]
    fn test_state_change_hook_sees_every_transition() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let cb = CircuitBreaker::new(
            CircuitBreakerConfig::new()
                .with_name("hooked")
                .with_timeout(Duration::from_millis(30))
                .with_ready_to_trip(|c| c.consecutive_failures >= 1)
                .with_on_state_change(move |name, from, to| {
                    assert_eq!(name, "hooked");
                    seen_clone.lock().unwrap().push((from, to));
                }),
        );

        fail_times(&cb, 1);
        thread::sleep(Duration::from_millis(50));
        cb.try_acquire().unwrap().success();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                (State::Closed, State::Open),
                (State::Open, State::HalfOpen),
                (State::HalfOpen, State::Closed),
            ]
        );
    }

    #[tokio::test]
    async fn test_call_skips_work_when_open() {
        let cb = breaker_with_timeout(Duration::from_secs(60));
        let invocations = AtomicUsize::new(0);

        for _ in 0..3 {
            let result: Result<(), CircuitOpenError> = cb
                .call(|| async {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    Err(CircuitOpenError::Open {
                        name: "work failed".to_string(),
                    })
                })
                .await;
            assert!(result.is_err());
        }
        assert_eq!(cb.state(), State::Open);
        assert_eq!(invocations.load(Ordering::SeqCst), 3);

        let result: Result<(), CircuitOpenError> = cb
            .call(|| async {
                invocations.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(CircuitOpenError::Open { .. })));
        assert_eq!(invocations.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_call_with_custom_success_predicate() {
        let cb = breaker_with_timeout(Duration::from_secs(60));

        for _ in 0..5 {
            let result: Result<u16, CircuitOpenError> = cb
                .call_with(|| async { Ok(404) }, |r| matches!(r, Ok(s) if *s < 400))
                .await;
            assert_eq!(result, Ok(404));
        }
        assert_eq!(cb.state(), State::Open);
    }
}
