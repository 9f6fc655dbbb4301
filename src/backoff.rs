//! Jittered exponential backoff.

use rand::Rng;
use std::time::Duration;

/// Fraction of the delay that jitter may add or remove.
const JITTER: f64 = 0.3;

/// Computes the wait before the retry following `attempt` (0-indexed).
///
/// The base delay is `min * 2^attempt`, capped at `max`. A random factor in
/// `[0.7, 1.3]` is applied and the result is clamped back into `[min, max]`, so
/// callers can rely on the bounds regardless of jitter. If `max < min`, `max` is
/// treated as `min`.
///
/// # Examples
///
/// ```
/// use rampart::backoff::exponential;
/// use std::time::Duration;
///
/// let min = Duration::from_millis(10);
/// let max = Duration::from_millis(100);
/// for attempt in 0..10 {
///     let delay = exponential(attempt, min, max);
///     assert!(delay >= min && delay <= max);
/// }
///
/// assert_eq!(exponential(3, Duration::ZERO, Duration::ZERO), Duration::ZERO);
/// ```
pub fn exponential(attempt: u32, min: Duration, max: Duration) -> Duration {
    let max = max.max(min);
    if max.is_zero() {
        return Duration::ZERO;
    }

    let multiplier = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    let base = min.checked_mul(multiplier).unwrap_or(max).min(max);

    let factor = rand::thread_rng().gen_range((1.0 - JITTER)..=(1.0 + JITTER));
    Duration::try_from_secs_f64(base.as_secs_f64() * factor)
        .unwrap_or(max)
        .clamp(min, max)
}
