//! Backoff wait computation: exponential growth, ceiling clamp, symmetric jitter.

use super::policy::RetryPolicy;
use rand::Rng;
use std::time::Duration;

/// Deterministic part of the backoff curve: `min(initial * factor^attempt, max)`.
///
/// `attempt` is 0-based and counts failures so far minus one, so 0 is the wait
/// before the second invocation. Saturates to `max_wait` instead of
/// overflowing for large attempt indices.
pub fn exponential_wait(attempt: u32, policy: &RetryPolicy) -> Duration {
    if policy.initial_wait.is_zero() {
        return Duration::ZERO;
    }
    let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
    let raw = policy.initial_wait.as_nanos() as f64 * policy.growth_factor.powi(exp);
    if !raw.is_finite() || raw >= policy.max_wait.as_nanos() as f64 {
        return policy.max_wait;
    }
    Duration::from_nanos(raw as u64)
}

/// Wait before the next attempt, with jitter drawn from `rng`.
///
/// The jitter is `u * jitter_fraction * capped` for one uniform `u` in
/// `[-0.5, 0.5)`, added after clamping so it never scales past the ceiling's
/// own magnitude. Never negative. With `jitter_fraction == 0` nothing is drawn
/// and the result equals [`exponential_wait`].
pub fn compute_wait<R: Rng + ?Sized>(attempt: u32, policy: &RetryPolicy, rng: &mut R) -> Duration {
    let capped = exponential_wait(attempt, policy);
    if policy.jitter_fraction <= 0.0 || capped.is_zero() {
        return capped;
    }
    let u: f64 = rng.gen::<f64>() - 0.5;
    let capped_nanos = capped.as_nanos() as f64;
    let jittered = capped_nanos + u * policy.jitter_fraction * capped_nanos;
    if jittered <= 0.0 || jittered.is_nan() {
        return Duration::ZERO;
    }
    Duration::from_nanos(jittered as u64)
}
