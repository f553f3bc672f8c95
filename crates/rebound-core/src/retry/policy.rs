use std::time::Duration;

/// Reason a policy was rejected by [`RetryPolicy::validate`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
    #[error("growth_factor must be a finite value >= 1.0 (got {0})")]
    GrowthFactor(f64),
    #[error("jitter_fraction must be within [0, 1] (got {0})")]
    JitterFraction(f64),
    #[error("max_wait ({max:?}) is shorter than initial_wait ({initial:?})")]
    WaitOrder { initial: Duration, max: Duration },
}

/// Exponential backoff policy with a ceiling and symmetric jitter.
///
/// Immutable for the duration of a run and cheap to copy, so one value can be
/// shared by any number of concurrent runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Wait before the second attempt.
    pub initial_wait: Duration,
    /// Upper bound on the wait, applied before jitter.
    pub max_wait: Duration,
    /// Multiplier applied to the wait after each failed attempt.
    pub growth_factor: f64,
    /// Fraction of the wait randomized symmetrically around zero.
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_wait: Duration::from_millis(10),
            max_wait: Duration::from_millis(10),
            growth_factor: 1.5,
            jitter_fraction: 0.1,
        }
    }
}

impl RetryPolicy {
    /// Short waits for local services.
    pub fn fast() -> Self {
        Self {
            max_attempts: 5,
            initial_wait: Duration::from_millis(10),
            max_wait: Duration::from_millis(100),
            growth_factor: 1.5,
            jitter_fraction: 0.1,
        }
    }

    /// Long waits for external APIs.
    pub fn slow() -> Self {
        Self {
            max_attempts: 3,
            initial_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(30),
            growth_factor: 3.0,
            jitter_fraction: 0.2,
        }
    }

    /// Same policy with no jitter; waits follow the pure exponential curve.
    pub fn without_jitter(self) -> Self {
        Self {
            jitter_fraction: 0.0,
            ..self
        }
    }

    /// Check the invariants the backoff curve assumes.
    ///
    /// The executor does not call this; an unchecked policy still runs with
    /// clamped waits.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.max_attempts == 0 {
            return Err(PolicyError::ZeroAttempts);
        }
        if !self.growth_factor.is_finite() || self.growth_factor < 1.0 {
            return Err(PolicyError::GrowthFactor(self.growth_factor));
        }
        if !self.jitter_fraction.is_finite() || !(0.0..=1.0).contains(&self.jitter_fraction) {
            return Err(PolicyError::JitterFraction(self.jitter_fraction));
        }
        if self.max_wait < self.initial_wait {
            return Err(PolicyError::WaitOrder {
                initial: self.initial_wait,
                max: self.max_wait,
            });
        }
        Ok(())
    }
}
