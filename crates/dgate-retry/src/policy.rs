//! Retry budget and backoff schedule

use rand::Rng;
use std::time::Duration;

/// Invalid retry policy
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    /// At least one attempt is required
    #[error("max_attempts must be at least 1")]
    NoAttempts,

    /// Growth factor would shrink delays
    #[error("backoff factor must be >= 1.0, got {0}")]
    ShrinkingFactor(f64),

    /// Jitter must be a non-negative finite fraction
    #[error("jitter must be finite and >= 0.0, got {0}")]
    InvalidJitter(f64),

    /// Jitter large enough to let a later delay undercut an earlier one
    #[error("backoff factor {factor} must be >= 1 + jitter ({jitter}) to keep delays non-decreasing")]
    JitterOutgrowsFactor {
        /// Configured factor
        factor: f64,
        /// Configured jitter
        jitter: f64,
    },

    /// Cap below the first delay
    #[error("max delay {max:?} is shorter than initial delay {initial:?}")]
    CapBelowInitial {
        /// Configured cap
        max: Duration,
        /// Configured initial delay
        initial: Duration,
    },
}

/// Attempt budget and exponential backoff
///
/// The delay before retry `n` (1-based) is
/// `initial_delay * factor^(n-1) * (1 + jitter * r)` with `r` drawn from
/// `[0, 1)`, then capped at `max_delay`. A validated policy never yields a
/// delay shorter than the one before it.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    factor: f64,
    jitter: f64,
    max_delay: Option<Duration>,
}

impl RetryPolicy {
    /// Create policy with `max_attempts` and default backoff
    #[inline]
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Policy that tries exactly once
    #[inline]
    #[must_use]
    pub fn no_retry() -> Self {
        Self::new(1)
    }

    /// With initial delay
    #[inline]
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// With growth factor
    #[inline]
    #[must_use]
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    /// With jitter fraction
    #[inline]
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// With delay cap
    #[inline]
    #[must_use]
    pub fn with_max_delay(mut self, max: Duration) -> Self {
        self.max_delay = Some(max);
        self
    }

    /// Total attempts allowed, including the first
    #[inline]
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Initial delay
    #[inline]
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Check the policy is usable
    ///
    /// # Errors
    /// Returns the first [`PolicyError`] found.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.max_attempts == 0 {
            return Err(PolicyError::NoAttempts);
        }
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(PolicyError::ShrinkingFactor(self.factor));
        }
        if !self.jitter.is_finite() || self.jitter < 0.0 {
            return Err(PolicyError::InvalidJitter(self.jitter));
        }
        if self.factor < 1.0 + self.jitter {
            return Err(PolicyError::JitterOutgrowsFactor {
                factor: self.factor,
                jitter: self.jitter,
            });
        }
        if let Some(max) = self.max_delay {
            if max < self.initial_delay {
                return Err(PolicyError::CapBelowInitial {
                    max,
                    initial: self.initial_delay,
                });
            }
        }
        Ok(())
    }

    /// Delay to wait after failed attempt `attempt` (1-based)
    #[must_use]
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let unit = if self.jitter > 0.0 {
            rand::rng().random::<f64>()
        } else {
            0.0
        };
        self.delay_with(attempt, unit)
    }

    /// Delay for `attempt` with jitter sample `unit` in `[0, 1)`
    #[must_use]
    pub fn delay_with(&self, attempt: u32, unit: f64) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64()
            * self.factor.powi(exponent)
            * (1.0 + self.jitter * unit.clamp(0.0, 1.0));

        let uncapped = Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX);
        match self.max_delay {
            Some(max) => uncapped.min(max),
            None => uncapped,
        }
    }
}

impl Default for RetryPolicy {
    /// 4 attempts, 10ms initial delay, factor 5, 10% jitter
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(10),
            factor: 5.0,
            jitter: 0.1,
            max_delay: None,
        }
    }
}
