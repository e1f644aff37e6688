//! Backoff policy for the pipeline's unbounded retry loops.
//!
//! The pipeline never gives up on a transient failure: a fetch error is retried
//! until the queue answers, and a failed upsert is retried until the store
//! accepts the order or the service shuts down. [`RetryPolicy`] only decides
//! how long to wait between attempts.
//!
//! # Example
//!
//! ```rust
//! use orderflow_runtime::retry::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::builder()
//!     .initial_delay(Duration::from_millis(100))
//!     .max_delay(Duration::from_secs(5))
//!     .multiplier(2.0)
//!     .build();
//!
//! assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
//! assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
//! ```

use rand::Rng;
use std::time::Duration;

/// Delay schedule between retries.
///
/// # Default Values
///
/// - `initial_delay`: 500ms
/// - `max_delay`: 500ms
/// - `multiplier`: 1.0 (fixed delay)
/// - `jitter`: off
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries (cap for exponential backoff)
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Add up to 50% random extra delay to spread out retries
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_millis(500))
    }
}

impl RetryPolicy {
    /// Same delay before every retry.
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter: false,
        }
    }

    /// Create a new policy builder.
    #[must_use]
    pub const fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder {
            initial_delay: None,
            max_delay: None,
            multiplier: None,
            jitter: false,
        }
    }

    /// Calculate delay for a given attempt number (0-based).
    ///
    /// Uses exponential backoff: `initial_delay * multiplier ^ attempt`,
    /// capped at `max_delay`. With jitter enabled the result gains a random
    /// extra of up to half the computed delay.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.backoff(attempt);

        if !self.jitter {
            return base;
        }

        let half_ms = u64::try_from(base.as_millis() / 2).unwrap_or(u64::MAX);
        if half_ms == 0 {
            return base;
        }
        let extra = Duration::from_millis(rand::thread_rng().gen_range(0..=half_ms));
        base + extra
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 || self.multiplier <= 1.0 {
            return self.initial_delay;
        }

        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);

        if !delay_ms.is_finite() || delay_ms >= self.max_delay.as_millis() as f64 {
            return self.max_delay;
        }

        Duration::from_millis(delay_ms as u64)
    }
}

/// Builder for [`RetryPolicy`].
///
/// `max_delay` defaults to `initial_delay` when not set, which makes the
/// built policy a fixed delay unless both a multiplier and a cap are given.
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder {
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<f64>,
    jitter: bool,
}

impl RetryPolicyBuilder {
    /// Set delay before the first retry.
    #[must_use]
    pub const fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    /// Set maximum delay (cap for exponential backoff).
    #[must_use]
    pub const fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Set multiplier for exponential backoff.
    #[must_use]
    pub const fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Enable or disable jitter.
    #[must_use]
    pub const fn jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Build the [`RetryPolicy`].
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        let initial_delay = self.initial_delay.unwrap_or(Duration::from_millis(500));
        RetryPolicy {
            initial_delay,
            max_delay: self.max_delay.unwrap_or(initial_delay),
            multiplier: self.multiplier.unwrap_or(1.0),
            jitter: self.jitter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_policy_never_grows() {
        let policy = RetryPolicy::fixed(Duration::from_millis(300));
        for attempt in [0, 1, 5, 50, u32::MAX] {
            assert_eq!(policy.delay_for_attempt(attempt), Duration::from_millis(300));
        }
    }

    #[test]
    fn exponential_delay_calculation() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(100))
            .multiplier(2.0)
            .max_delay(Duration::from_secs(10))
            .build();

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(800));
    }

    #[test]
    fn max_delay_cap() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(1000))
            .multiplier(10.0)
            .max_delay(Duration::from_secs(2))
            .build();

        assert_eq!(policy.delay_for_attempt(5), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(u32::MAX), Duration::from_secs(2));
    }

    #[test]
    fn builder_defaults_to_fixed_delay() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(250))
            .multiplier(3.0)
            .build();

        assert_eq!(policy.max_delay, Duration::from_millis(250));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(250));
    }

    #[test]
    fn jitter_applies_to_fixed_delay() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(300))
            .jitter(true)
            .build();

        for _ in 0..100 {
            let delay = policy.delay_for_attempt(3);
            assert!(delay >= Duration::from_millis(300));
            assert!(delay <= Duration::from_millis(450));
        }
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(200))
            .max_delay(Duration::from_millis(1000))
            .jitter(true)
            .build();

        for _ in 0..100 {
            let delay = policy.delay_for_attempt(0);
            assert!(delay >= Duration::from_millis(200));
            assert!(delay <= Duration::from_millis(300));
        }
    }
}
