//! Retry policy with capped exponential backoff

use std::time::Duration;
use log::{trace, warn};

const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Retry policy for failed requests
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy
{   pub max_attempts: usize
  , pub backoff_multiplier: f64
  , pub initial_backoff: Duration
  , pub max_backoff: Duration
}

impl RetryPolicy
{   /// Create a new retry policy
    ///
    /// At least one attempt is always made. A multiplier that would not
    /// grow the delay (NaN or <= 1.0) falls back to 2.0.
    pub fn new(
      max_attempts: usize
    , backoff_multiplier: f64
    , initial_backoff_ms: u64
    , max_backoff_ms: u64
    ) -> Self
    {   let backoff_multiplier = if backoff_multiplier > 1.0
        {   backoff_multiplier
        } else
        {   warn!(
              "Backoff multiplier {} does not grow, using {}",
              backoff_multiplier, DEFAULT_MULTIPLIER
            );
            DEFAULT_MULTIPLIER
        };
        RetryPolicy
        {   max_attempts: max_attempts.max(1)
          , backoff_multiplier
          , initial_backoff: Duration::from_millis(
              initial_backoff_ms
            )
          , max_backoff: Duration::from_millis(max_backoff_ms)
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn backoff_for_attempt(
      &self
    , attempt: usize
    ) -> Duration
    {   let exponent = attempt.saturating_sub(1).min(63) as i32;
        let multiplier = self.backoff_multiplier.powi(exponent);
        let millis
          = self.initial_backoff.as_millis() as f64 * multiplier;
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        trace!("Backoff after attempt {}: {}ms", attempt, capped);
        Duration::from_millis(capped as u64)
    }

    /// Whether another attempt is allowed after `attempt`
    pub fn has_attempt_after(&self, attempt: usize) -> bool
    {   attempt < self.max_attempts
    }
}

impl Default for RetryPolicy
{   fn default() -> Self
    {   RetryPolicy::from(&crate::config::RetryConfig::default())
    }
}

impl From<&crate::config::RetryConfig> for RetryPolicy
{   fn from(config: &crate::config::RetryConfig) -> Self
    {   RetryPolicy::new(
          config.max_attempts,
          config.backoff_multiplier,
          config.initial_backoff_ms,
          config.max_backoff_ms
        )
    }
}

/// Per-call retry bookkeeping, dropped when the call completes
#[derive(Debug)]
pub struct RetryState<'a>
{   policy: &'a RetryPolicy
  , attempt: usize
}

impl<'a> RetryState<'a>
{   pub fn new(policy: &'a RetryPolicy) -> Self
    {   RetryState
        {   policy
          , attempt: 0
        }
    }

    /// Start the next attempt, `None` once the budget is spent
    pub fn next_attempt(&mut self) -> Option<usize>
    {   if self.attempt >= self.policy.max_attempts
        {   return None;
        }
        self.attempt += 1;
        Some(self.attempt)
    }

    pub fn attempt(&self) -> usize
    {   self.attempt
    }

    /// Delay before the following attempt, `None` when none remains
    pub fn delay_before_next(&self) -> Option<Duration>
    {   if self.policy.has_attempt_after(self.attempt)
        {   Some(self.policy.backoff_for_attempt(self.attempt))
        } else
        {   None
        }
    }
}
