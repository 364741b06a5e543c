//! # Replay Retry Policy
//!
//! Capped exponential backoff for queued actions, computed from the
//! persisted `retry_count` so it survives restarts.
//!
//! ```text
//! retry_count │ 0    1    2    3    4    5    6     7     8
//! ────────────┼──────────────────────────────────────────────
//! delay       │ 0s   1s   2s   4s   8s   16s  32s   64s   (exhausted)
//!             │      └─ initial * 2^(n-1), capped at max ─┘
//! ```
//!
//! An action whose `retry_count` reached `max_retries` is never attempted
//! again; it stays in the queue and is reported as permanently failed.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

use crate::types::OfflineAction;

/// Default ceiling of failed attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 8;

/// Default delay after the first failure.
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Default upper bound for a single delay.
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Retry ceiling and backoff curve for replaying queued actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        RetryPolicy {
            max_retries,
            initial_backoff,
            max_backoff,
        }
    }

    /// Policy with no waiting between attempts.
    pub fn immediate(max_retries: u32) -> Self {
        RetryPolicy::new(max_retries, Duration::ZERO, Duration::ZERO)
    }

    /// Delay to wait after `retry_count` failures before the next attempt.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        if retry_count == 0 {
            return Duration::ZERO;
        }
        let exponent = (retry_count - 1).min(31);
        let factor = 1u32 << exponent;
        self.initial_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }

    /// True once the action used up its attempts.
    pub fn is_exhausted(&self, action: &OfflineAction) -> bool {
        action.retry_count >= self.max_retries
    }

    /// Earliest time the action may be attempted again.
    pub fn next_attempt_at(&self, action: &OfflineAction) -> DateTime<Utc> {
        match action.last_attempt_at {
            None => action.created_at,
            Some(last) => {
                let delay = ChronoDuration::from_std(self.delay_for(action.retry_count))
                    .unwrap_or_else(|_| ChronoDuration::seconds(self.max_backoff.as_secs() as i64));
                last + delay
            }
        }
    }

    /// True when the action is not exhausted and its backoff has elapsed.
    pub fn is_due(&self, action: &OfflineAction, now: DateTime<Utc>) -> bool {
        !self.is_exhausted(action) && self.next_attempt_at(action) <= now
    }
}
