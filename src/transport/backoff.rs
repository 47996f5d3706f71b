//! Reconnect delay schedule.

use std::time::Duration;

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// Linear reconnect schedule: attempt `n` waits `n * base_delay`.
///
/// Attempts are numbered from 1. Once `attempt` exceeds `max_attempts` the
/// lifecycle gives up without waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_attempts: u32,
}

impl ReconnectPolicy {
    /// Creates a schedule.
    #[inline]
    #[must_use]
    pub const fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
        }
    }

    /// Delay unit.
    #[inline]
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Attempts allowed before giving up.
    #[inline]
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before `attempt`, or `None` once the cap is exceeded.
    #[must_use]
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        (attempt <= self.max_attempts).then(|| self.delay_for(attempt))
    }

    /// Delay before `attempt`, ignoring the cap.
    #[inline]
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

// ============================================================================
// Tests
// ============================================================================
