//! Bounded resend policy

use std::time::Duration;

/// Finite budget of READY_FOR_DATA sends
///
/// The immediate send made by `start()` counts against the budget. Once the
/// budget is spent the next tick reports exhaustion instead of sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    max_attempts: u32,
    interval: Duration,
    sent: u32,
}

impl RetryBudget {
    /// Create a fresh budget
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            sent: 0,
        }
    }

    /// Spend one attempt, returning its 1-based number, or `None` when spent
    pub fn try_consume(&mut self) -> Option<u32> {
        if self.is_exhausted() {
            return None;
        }
        self.sent += 1;
        Some(self.sent)
    }

    /// No attempts left
    pub fn is_exhausted(&self) -> bool {
        self.sent >= self.max_attempts
    }

    /// Attempts made so far
    pub fn sent(&self) -> u32 {
        self.sent
    }

    /// Attempts still available
    pub fn remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.sent)
    }

    /// Delay between attempts
    pub fn interval(&self) -> Duration {
        self.interval
    }
}
