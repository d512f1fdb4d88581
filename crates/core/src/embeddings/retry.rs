use std::time::Duration;

/// Bounded exponential backoff for provider calls: `base_delay * 2^attempt`
/// capped at `max_delay`. Kept as an explicit value so retry behavior is
/// testable apart from any provider.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before re-attempting after the given zero-based failed attempt.
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let shift = attempt.min(31) as u32;
        let factor = 2u64.saturating_pow(shift);
        let delay = self.base_delay.saturating_mul(factor.min(u32::MAX as u64) as u32);
        delay.min(self.max_delay)
    }
}
