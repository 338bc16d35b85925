use std::time::Duration;

/// Bounded linear backoff used by the push-channel reconnect loop.
///
/// Attempt `n` (1-based) waits `n * base_delay_ms`; attempts beyond
/// `max_attempts` are not allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    base_delay_ms: u64,
    max_attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base_delay_ms: u64, max_attempts: u32) -> Self {
        Self {
            base_delay_ms,
            max_attempts,
        }
    }

    pub fn base_delay_ms(&self) -> u64 {
        self.base_delay_ms
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn allows_attempt(&self, attempt: u32) -> bool {
        attempt >= 1 && attempt <= self.max_attempts
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.base_delay_ms.saturating_mul(u64::from(attempt)))
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(3_000, 5)
    }
}
