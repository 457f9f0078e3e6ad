use std::time::Duration;

use backoff::ExponentialBackoff;
use backoff::backoff::Backoff as _;

use super::config::ReconnectConfig;
use super::transport::NORMAL_CLOSURE;

/// Decides whether and when to reconnect after a socket closes.
///
/// Retries follow the configured exponential schedule and stop once `attempt`
/// reaches `max_attempts`. A successful open calls [`ReconnectPolicy::reset`], which
/// restores the full retry budget.
#[derive(Debug)]
pub struct ReconnectPolicy {
    max_attempts: Option<u32>,
    attempt: u32,
    backoff: ExponentialBackoff,
}

impl ReconnectPolicy {
    #[must_use]
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            attempt: 0,
            backoff: config.into(),
        }
    }

    /// Retries scheduled since the last successful open.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Called on open.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.backoff.reset();
    }

    /// Delay before the next reconnect after a close with `code`, or `None` when no
    /// reconnect should happen.
    pub fn next_delay(&mut self, code: u16) -> Option<Duration> {
        if code == NORMAL_CLOSURE {
            return None;
        }

        if let Some(max) = self.max_attempts
            && self.attempt >= max
        {
            return None;
        }

        let delay = self.backoff.next_backoff()?;
        self.attempt = self.attempt.saturating_add(1);

        // Whole milliseconds only
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        Some(Duration::from_millis(millis))
    }
}
