use std::time::Duration;

/// Default interval between redial attempts
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(1);

/// Controls the pacing of the reconnection supervisor
///
/// The supervisor asks for a delay before every attempt. Attempts are counted
/// from 0 within one disconnect episode; the count starts over after a
/// successful redial.
pub trait ReconnectionStrategy: Send + Sync {
    /// Delay before attempt number `attempt`
    ///
    /// # Returns
    /// * `Some(duration)` - wait this long, then dial
    /// * `None` - give up
    fn next_delay(&self, attempt: usize) -> Option<Duration>;
}

/// Whether attempt number `attempt` is below the optional cap
fn within_limit(max_attempts: Option<usize>, attempt: usize) -> bool {
    max_attempts.map_or(true, |max| attempt < max)
}

/// Constant interval between attempts
///
/// The default is one attempt per second, forever.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<usize>,
}

impl FixedDelay {
    /// # Arguments
    /// * `delay` - The interval between attempts
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(delay: Duration, max_attempts: Option<usize>) -> Self {
        Self { delay, max_attempts }
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_INTERVAL, None)
    }
}

impl ReconnectionStrategy for FixedDelay {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        within_limit(self.max_attempts, attempt).then_some(self.delay)
    }
}

/// Exponential backoff between attempts
///
/// `initial_delay * 2^attempt`, capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<usize>,
}

impl ExponentialBackoff {
    /// # Arguments
    /// * `initial_delay` - Delay before the first attempt
    /// * `max_delay` - Upper bound for any single delay
    /// * `max_attempts` - Maximum number of attempts (None = unlimited)
    pub fn new(initial_delay: Duration, max_delay: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            initial_delay,
            max_delay,
            max_attempts,
        }
    }
}

impl ReconnectionStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if !within_limit(self.max_attempts, attempt) {
            return None;
        }

        let factor = 1u32.checked_shl(attempt.min(31) as u32).unwrap_or(u32::MAX);
        let delay = self
            .initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay);
        Some(delay)
    }
}

/// Disables automatic reconnection
///
/// The client reports `disconnected` and stays down.
#[derive(Debug, Clone)]
pub struct NeverReconnect;

impl ReconnectionStrategy for NeverReconnect {
    fn next_delay(&self, _attempt: usize) -> Option<Duration> {
        None
    }
}
