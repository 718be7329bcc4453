//! Reconnection policies for the channel task.
//!
//! A policy maps the number of failed attempts so far to the wait before
//! the next one, or to giving up. The client defaults to
//! [`ExponentialBackoff`] built from its config; pass another policy via
//! [`ChannelConfig::with_reconnect_policy`](crate::ChannelConfig::with_reconnect_policy).

use std::time::Duration;

/// Decides whether and when the channel retries after an abnormal close
///
/// `attempt` is 0-indexed: the first retry after a drop asks for
/// `next_delay(0)`.
pub trait ReconnectPolicy: Send + Sync {
    /// Wait before retry number `attempt`, or `None` to give up
    fn next_delay(&self, attempt: usize) -> Option<Duration>;

    /// Whether retry number `attempt` happens at all
    fn should_retry(&self, attempt: usize) -> bool {
        self.next_delay(attempt).is_some()
    }
}

/// Doubling backoff: `base_delay * 2^attempt`, capped at `max_delay`
///
/// Gives up once `max_attempts` retries have been scheduled; `None` means
/// retry forever.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    max_attempts: Option<usize>,
}

impl ExponentialBackoff {
    pub fn new(base_delay: Duration, max_delay: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            base_delay,
            max_delay,
            max_attempts,
        }
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt >= max) {
            return None;
        }

        let base = self.base_delay.as_millis() as u64;
        let millis = base.saturating_mul(2u64.saturating_pow(attempt as u32));
        Some(Duration::from_millis(
            millis.min(self.max_delay.as_millis() as u64),
        ))
    }
}

/// The same wait between every retry, up to `max_attempts`
#[derive(Debug, Clone)]
pub struct FixedDelay {
    delay: Duration,
    max_attempts: Option<usize>,
}

impl FixedDelay {
    pub fn new(delay: Duration, max_attempts: Option<usize>) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }
}

impl ReconnectPolicy for FixedDelay {
    fn next_delay(&self, attempt: usize) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt >= max) {
            return None;
        }
        Some(self.delay)
    }
}

/// Opts a session out of automatic recovery entirely
///
/// Every abnormal close goes straight to `max_reconnect_attempts_reached`;
/// only an explicit `connect`/`reconnect` brings the channel back.
#[derive(Debug, Clone)]
pub struct NeverReconnect;

impl ReconnectPolicy for NeverReconnect {
    fn next_delay(&self, _attempt: usize) -> Option<Duration> {
        None
    }
}
