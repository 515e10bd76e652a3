//! Save coalescing.
//!
//! Many change notifications between two flushes collapse into one save of
//! the whole collection. A request is only cleared by `mark_saved`; a
//! failed flush is retried with exponential backoff.

use std::time::{Duration, Instant};

const FIRST_RETRY_DELAY: Duration = Duration::from_millis(250);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SavePolicy {
    /// Flush on the first tick after a request.
    OnChange,
    /// Flush at most once per interval.
    Interval(Duration),
}

#[derive(Debug, Clone)]
pub struct SaveScheduler {
    policy: SavePolicy,
    pending: bool,
    last_save: Option<Instant>,
    retry_at: Option<Instant>,
    retry_delay: Duration,
}

impl SaveScheduler {
    pub fn new(policy: SavePolicy) -> Self {
        Self {
            policy,
            pending: false,
            last_save: None,
            retry_at: None,
            retry_delay: FIRST_RETRY_DELAY,
        }
    }

    pub fn policy(&self) -> SavePolicy {
        self.policy
    }

    /// Marks the collection dirty.
    pub fn request(&mut self) {
        self.pending = true;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Whether a pending save is due at `now`.
    pub fn should_flush(&self, now: Instant) -> bool {
        if !self.pending || self.retry_at.is_some_and(|retry_at| now < retry_at) {
            return false;
        }
        match (self.policy, self.last_save) {
            (SavePolicy::OnChange, _) | (SavePolicy::Interval(_), None) => true,
            (SavePolicy::Interval(interval), Some(last)) => {
                now.saturating_duration_since(last) >= interval
            }
        }
    }

    /// Clears the pending request after a successful flush at `now`.
    pub fn mark_saved(&mut self, now: Instant) {
        self.pending = false;
        self.last_save = Some(now);
        self.retry_at = None;
        self.retry_delay = FIRST_RETRY_DELAY;
    }

    /// Keeps the request pending and holds retries off until the backoff
    /// delay after `now` has passed.
    pub fn mark_failed(&mut self, now: Instant) {
        self.pending = true;
        self.retry_at = Some(now + self.retry_delay);
        self.retry_delay = (self.retry_delay * 2).min(MAX_RETRY_DELAY);
    }
}
