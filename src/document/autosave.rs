use std::time::{Duration, Instant};

use tracing::trace;

/// Debounce window between the last edit and the write it schedules.
pub const AUTO_SAVE_DEBOUNCE_MS: u64 = 500;

/// Single in-flight debounce over content changes.
///
/// Every `content_changed` replaces the pending payload and resets the
/// timer; only the most recent content is ever persisted. There is no
/// maximum-delay escalation: a continuous stream of edits defers the write
/// until a quiet period, so callers trigger `take_immediate` at the
/// boundaries that must be durable (file switch, close, explicit save).
///
/// Time is passed in by the caller, so tests drive the timer with plain
/// `Instant` values instead of sleeping.
#[derive(Debug)]
pub struct AutoSaveScheduler {
    delay: Duration,
    pending: Option<String>,
    last_change_at: Option<Instant>,
}

impl Default for AutoSaveScheduler {
    fn default() -> Self {
        Self::new(Duration::from_millis(AUTO_SAVE_DEBOUNCE_MS))
    }
}

impl AutoSaveScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
            last_change_at: None,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Record the latest content and restart the quiet-period timer.
    pub fn content_changed(&mut self, content: String, now: Instant) {
        self.pending = Some(content);
        self.last_change_at = Some(now);
        trace!("auto-save timer reset");
    }

    /// The pending payload, if its quiet period has elapsed. At most one
    /// payload comes out per burst of edits.
    pub fn take_due(&mut self, now: Instant) -> Option<String> {
        let changed_at = self.last_change_at?;
        if now.duration_since(changed_at) < self.delay {
            return None;
        }
        self.last_change_at = None;
        self.pending.take()
    }

    /// Bypass the timer: hand over whatever is pending right now. Used
    /// before switching files or closing so edits are never lost.
    pub fn take_immediate(&mut self) -> Option<String> {
        self.last_change_at = None;
        self.pending.take()
    }

    /// Drop any pending payload without persisting it (document closed or
    /// deleted out from under the edit).
    pub fn cancel(&mut self) {
        self.pending = None;
        self.last_change_at = None;
    }
}
