//! The unit of scheduling.

use tickloop_core::{TimerId, TimerKind};

/// A scheduled timer.
///
/// Records are owned values and deliberately not `Clone`: a record lives in
/// exactly one place (the ordered table or the expiring slot) until it is
/// dropped, so it can be destroyed only once.
#[derive(Debug, PartialEq)]
pub struct TimerRecord {
    id: TimerId,
    target: f64,
    delay: f64,
    kind: TimerKind,
    pending_removal: bool,
}

impl TimerRecord {
    pub(crate) fn new(id: TimerId, now: f64, delay: f64, kind: TimerKind) -> Self {
        Self {
            id,
            target: now + delay,
            delay,
            kind,
            pending_removal: false,
        }
    }

    /// Get the timer ID.
    #[must_use]
    pub const fn id(&self) -> TimerId {
        self.id
    }

    /// Absolute due time in clock milliseconds.
    #[must_use]
    pub const fn target(&self) -> f64 {
        self.target
    }

    /// Delay (one-shot) or period (repeating) in milliseconds.
    #[must_use]
    pub const fn delay(&self) -> f64 {
        self.delay
    }

    /// Get the timer kind.
    #[must_use]
    pub const fn kind(&self) -> TimerKind {
        self.kind
    }

    /// Check if the record will be dropped once its expiry completes.
    #[must_use]
    pub const fn is_pending_removal(&self) -> bool {
        self.pending_removal
    }

    /// Check if the timer is due at `now`.
    #[must_use]
    pub fn is_due(&self, now: f64) -> bool {
        self.target <= now
    }

    pub(crate) fn mark_pending_removal(&mut self) {
        self.pending_removal = true;
    }

    /// Schedule the next fire relative to `now`.
    ///
    /// This is `now + delay`, not `target + delay`: after a long stall the
    /// timer fires once and then resumes its period, with no catch-up burst.
    pub(crate) fn rearm(&mut self, now: f64) {
        self.target = now + self.delay;
    }
}
