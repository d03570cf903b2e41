//! Dense, sorted timer storage.
//!
//! Records are kept ordered by `target`, latest first, so the earliest-due
//! timer is always the last element: finding the next expiry is O(1) and
//! popping it is a `Vec::pop`. Insertion appends and bubbles backwards,
//! which is O(n) in the worst case; tables are sized for tens of timers,
//! not millions.
//!
//! While a callback runs, its timer lives in a separate expiring slot so the
//! callback can freely add and delete timers without disturbing the record
//! being dispatched.

use tickloop_core::{Error, LoopConfig, Result, TimerId, TimerKind};
use tracing::debug;

use crate::record::TimerRecord;

/// Outcome of a removal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The record was taken out of the ordered table.
    Removed,
    /// The timer is mid-callback; it was flagged and will be dropped once
    /// its expiry completes.
    Deferred,
    /// No live timer has this id.
    NotFound,
}

impl Removal {
    /// Whether a live timer matched the id.
    #[must_use]
    pub const fn is_found(self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

/// Sorted timer storage plus the expiring slot.
#[derive(Debug)]
pub struct TimerTable {
    /// Ordered by target, descending. Tail expires first.
    records: Vec<TimerRecord>,
    /// Timer whose callback is currently running.
    expiring: Option<TimerRecord>,
    capacity: usize,
    min_delay_ms: f64,
    next_id: Option<TimerId>,
}

impl TimerTable {
    /// Create an empty table.
    #[must_use]
    pub fn new(capacity: usize, min_delay_ms: f64) -> Self {
        Self {
            records: Vec::with_capacity(capacity.min(64)),
            expiring: None,
            capacity,
            min_delay_ms,
            next_id: Some(TimerId::first()),
        }
    }

    /// Create a table using the limits of a loop config.
    #[must_use]
    pub fn from_config(config: &LoopConfig) -> Self {
        Self::new(config.max_timers, config.min_delay_ms)
    }

    /// Number of timers in the ordered table (the expiring slot excluded).
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the ordered table holds no timers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Maximum number of timers the ordered table holds.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records from head (latest) to tail (earliest).
    #[must_use]
    pub fn records(&self) -> &[TimerRecord] {
        &self.records
    }

    /// The timer whose callback is currently running, if any.
    #[must_use]
    pub const fn expiring(&self) -> Option<&TimerRecord> {
        self.expiring.as_ref()
    }

    /// Check if a timer is live, either in the table or mid-callback.
    #[must_use]
    pub fn contains(&self, id: TimerId) -> bool {
        self.expiring.as_ref().is_some_and(|t| t.id() == id)
            || self.records.iter().any(|t| t.id() == id)
    }

    /// Earliest-due timer.
    #[must_use]
    pub fn nearest(&self) -> Option<&TimerRecord> {
        self.records.last()
    }

    /// Add a timer due `delay_ms` after `now`.
    ///
    /// Delays below the configured minimum (including NaN) are raised to the
    /// minimum. Among timers with equal targets the newest fires first.
    ///
    /// # Errors
    ///
    /// Returns `ResourceExhausted` when the table is full and
    /// `IdSpaceExhausted` when no id is left. The table is unchanged on error.
    pub fn insert(&mut self, delay_ms: f64, kind: TimerKind, now: f64) -> Result<TimerId> {
        let delay = self.clamp_delay(delay_ms);
        self.ensure_room()?;

        let id = self.next_id.ok_or(Error::IdSpaceExhausted)?;
        self.next_id = id.next();

        let record = TimerRecord::new(id, now, delay, kind);
        debug!(timer_id = %id, target = record.target(), %kind, "Created timer");
        self.records.push(record);
        self.bubble_last();
        Ok(id)
    }

    /// Remove a timer by id.
    ///
    /// A timer in the expiring slot is only flagged; the expiry engine
    /// drops it once its callback returns.
    pub fn remove(&mut self, id: TimerId) -> Removal {
        if let Some(expiring) = self.expiring.as_mut().filter(|t| t.id() == id) {
            expiring.mark_pending_removal();
            debug!(timer_id = %id, "Deleted expiring timer");
            return Removal::Deferred;
        }

        match self.records.iter().position(|t| t.id() == id) {
            Some(index) => {
                self.records.remove(index);
                debug!(timer_id = %id, "Deleted timer");
                Removal::Removed
            }
            None => {
                debug!(timer_id = %id, "Trying to delete unknown timer; ignoring");
                Removal::NotFound
            }
        }
    }

    /// Pop the earliest timer if it is due at `now`.
    pub(crate) fn take_due(&mut self, now: f64) -> Option<TimerRecord> {
        if self.nearest()?.is_due(now) {
            self.records.pop()
        } else {
            None
        }
    }

    /// Move a record into the expiring slot.
    pub(crate) fn begin_expiry(&mut self, record: TimerRecord) -> Result<()> {
        if let Some(active) = &self.expiring {
            return Err(Error::ExpiryInProgress {
                active: active.id(),
                requested: record.id(),
            });
        }
        self.expiring = Some(record);
        Ok(())
    }

    /// Take the record back out of the expiring slot.
    pub(crate) fn finish_expiry(&mut self) -> Option<TimerRecord> {
        self.expiring.take()
    }

    /// Put a re-armed record back into its sorted position.
    ///
    /// On error the record is dropped.
    pub(crate) fn requeue(&mut self, record: TimerRecord) -> Result<()> {
        self.ensure_room()?;
        debug!(timer_id = %record.id(), target = record.target(), "Queueing timer back into active list");
        self.records.push(record);
        self.bubble_last();
        Ok(())
    }

    fn ensure_room(&self) -> Result<()> {
        if self.records.len() >= self.capacity {
            return Err(Error::resource_exhausted(self.capacity));
        }
        Ok(())
    }

    fn clamp_delay(&self, delay_ms: f64) -> f64 {
        if delay_ms >= self.min_delay_ms {
            delay_ms
        } else {
            self.min_delay_ms
        }
    }

    /// Move the last record backwards until the table is sorted again.
    fn bubble_last(&mut self) {
        let mut index = self.records.len().saturating_sub(1);
        while index > 0 {
            let previous = index.saturating_sub(1);
            let later = match (self.records.get(previous), self.records.get(index)) {
                (Some(prev), Some(current)) => current.target() > prev.target(),
                _ => false,
            };
            if !later {
                break;
            }
            self.records.swap(previous, index);
            index = previous;
        }
    }
}
