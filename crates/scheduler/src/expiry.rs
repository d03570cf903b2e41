//! Per-tick expiry: fire due timers, then re-arm or discard them.

use tickloop_core::{Error, Result, TimerId};
use tracing::{debug, error, warn};

use crate::clock::{Clock, Waiter};
use crate::event_loop::EventLoop;
use crate::host::{CallbackHost, TimerContext, apply_changes};
use crate::record::TimerRecord;

/// What a single expiry pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Callbacks dispatched.
    pub fired: usize,
    /// Repeating timers put back into the table.
    pub rearmed: usize,
    /// Timers dropped for good.
    pub discarded: usize,
    /// The tick stopped at `max_expiries_per_tick` with due timers left.
    pub cap_reached: bool,
}

impl<H: CallbackHost, K: Clock, W: Waiter> EventLoop<H, K, W> {
    /// Fire every timer due now, up to the per-tick cap.
    ///
    /// Due-ness is judged against one clock reading taken at the start of
    /// the pass.
    ///
    /// # Errors
    ///
    /// Returns `DispatchFailed` when a callback fails, after its timer has
    /// been re-armed or discarded; the remaining due timers are left for the
    /// next tick. Returns `ResourceExhausted` when a repeating timer cannot be
    /// re-inserted; that timer is discarded. When both happen to the same
    /// timer the result is `DispatchFailedAndDropped`.
    pub fn tick(&mut self) -> Result<TickReport> {
        let mut report = TickReport::default();
        self.stats.ticks = self.stats.ticks.saturating_add(1);
        let now = self.clock.now_millis();

        while report.fired < self.config.max_expiries_per_tick {
            let Some(record) = self.timers.take_due(now) else {
                return Ok(report);
            };
            self.expire(record, now, &mut report)?;
        }

        if self.timers.nearest().is_some_and(|t| t.is_due(now)) {
            report.cap_reached = true;
            self.stats.cap_hits = self.stats.cap_hits.saturating_add(1);
            warn!(
                cap = self.config.max_expiries_per_tick,
                "Expiry cap reached, deferring remaining due timers to the next tick"
            );
        }

        Ok(report)
    }

    fn expire(&mut self, mut record: TimerRecord, now: f64, report: &mut TickReport) -> Result<()> {
        let id = record.id();
        if record.kind().is_one_shot() {
            record.mark_pending_removal();
        } else {
            record.rearm(now);
        }

        self.timers.begin_expiry(record)?;
        report.fired = report.fired.saturating_add(1);
        self.stats.fired = self.stats.fired.saturating_add(1);
        debug!(timer_id = %id, now, "Firing timer");

        let mut changes = Vec::new();
        let outcome = {
            let mut timers =
                TimerContext::new(&mut self.timers, &self.clock, &mut changes, &mut self.stats);
            self.host.invoke(id, &mut timers)
        };
        apply_changes(&mut self.host, changes);

        let settled = self.settle(report);

        if let Err(failure) = outcome {
            self.stats.dispatch_failures = self.stats.dispatch_failures.saturating_add(1);
            error!(timer_id = %id, reason = failure.reason(), "Timer callback failed");
            let reason = failure.into_reason();
            return Err(match settled {
                Err(Error::ResourceExhausted { capacity }) => {
                    Error::dispatch_failed_and_dropped(id, reason, capacity)
                }
                _ => Error::dispatch_failed(id, reason),
            });
        }

        settled
    }

    /// Empty the expiring slot: drop the record or put it back in the table.
    fn settle(&mut self, report: &mut TickReport) -> Result<()> {
        let Some(record) = self.timers.finish_expiry() else {
            return Ok(());
        };
        let id = record.id();

        if record.is_pending_removal() {
            self.discard(id, report);
            return Ok(());
        }

        match self.timers.requeue(record) {
            Ok(()) => {
                report.rearmed = report.rearmed.saturating_add(1);
                self.stats.rearmed = self.stats.rearmed.saturating_add(1);
                Ok(())
            }
            Err(err) => {
                warn!(timer_id = %id, error = %err, "Could not re-insert repeating timer");
                self.discard(id, report);
                Err(err)
            }
        }
    }

    fn discard(&mut self, id: TimerId, report: &mut TickReport) {
        self.host.unbind(id);
        report.discarded = report.discarded.saturating_add(1);
        self.stats.discarded = self.stats.discarded.saturating_add(1);
        debug!(timer_id = %id, "Discarded timer");
    }
}
