//! The event loop facade tying the table, host, clock and waiter together.

use tickloop_core::{LoopConfig, Result, TimerId, TimerKind};

use crate::clock::{Clock, SleepWaiter, SystemClock, Waiter};
use crate::driver::{LoopState, RunSummary};
use crate::host::{CallbackHost, TimerContext, apply_changes};
use crate::stats::{LoopStats, PhaseRecorder};
use crate::table::TimerTable;

/// A single-threaded timer event loop.
///
/// Owns its timer table, so several loops can coexist in one process.
#[derive(Debug)]
pub struct EventLoop<H: CallbackHost, K: Clock = SystemClock, W: Waiter = SleepWaiter> {
    pub(crate) config: LoopConfig,
    pub(crate) timers: TimerTable,
    pub(crate) host: H,
    pub(crate) clock: K,
    pub(crate) waiter: W,
    pub(crate) state: LoopState,
    pub(crate) stats: LoopStats,
    pub(crate) phases: PhaseRecorder,
}

impl<H: CallbackHost> EventLoop<H> {
    /// Create a loop on the system clock that sleeps between ticks.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the config fails validation.
    pub fn new(config: LoopConfig, host: H) -> Result<Self> {
        Self::with_parts(config, host, SystemClock::new(), SleepWaiter)
    }
}

impl<H: CallbackHost, K: Clock, W: Waiter> EventLoop<H, K, W> {
    /// Create a loop with an explicit clock and waiter.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the config fails validation.
    pub fn with_parts(config: LoopConfig, host: H, clock: K, waiter: W) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            timers: TimerTable::from_config(&config),
            phases: PhaseRecorder::new(config.gather_stats, config.page_size_bytes),
            config,
            host,
            clock,
            waiter,
            state: LoopState::Halted,
            stats: LoopStats::default(),
        })
    }

    /// Schedule `callback` to run after `delay_ms`.
    ///
    /// # Errors
    ///
    /// Returns `ResourceExhausted` if the timer table is full.
    pub fn create_timer(
        &mut self,
        callback: H::Callback,
        delay_ms: f64,
        kind: TimerKind,
    ) -> Result<TimerId> {
        let mut changes = Vec::new();
        let created = TimerContext::new(&mut self.timers, &self.clock, &mut changes, &mut self.stats)
            .create_timer(callback, delay_ms, kind);
        apply_changes(&mut self.host, changes);
        created
    }

    /// Delete a timer. Returns `false` if no live timer has this id.
    pub fn delete_timer(&mut self, id: TimerId) -> bool {
        let mut changes = Vec::new();
        let deleted = TimerContext::new(&mut self.timers, &self.clock, &mut changes, &mut self.stats)
            .delete_timer(id);
        apply_changes(&mut self.host, changes);
        deleted
    }

    /// Run `callback` as a zero-delay one-shot timer, then run the loop
    /// until no timers remain.
    ///
    /// # Errors
    ///
    /// Returns `ResourceExhausted` if the callback cannot be scheduled, and
    /// any error of [`EventLoop::run`].
    pub fn run_function(&mut self, callback: H::Callback) -> Result<RunSummary> {
        self.create_timer(callback, 0.0, TimerKind::OneShot)?;
        self.run()
    }

    #[must_use]
    pub const fn config(&self) -> &LoopConfig {
        &self.config
    }

    #[must_use]
    pub const fn timers(&self) -> &TimerTable {
        &self.timers
    }

    #[must_use]
    pub const fn host(&self) -> &H {
        &self.host
    }

    #[must_use]
    pub const fn waiter(&self) -> &W {
        &self.waiter
    }

    #[must_use]
    pub const fn state(&self) -> LoopState {
        self.state
    }

    #[must_use]
    pub const fn stats(&self) -> &LoopStats {
        &self.stats
    }

    /// Phase statistics, populated only when `gather_stats` is set.
    #[must_use]
    pub const fn phases(&self) -> &PhaseRecorder {
        &self.phases
    }
}
