//! Loop driver: tick, compute the next deadline, wait, repeat.

use std::time::Duration;

use tickloop_core::{LoopConfig, Result};
use tracing::{debug, info};

use crate::clock::{Clock, Waiter};
use crate::event_loop::EventLoop;
use crate::expiry::TickReport;
use crate::host::CallbackHost;

/// Whether the loop is currently inside [`EventLoop::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    Running,
    #[default]
    Halted,
}

impl LoopState {
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Totals for one call to [`EventLoop::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Loop iterations, one tick each.
    pub iterations: u64,
    /// Callbacks dispatched across all ticks.
    pub fired: u64,
    /// Total time handed to the waiter.
    pub waited: Duration,
}

impl RunSummary {
    fn absorb(&mut self, report: TickReport) {
        self.iterations = self.iterations.saturating_add(1);
        self.fired = self
            .fired
            .saturating_add(u64::try_from(report.fired).unwrap_or(u64::MAX));
    }
}

impl<H: CallbackHost, K: Clock, W: Waiter> EventLoop<H, K, W> {
    /// Run until no timers remain.
    ///
    /// # Errors
    ///
    /// Stops at the first failing tick and returns its error; see
    /// [`EventLoop::tick`]. The loop is halted either way.
    pub fn run(&mut self) -> Result<RunSummary> {
        let phase = self.phases.start("run");
        self.state = LoopState::Running;
        info!(timers = self.timers.len(), "Event loop started");

        let result = self.drive();

        self.state = LoopState::Halted;
        self.phases.finish(phase);
        match &result {
            Ok(summary) => info!(
                iterations = summary.iterations,
                fired = summary.fired,
                "Event loop halted, no timers left"
            ),
            Err(err) => info!(error = %err, timers = self.timers.len(), "Event loop halted on error"),
        }
        result
    }

    fn drive(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        loop {
            let report = self.tick()?;
            summary.absorb(report);

            let Some(nearest) = self.timers.nearest() else {
                return Ok(summary);
            };

            let diff = nearest.target() - self.clock.now_millis();
            let wait = clamp_wait(diff, &self.config);
            debug!(
                timer_id = %nearest.id(),
                target = nearest.target(),
                wait_ms = wait.as_secs_f64() * 1000.0,
                "Waiting for next timer"
            );

            self.stats.waits = self.stats.waits.saturating_add(1);
            self.stats.waited_ms = self
                .stats
                .waited_ms
                .saturating_add(u64::try_from(wait.as_millis()).unwrap_or(u64::MAX));
            summary.waited = summary.waited.saturating_add(wait);
            self.waiter.wait(wait);
        }
    }
}

/// Turn the time until the next deadline into a wait bounded by the
/// configured minimum and maximum.
///
/// Bounds that are negative or NaN yield a zero wait; an unrepresentable
/// upper bound saturates at `Duration::MAX`.
pub(crate) fn clamp_wait(diff_ms: f64, config: &LoopConfig) -> Duration {
    let millis = if diff_ms < config.min_wait_ms || diff_ms.is_nan() {
        config.min_wait_ms
    } else if diff_ms > config.max_wait_ms {
        config.max_wait_ms
    } else {
        diff_ms
    };
    if millis.is_nan() || millis <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(millis / 1000.0).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::cell::Cell;
    use std::rc::Rc;

    use tickloop_core::{DispatchError, TimerKind};

    use super::*;
    use crate::clock::{ManualClock, ManualWaiter};
    use crate::host::{ClosureHost, TimerCallback};

    fn manual_loop(config: LoopConfig) -> EventLoop<ClosureHost, ManualClock, ManualWaiter> {
        let clock = ManualClock::new(0.0);
        let waiter = ManualWaiter::new(clock.clone());
        EventLoop::with_parts(config, ClosureHost::new(), clock, waiter).unwrap()
    }

    #[test]
    fn test_clamp_wait_bounds() {
        let config = LoopConfig::default();
        assert_eq!(clamp_wait(-50.0, &config), Duration::from_millis(1));
        assert_eq!(clamp_wait(0.5, &config), Duration::from_millis(1));
        assert_eq!(clamp_wait(250.0, &config), Duration::from_millis(250));
        assert_eq!(clamp_wait(1e9, &config), Duration::from_secs(60));
        assert_eq!(clamp_wait(f64::INFINITY, &config), Duration::from_secs(60));
        assert_eq!(clamp_wait(f64::NAN, &config), Duration::from_millis(1));
    }

    #[test]
    fn test_clamp_wait_with_unvalidated_bounds() {
        let config = LoopConfig {
            min_wait_ms: -5.0,
            ..LoopConfig::default()
        };
        assert_eq!(clamp_wait(-50.0, &config), Duration::ZERO);
        assert_eq!(clamp_wait(f64::NAN, &config), Duration::ZERO);
        assert_eq!(clamp_wait(250.0, &config), Duration::from_millis(250));

        let config = LoopConfig {
            min_wait_ms: f64::NAN,
            max_wait_ms: f64::INFINITY,
            ..LoopConfig::default()
        };
        assert_eq!(clamp_wait(f64::NAN, &config), Duration::ZERO);
        assert_eq!(clamp_wait(f64::INFINITY, &config), Duration::MAX);
    }

    #[test]
    fn test_run_with_no_timers_returns_immediately() {
        let mut event_loop = manual_loop(LoopConfig::default());
        let summary = event_loop.run().unwrap();
        assert_eq!(summary.iterations, 1);
        assert_eq!(summary.fired, 0);
        assert!(event_loop.waiter().waits().is_empty());
        assert_eq!(event_loop.state(), LoopState::Halted);
    }

    #[test]
    fn test_run_waits_until_last_one_shot() {
        let mut event_loop = manual_loop(LoopConfig::default());
        event_loop
            .create_timer(TimerCallback::infallible(|_| {}), 100.0, TimerKind::OneShot)
            .unwrap();
        event_loop
            .create_timer(TimerCallback::infallible(|_| {}), 250.0, TimerKind::OneShot)
            .unwrap();

        let summary = event_loop.run().unwrap();
        assert_eq!(summary.fired, 2);
        assert_eq!(
            event_loop.waiter().waits(),
            vec![Duration::from_millis(100), Duration::from_millis(150)]
        );
        assert_eq!(summary.waited, Duration::from_millis(250));
        assert!(event_loop.timers().is_empty());
        assert_eq!(event_loop.host().bound(), 0);
    }

    #[test]
    fn test_run_caps_long_waits() {
        let config = LoopConfig {
            max_wait_ms: 1_000.0,
            ..LoopConfig::default()
        };
        let mut event_loop = manual_loop(config);
        event_loop
            .create_timer(TimerCallback::infallible(|_| {}), 2_500.0, TimerKind::OneShot)
            .unwrap();

        event_loop.run().unwrap();
        assert_eq!(
            event_loop.waiter().waits(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(1),
                Duration::from_millis(500)
            ]
        );
    }

    #[test]
    fn test_run_function_stops_after_repeating_timer_cancels() {
        let mut event_loop = manual_loop(LoopConfig::default());
        let fires = Rc::new(Cell::new(0));
        let handle = Rc::clone(&fires);

        let summary = event_loop
            .run_function(TimerCallback::infallible(move |timers| {
                let handle = Rc::clone(&handle);
                timers
                    .create_timer(
                        TimerCallback::infallible(move |timers| {
                            handle.set(handle.get() + 1);
                            if handle.get() == 3 {
                                let me = timers.current().unwrap();
                                timers.delete_timer(me);
                            }
                        }),
                        10.0,
                        TimerKind::Repeating,
                    )
                    .unwrap();
            }))
            .unwrap();

        assert_eq!(fires.get(), 3);
        assert_eq!(summary.fired, 4);
        assert_eq!(event_loop.state(), LoopState::Halted);
        assert_eq!(event_loop.stats().rearmed, 2);
        assert_eq!(event_loop.stats().discarded, 2);
    }

    #[test]
    fn test_run_halts_on_dispatch_failure() {
        let mut event_loop = manual_loop(LoopConfig::default());
        event_loop
            .create_timer(
                TimerCallback::new(|_| Err(DispatchError::new("script threw"))),
                10.0,
                TimerKind::Repeating,
            )
            .unwrap();

        let err = event_loop.run().unwrap_err();
        assert!(err.is_dispatch_failure());
        assert_eq!(event_loop.state(), LoopState::Halted);
        assert_eq!(event_loop.timers().len(), 1);
    }

    #[test]
    fn test_run_records_phase_when_enabled() {
        let mut event_loop = manual_loop(LoopConfig::default().with_gather_stats(true));
        event_loop
            .create_timer(TimerCallback::infallible(|_| {}), 5.0, TimerKind::OneShot)
            .unwrap();
        event_loop.run().unwrap();

        let phase = event_loop.phases().phase("run").unwrap();
        assert!(phase.contains_key("elapsed_us"));
        assert!(phase.contains_key("memory_bytes"));
    }
}
