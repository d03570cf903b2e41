//! Time sources and the blocking wait primitive.
//!
//! The loop reads time through [`Clock`] and blocks through [`Waiter`], so
//! tests and simulations can drive it with [`ManualClock`] and
//! [`ManualWaiter`] instead of real time.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic millisecond clock.
///
/// Must never go backwards; wall-clock adjustments would otherwise fire
/// timers in bursts.
pub trait Clock {
    /// Current time in milliseconds since an arbitrary fixed origin.
    fn now_millis(&self) -> f64;
}

/// Blocking wait used between loop iterations.
///
/// Implementations may return early (for example on I/O readiness); the
/// loop simply re-evaluates its timers afterwards.
pub trait Waiter {
    /// Block for approximately `duration`.
    fn wait(&mut self, duration: Duration);
}

/// Clock backed by [`Instant`], with its origin at construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Create a clock starting at zero now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Waiter that puts the current thread to sleep.
#[derive(Debug, Clone, Copy, Default)]
pub struct SleepWaiter;

impl Waiter for SleepWaiter {
    fn wait(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Manually advanced clock.
///
/// Clones share the same time, so a test can keep one handle and give
/// another to the loop.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    /// Create a clock reading `start` milliseconds.
    #[must_use]
    pub fn new(start: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    /// Move time forward by `millis`.
    pub fn advance(&self, millis: f64) {
        self.now.set(self.now.get() + millis);
    }

    /// Jump to an absolute time. Callers are responsible for keeping time
    /// monotonic.
    pub fn set(&self, millis: f64) {
        self.now.set(millis);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> f64 {
        self.now.get()
    }
}

/// Waiter that advances a [`ManualClock`] instead of sleeping, and keeps a
/// log of every wait it was asked to perform.
#[derive(Debug, Clone)]
pub struct ManualWaiter {
    clock: ManualClock,
    waits: Rc<RefCell<Vec<Duration>>>,
}

impl ManualWaiter {
    /// Create a waiter driving `clock`.
    #[must_use]
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            waits: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Every wait requested so far, oldest first.
    #[must_use]
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.borrow().clone()
    }
}

impl Waiter for ManualWaiter {
    fn wait(&mut self, duration: Duration) {
        self.waits.borrow_mut().push(duration);
        self.clock.advance(duration.as_secs_f64() * 1000.0);
    }
}
