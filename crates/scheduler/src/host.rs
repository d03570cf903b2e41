//! Boundary between the scheduler and the embedding runtime.
//!
//! The scheduler never looks inside a callback. It asks the host to bind a
//! callback when a timer is created, to invoke it by id when the timer
//! fires, and to unbind it once the timer is gone for good.

use std::collections::HashMap;
use std::fmt;

use tickloop_core::{DispatchError, Result, TimerId, TimerKind};

use crate::clock::Clock;
use crate::stats::LoopStats;
use crate::table::{Removal, TimerTable};

/// Callback binding store and invoker supplied by the embedding.
///
/// The loop calls [`bind`](Self::bind) exactly once per created timer,
/// [`unbind`](Self::unbind) exactly once per permanently removed timer, and
/// [`invoke`](Self::invoke) once per fire.
pub trait CallbackHost {
    /// Host-side callback representation (a script function handle, a
    /// closure, ...).
    type Callback;

    /// Associate `callback` with a newly created timer.
    fn bind(&mut self, id: TimerId, callback: Self::Callback);

    /// Release the callback of a timer that will never fire again.
    fn unbind(&mut self, id: TimerId);

    /// Run the callback bound to `id`.
    ///
    /// The callback may create and delete timers through `timers`, including
    /// deleting `id` itself.
    ///
    /// # Errors
    ///
    /// Returns a `DispatchError` when the callback fails; the loop finishes
    /// its bookkeeping for `id` and then stops.
    fn invoke(
        &mut self,
        id: TimerId,
        timers: &mut TimerContext<'_, Self::Callback>,
    ) -> std::result::Result<(), DispatchError>;
}

/// Binding work produced while the host is busy running a callback.
pub(crate) enum BindingChange<C> {
    Bind(TimerId, C),
    Unbind(TimerId),
}

/// Replay collected binding changes on the host, in order.
pub(crate) fn apply_changes<H: CallbackHost>(host: &mut H, changes: Vec<BindingChange<H::Callback>>) {
    for change in changes {
        match change {
            BindingChange::Bind(id, callback) => host.bind(id, callback),
            BindingChange::Unbind(id) => host.unbind(id),
        }
    }
}

/// Timer operations available to running code.
///
/// Handed to callbacks during dispatch, and used by the event loop itself
/// for top-level calls. Binding changes are collected and applied to the
/// host once it is free again.
pub struct TimerContext<'a, C> {
    table: &'a mut TimerTable,
    clock: &'a dyn Clock,
    changes: &'a mut Vec<BindingChange<C>>,
    stats: &'a mut LoopStats,
}

impl<'a, C> TimerContext<'a, C> {
    pub(crate) fn new(
        table: &'a mut TimerTable,
        clock: &'a dyn Clock,
        changes: &'a mut Vec<BindingChange<C>>,
        stats: &'a mut LoopStats,
    ) -> Self {
        Self {
            table,
            clock,
            changes,
            stats,
        }
    }

    /// Schedule `callback` to run after `delay_ms`.
    ///
    /// # Errors
    ///
    /// Returns `ResourceExhausted` if the timer table is full.
    pub fn create_timer(&mut self, callback: C, delay_ms: f64, kind: TimerKind) -> Result<TimerId> {
        let id = self
            .table
            .insert(delay_ms, kind, self.clock.now_millis())?;
        self.changes.push(BindingChange::Bind(id, callback));
        self.stats.created = self.stats.created.saturating_add(1);
        Ok(id)
    }

    /// Delete a timer. Returns `false` if no live timer has this id.
    pub fn delete_timer(&mut self, id: TimerId) -> bool {
        let removal = self.table.remove(id);
        match removal {
            Removal::Removed => self.changes.push(BindingChange::Unbind(id)),
            // Unbound by the expiry engine once the callback returns.
            Removal::Deferred => {}
            Removal::NotFound => {
                self.stats.delete_misses = self.stats.delete_misses.saturating_add(1);
                return false;
            }
        }
        self.stats.deleted = self.stats.deleted.saturating_add(1);
        true
    }

    /// The timer whose callback is running right now, if any.
    #[must_use]
    pub fn current(&self) -> Option<TimerId> {
        self.table.expiring().map(crate::TimerRecord::id)
    }

    /// Current clock reading in milliseconds.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.clock.now_millis()
    }

    /// Read-only view of the timer table.
    #[must_use]
    pub fn timers(&self) -> &TimerTable {
        self.table
    }
}

/// Signature of a closure callback.
pub type CallbackFn =
    dyn FnMut(&mut TimerContext<'_, TimerCallback>) -> std::result::Result<(), DispatchError>;

/// A boxed closure usable as a timer callback with [`ClosureHost`].
pub struct TimerCallback(Box<CallbackFn>);

impl TimerCallback {
    /// Wrap a fallible closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut(&mut TimerContext<'_, Self>) -> std::result::Result<(), DispatchError> + 'static,
    {
        Self(Box::new(f))
    }

    /// Wrap a closure that always succeeds.
    pub fn infallible<F>(mut f: F) -> Self
    where
        F: FnMut(&mut TimerContext<'_, Self>) + 'static,
    {
        Self::new(move |timers| {
            f(timers);
            Ok(())
        })
    }
}

impl fmt::Debug for TimerCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TimerCallback(..)")
    }
}

/// Host whose callbacks are plain Rust closures.
#[derive(Debug, Default)]
pub struct ClosureHost {
    callbacks: HashMap<TimerId, TimerCallback>,
}

impl ClosureHost {
    /// Create an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks currently bound.
    #[must_use]
    pub fn bound(&self) -> usize {
        self.callbacks.len()
    }

    /// Check if a callback is bound to `id`.
    #[must_use]
    pub fn is_bound(&self, id: TimerId) -> bool {
        self.callbacks.contains_key(&id)
    }
}

impl CallbackHost for ClosureHost {
    type Callback = TimerCallback;

    fn bind(&mut self, id: TimerId, callback: TimerCallback) {
        self.callbacks.insert(id, callback);
    }

    fn unbind(&mut self, id: TimerId) {
        self.callbacks.remove(&id);
    }

    fn invoke(
        &mut self,
        id: TimerId,
        timers: &mut TimerContext<'_, TimerCallback>,
    ) -> std::result::Result<(), DispatchError> {
        let callback = self
            .callbacks
            .get_mut(&id)
            .ok_or_else(|| DispatchError::new(format!("no callback bound to timer {id}")))?;
        (callback.0)(timers)
    }
}
