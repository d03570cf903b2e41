//! # tickloop-scheduler
//!
//! A single-threaded timer scheduler for embedding in a script host.
//!
//! - [`TimerTable`]: sorted, bounded storage with an out-of-band expiring slot
//! - Expiry engine ([`EventLoop::tick`]): fires due timers and re-arms or
//!   discards them
//! - Loop driver ([`EventLoop::run`]): waits for the nearest deadline until no
//!   timers remain
//!
//! Callbacks stay opaque. The embedding supplies a [`CallbackHost`] that binds,
//! invokes and unbinds them by [`TimerId`]; while a callback runs it reaches
//! the scheduler only through a [`TimerContext`].
//!
//! ```no_run
//! use tickloop_core::{LoopConfig, TimerKind};
//! use tickloop_scheduler::{ClosureHost, EventLoop, TimerCallback};
//!
//! # fn main() -> tickloop_core::Result<()> {
//! let mut event_loop = EventLoop::new(LoopConfig::default(), ClosureHost::new())?;
//! event_loop.run_function(TimerCallback::infallible(|timers| {
//!     let _ = timers.create_timer(
//!         TimerCallback::infallible(|_| println!("tick")),
//!         500.0,
//!         TimerKind::OneShot,
//!     );
//! }))?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod clock;
pub mod driver;
pub mod event_loop;
pub mod expiry;
pub mod host;
pub mod record;
pub mod stats;
pub mod table;

pub use clock::{Clock, ManualClock, ManualWaiter, SleepWaiter, SystemClock, Waiter};
pub use driver::{LoopState, RunSummary};
pub use event_loop::EventLoop;
pub use expiry::TickReport;
pub use host::{CallbackFn, CallbackHost, ClosureHost, TimerCallback, TimerContext};
pub use record::TimerRecord;
pub use stats::{LoopStats, PhaseRecorder, PhaseStart, PhaseStats};
pub use table::{Removal, TimerTable};
pub use tickloop_core::{DispatchError, Error, LoopConfig, Result, TimerId, TimerKind};
