//! # tickloop
//!
//! Single-threaded timer event loop for embedded scripting runtimes.
//!
//! This library re-exports the workspace crates and adds a plan-driven
//! callback host used by the `tickloop` binary.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub use tickloop_core;
pub use tickloop_scheduler;

pub mod cli;
pub mod host;
pub mod plan;

pub use host::{ScriptHost, run_plan};
pub use plan::{Plan, PlanError, TimerSpec};
