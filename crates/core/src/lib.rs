//! Core types, errors, and configuration shared by the tickloop crates.
//!
//! - **Types**: timer identifiers and timer kinds
//! - **Errors**: the single error enum every fallible operation returns
//! - **Config**: tunable limits for the timer table and the loop driver

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod config;
pub mod error;
pub mod types;

pub use config::LoopConfig;
pub use error::{DispatchError, Error, Result};
pub use types::{TimerId, TimerKind};
