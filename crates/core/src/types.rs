//! Timer identity and kind.

use std::fmt;
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

/// Unique identifier for a timer.
///
/// Ids are non-zero and handed out in increasing order by the timer table.
/// An id is never reused while the process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(NonZeroU64);

impl TimerId {
    /// Create an id from a raw value. Returns `None` for zero.
    #[must_use]
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// The first id a fresh table hands out.
    #[must_use]
    pub const fn first() -> Self {
        Self(NonZeroU64::MIN)
    }

    /// Raw numeric value, as exposed to scripts.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }

    /// The id following this one, or `None` once the id space is used up.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a timer fires once or keeps re-arming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Fires once, then is discarded (`setTimeout`).
    OneShot,
    /// Re-arms after every fire until deleted (`setInterval`).
    Repeating,
}

impl TimerKind {
    /// Map the script-level `oneshot` flag onto a kind.
    #[must_use]
    pub const fn from_one_shot(one_shot: bool) -> Self {
        if one_shot { Self::OneShot } else { Self::Repeating }
    }

    /// Check if the timer fires only once.
    #[must_use]
    pub const fn is_one_shot(self) -> bool {
        matches!(self, Self::OneShot)
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OneShot => write!(f, "one-shot"),
            Self::Repeating => write!(f, "repeating"),
        }
    }
}
