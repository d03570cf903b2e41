//! Core error types for tickloop operations.
//!
//! All errors are explicit and typed. Deleting an unknown timer is not an
//! error; it is reported through a boolean by the caller-facing API.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::TimerId;

/// The standard Result type for tickloop operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for tickloop operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    // Scheduling errors
    #[error("out of timer slots: all {capacity} slots in use")]
    ResourceExhausted { capacity: usize },

    #[error("timer id space exhausted")]
    IdSpaceExhausted,

    #[error("callback for timer {id} failed: {reason}")]
    DispatchFailed { id: TimerId, reason: String },

    #[error("callback for timer {id} failed: {reason}; timer dropped, all {capacity} slots in use")]
    DispatchFailedAndDropped {
        id: TimerId,
        reason: String,
        capacity: usize,
    },

    #[error("timer {active} is still expiring, cannot start expiring timer {requested}")]
    ExpiryInProgress { active: TimerId, requested: TimerId },

    // Configuration errors
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("failed to read file '{path}': {reason}")]
    ConfigReadFailed { path: PathBuf, reason: String },

    #[error("TOML parse error: {reason}")]
    TomlParseFailed { reason: String },
}

impl Error {
    /// Create a resource exhaustion error.
    #[must_use]
    pub const fn resource_exhausted(capacity: usize) -> Self {
        Self::ResourceExhausted { capacity }
    }

    /// Create a dispatch failure for a timer.
    pub fn dispatch_failed(id: TimerId, reason: impl Into<String>) -> Self {
        Self::DispatchFailed {
            id,
            reason: reason.into(),
        }
    }

    /// Create a dispatch failure for a repeating timer that could not be
    /// re-inserted afterwards.
    pub fn dispatch_failed_and_dropped(
        id: TimerId,
        reason: impl Into<String>,
        capacity: usize,
    ) -> Self {
        Self::DispatchFailedAndDropped {
            id,
            reason: reason.into(),
            capacity,
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a file read error.
    pub fn config_read_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ConfigReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a TOML parse error.
    pub fn toml_parse_failed(reason: impl Into<String>) -> Self {
        Self::TomlParseFailed {
            reason: reason.into(),
        }
    }

    /// Check if this error came out of a host callback.
    #[must_use]
    pub const fn is_dispatch_failure(&self) -> bool {
        matches!(
            self,
            Self::DispatchFailed { .. } | Self::DispatchFailedAndDropped { .. }
        )
    }

    /// Check if this error means the timer table is full.
    #[must_use]
    pub const fn is_resource_exhausted(&self) -> bool {
        matches!(
            self,
            Self::ResourceExhausted { .. } | Self::DispatchFailedAndDropped { .. }
        )
    }
}

/// Failure reported by a host callback.
///
/// The host decides what a failure is (a thrown script exception, a missing
/// binding, ...). The loop only carries the message upward.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct DispatchError {
    reason: String,
}

impl DispatchError {
    /// Create a dispatch error with a reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The reason the callback gave.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Consume the error, returning its reason.
    #[must_use]
    pub fn into_reason(self) -> String {
        self.reason
    }
}
