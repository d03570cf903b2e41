//! Timer plans: TOML descriptions of named, scripted timers.
//!
//! A plan lists timers by name. Each timer can spawn or cancel other named
//! timers when it fires, cancel itself after a number of fires, or report a
//! failure on a given fire. The optional `entry` timer is started through
//! [`EventLoop::run_function`](tickloop_scheduler::EventLoop::run_function).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tickloop_core::TimerKind;
use tracing::debug;

/// Errors from loading, validating or running a plan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("failed to read plan '{path}': {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to parse plan: {reason}")]
    ParseFailed { reason: String },

    #[error("timer names must not be empty")]
    EmptyName,

    #[error("timer '{name}' is defined more than once")]
    DuplicateName { name: String },

    #[error("timer '{referrer}' refers to undefined timer '{name}'")]
    UnknownTimer { referrer: String, name: String },

    #[error("entry timer '{name}' is not defined")]
    UnknownEntry { name: String },

    #[error("timer '{name}': {field} must be at least 1")]
    ZeroCount { name: String, field: &'static str },

    #[error(transparent)]
    Loop(#[from] tickloop_core::Error),
}

/// A whole plan file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    /// Timer started through `run_function` instead of up front.
    #[serde(default)]
    pub entry: Option<String>,

    #[serde(default, rename = "timer")]
    pub timers: Vec<TimerSpec>,
}

/// One named timer and its scripted behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimerSpec {
    pub name: String,

    /// Delay, or period for repeating timers, in milliseconds.
    pub delay_ms: f64,

    #[serde(default)]
    pub repeat: bool,

    /// Create this timer before the loop starts. Ignored for the entry.
    #[serde(default = "default_start")]
    pub start: bool,

    /// Delete itself on this fire.
    #[serde(default)]
    pub cancel_after: Option<u64>,

    /// Timers created each time this one fires.
    #[serde(default)]
    pub spawn: Vec<String>,

    /// Timers deleted each time this one fires.
    #[serde(default)]
    pub cancel: Vec<String>,

    /// Report a dispatch failure on this fire.
    #[serde(default)]
    pub fail_on: Option<u64>,
}

const fn default_start() -> bool {
    true
}

impl TimerSpec {
    #[must_use]
    pub const fn kind(&self) -> TimerKind {
        TimerKind::from_one_shot(!self.repeat)
    }
}

impl Plan {
    /// Parse and validate a plan from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `ParseFailed` for malformed TOML, otherwise the errors of
    /// [`Plan::validate`].
    pub fn from_toml_str(text: &str) -> Result<Self, PlanError> {
        let plan: Self = toml::from_str(text).map_err(|e| PlanError::ParseFailed {
            reason: e.to_string(),
        })?;
        plan.validate()?;
        Ok(plan)
    }

    /// Load and validate a plan file.
    ///
    /// # Errors
    ///
    /// Returns `ReadFailed` if the file cannot be read, otherwise the errors
    /// of [`Plan::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| PlanError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let plan = Self::from_toml_str(&text)?;
        debug!(path = %path.display(), timers = plan.timers.len(), "Loaded timer plan");
        Ok(plan)
    }

    /// Check names are unique and every reference resolves.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), PlanError> {
        let mut names = HashSet::new();
        for spec in &self.timers {
            if spec.name.trim().is_empty() {
                return Err(PlanError::EmptyName);
            }
            if !names.insert(spec.name.as_str()) {
                return Err(PlanError::DuplicateName {
                    name: spec.name.clone(),
                });
            }
        }

        for spec in &self.timers {
            let unknown = spec
                .spawn
                .iter()
                .chain(&spec.cancel)
                .find(|n| !names.contains(n.as_str()));
            if let Some(name) = unknown {
                return Err(PlanError::UnknownTimer {
                    referrer: spec.name.clone(),
                    name: name.clone(),
                });
            }
            for (field, count) in [("cancel_after", spec.cancel_after), ("fail_on", spec.fail_on)] {
                if count == Some(0) {
                    return Err(PlanError::ZeroCount {
                        name: spec.name.clone(),
                        field,
                    });
                }
            }
        }

        if let Some(entry) = self.entry.as_ref().filter(|e| !names.contains(e.as_str())) {
            return Err(PlanError::UnknownEntry {
                name: entry.clone(),
            });
        }

        Ok(())
    }

    /// Look up a timer by name.
    #[must_use]
    pub fn timer(&self, name: &str) -> Option<&TimerSpec> {
        self.timers.iter().find(|t| t.name == name)
    }

    /// Timers created before the loop starts, in file order.
    pub fn initial_timers(&self) -> impl Iterator<Item = &TimerSpec> {
        self.timers
            .iter()
            .filter(|t| t.start && self.entry.as_deref() != Some(t.name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    const SAMPLE: &str = r#"
entry = "boot"

[[timer]]
name = "boot"
delay_ms = 0.0
spawn = ["beat"]

[[timer]]
name = "beat"
delay_ms = 100.0
repeat = true
start = false
cancel_after = 3

[[timer]]
name = "watchdog"
delay_ms = 1000.0
cancel = ["beat"]
"#;

    #[test]
    fn test_parse_sample_plan() {
        let plan = Plan::from_toml_str(SAMPLE).unwrap();
        assert_eq!(plan.entry.as_deref(), Some("boot"));
        assert_eq!(plan.timers.len(), 3);

        let beat = plan.timer("beat").unwrap();
        assert_eq!(beat.kind(), TimerKind::Repeating);
        assert_eq!(beat.cancel_after, Some(3));
        assert!(!beat.start);

        let watchdog = plan.timer("watchdog").unwrap();
        assert!(watchdog.start);
        assert_eq!(watchdog.kind(), TimerKind::OneShot);

        let initial: Vec<_> = plan.initial_timers().map(|t| t.name.as_str()).collect();
        assert_eq!(initial, vec!["watchdog"]);
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let text = "[[timer]]\nname = \"a\"\ndelay_ms = 1.0\n[[timer]]\nname = \"a\"\ndelay_ms = 2.0\n";
        assert_eq!(
            Plan::from_toml_str(text).unwrap_err(),
            PlanError::DuplicateName {
                name: "a".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_empty_name() {
        let text = "[[timer]]\nname = \"  \"\ndelay_ms = 1.0\n";
        assert_eq!(Plan::from_toml_str(text).unwrap_err(), PlanError::EmptyName);
    }

    #[test]
    fn test_rejects_unknown_references() {
        let text = "[[timer]]\nname = \"a\"\ndelay_ms = 1.0\nspawn = [\"b\"]\n";
        assert!(matches!(
            Plan::from_toml_str(text),
            Err(PlanError::UnknownTimer { .. })
        ));

        let text = "entry = \"main\"\n[[timer]]\nname = \"a\"\ndelay_ms = 1.0\n";
        assert!(matches!(
            Plan::from_toml_str(text),
            Err(PlanError::UnknownEntry { .. })
        ));
    }

    #[test]
    fn test_rejects_zero_counts() {
        let text = "[[timer]]\nname = \"a\"\ndelay_ms = 1.0\nfail_on = 0\n";
        let err = Plan::from_toml_str(text).unwrap_err();
        assert_eq!(err.to_string(), "timer 'a': fail_on must be at least 1");
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let text = "[[timer]]\nname = \"a\"\ndelay_ms = 1.0\nrepeats = true\n";
        assert!(matches!(
            Plan::from_toml_str(text),
            Err(PlanError::ParseFailed { .. })
        ));
    }

    #[test]
    fn test_empty_plan_is_valid() {
        let plan = Plan::from_toml_str("").unwrap();
        assert!(plan.timers.is_empty());
        assert!(plan.entry.is_none());
    }
}
