//! Loop counters and per-phase resource measurements.

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Serialize;
use tracing::debug;

/// Running totals kept by an event loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoopStats {
    /// Timers created, top-level and from callbacks.
    pub created: u64,
    /// Successful deletions.
    pub deleted: u64,
    /// Deletions naming an unknown timer.
    pub delete_misses: u64,
    /// Callbacks dispatched.
    pub fired: u64,
    /// Repeating timers put back into the table.
    pub rearmed: u64,
    /// Timers dropped after their last fire.
    pub discarded: u64,
    /// Callbacks that returned an error.
    pub dispatch_failures: u64,
    /// Expiry passes run.
    pub ticks: u64,
    /// Ticks that stopped at the per-tick expiry cap.
    pub cap_hits: u64,
    /// Blocking waits performed.
    pub waits: u64,
    /// Total time requested from the waiter, in milliseconds.
    pub waited_ms: u64,
}

/// Measurements for one named phase.
pub type PhaseStats = BTreeMap<String, u64>;

/// Collects elapsed time and memory growth per phase.
///
/// Disabled recorders ignore every call, so the loop can use one
/// unconditionally.
#[derive(Debug, Clone, Default)]
pub struct PhaseRecorder {
    enabled: bool,
    page_size_bytes: u64,
    phases: BTreeMap<String, PhaseStats>,
}

/// Start of an in-progress phase measurement.
#[derive(Debug)]
pub struct PhaseStart {
    name: &'static str,
    started: Instant,
    memory_bytes: u64,
}

impl PhaseRecorder {
    #[must_use]
    pub const fn new(enabled: bool, page_size_bytes: u64) -> Self {
        Self {
            enabled,
            page_size_bytes,
            phases: BTreeMap::new(),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Begin measuring `name`. Returns `None` when disabled.
    #[must_use]
    pub fn start(&self, name: &'static str) -> Option<PhaseStart> {
        self.enabled.then(|| PhaseStart {
            name,
            started: Instant::now(),
            memory_bytes: self.memory_bytes(),
        })
    }

    /// Record the measurements of a finished phase, replacing any previous
    /// entry with the same name.
    pub fn finish(&mut self, start: Option<PhaseStart>) {
        let Some(start) = start else {
            return;
        };

        let elapsed_us = u64::try_from(start.started.elapsed().as_micros()).unwrap_or(u64::MAX);
        let memory_bytes = self.memory_bytes().saturating_sub(start.memory_bytes);

        debug!(
            phase = start.name,
            elapsed_us,
            memory_bytes,
            "Recorded phase statistics"
        );

        let mut stats = PhaseStats::new();
        stats.insert("elapsed_us".to_string(), elapsed_us);
        stats.insert("memory_bytes".to_string(), memory_bytes);
        self.phases.insert(start.name.to_string(), stats);
    }

    /// Measurements for one phase.
    #[must_use]
    pub fn phase(&self, name: &str) -> Option<&PhaseStats> {
        self.phases.get(name)
    }

    /// All recorded phases by name.
    #[must_use]
    pub const fn phases(&self) -> &BTreeMap<String, PhaseStats> {
        &self.phases
    }

    fn memory_bytes(&self) -> u64 {
        resident_pages().map_or(0, |pages| pages.saturating_mul(self.page_size_bytes))
    }
}

/// Total program size in pages, from the first field of `/proc/self/statm`.
fn resident_pages() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    parse_statm(&statm)
}

fn parse_statm(statm: &str) -> Option<u64> {
    statm.split_whitespace().next()?.parse().ok()
}
