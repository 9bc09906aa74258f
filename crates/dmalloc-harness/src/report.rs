//! Run results and harness errors.

use std::io::{self, Write};

use serde::Serialize;
use thiserror::Error;

use dmalloc_core::{
    AllocError, LeakRecord, LifecycleRecord, MemoryBug, ReallocError, Statistics, Tracker,
    ViolationPolicy,
};

/// Why a scenario stopped early.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("allocation failed unexpectedly: {0}")]
    Alloc(#[from] AllocError),
    #[error(transparent)]
    Bug(#[from] MemoryBug),
    #[error("unexpected contents: {0}")]
    Contents(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ReallocError> for HarnessError {
    fn from(err: ReallocError) -> Self {
        match err {
            ReallocError::Alloc(e) => Self::Alloc(e),
            ReallocError::Bug(b) => Self::Bug(b),
        }
    }
}

/// Everything observable after a scenario ran.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub scenario: &'static str,
    pub policy: &'static str,
    pub statistics: Statistics,
    pub leaks: Vec<LeakRecord>,
    /// Diagnostic of the memory bug that stopped the run, if any.
    pub bug: Option<String>,
    /// Error kinds the scenario provoked on purpose and recovered from.
    pub recovered: Vec<String>,
    pub lifecycle: Vec<LifecycleRecord>,
}

impl ScenarioReport {
    /// Snapshot `tracker` after a run. Drains its lifecycle log.
    pub fn collect(
        scenario: &'static str,
        policy: ViolationPolicy,
        tracker: &Tracker,
        bug: Option<&MemoryBug>,
        recovered: Vec<String>,
    ) -> Self {
        Self {
            scenario,
            policy: policy.as_str(),
            statistics: tracker.statistics(),
            leaks: tracker.leaks(),
            bug: bug.map(ToString::to_string),
            recovered,
            lifecycle: tracker.drain_lifecycle_log(),
        }
    }

    /// Statistics summary followed by the leak report.
    pub fn write_text<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        self.statistics.write_summary(out)?;
        dmalloc_core::report::write_leak_report(&self.leaks, out)
    }

    pub fn write_json<W: Write>(&self, out: &mut W) -> Result<(), HarnessError> {
        serde_json::to_writer_pretty(&mut *out, self)?;
        writeln!(out)?;
        Ok(())
    }
}
