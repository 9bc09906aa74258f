//! Scenario harness for dmalloc.
//!
//! This crate provides:
//! - Named scenarios that exercise every allocation path and every class of
//!   memory bug against a fresh [`Tracker`](dmalloc_core::Tracker)
//! - A serializable [`ScenarioReport`] with statistics, leaks and the
//!   lifecycle log of a run
//!
//! Bug scenarios are run in a child process by the integration tests, since
//! the default policy aborts.

#![deny(unsafe_code)]

pub mod report;
#[allow(unsafe_code)]
pub mod scenario;

pub use report::{HarnessError, ScenarioReport};
pub use scenario::Scenario;
