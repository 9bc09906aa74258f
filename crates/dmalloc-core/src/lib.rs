//! # dmalloc-core
//!
//! A debugging allocator front end. Every block handed out carries a header
//! in front of the payload and a canary byte after it; every free is checked
//! against the header, the canary and a registry of live payloads before the
//! memory goes back to the underlying allocator.
//!
//! ```
//! use dmalloc_core::{SystemAllocator, Tracker, TrackerConfig, dfree, dmalloc};
//!
//! let tracker = Tracker::with_config(SystemAllocator, TrackerConfig::default());
//! let p = dmalloc!(tracker, 16).unwrap();
//! assert_eq!(tracker.statistics().active_count, 1);
//! let freed = unsafe { dfree!(tracker, p.as_ptr()) };
//! assert!(freed.is_ok());
//! assert!(tracker.leaks().is_empty());
//! ```
//!
//! Detected corruption is a [`MemoryBug`]; by default it aborts the process
//! with a `MEMORY BUG: ...` line on stderr. See [`ViolationPolicy`].

pub mod callsite;
pub mod config;
pub mod error;
pub mod layout;
pub mod lifecycle;
pub mod quarantine;
pub mod raw;
pub mod registry;
pub mod report;
pub mod stats;
pub mod tracker;
pub mod validate;

pub use callsite::CallSite;
pub use config::{TrackerConfig, ViolationPolicy};
pub use error::{AllocError, BugKind, MemoryBug, ReallocError};
pub use layout::{AllocationHeader, CANARY_BYTE, HEADER_SIZE, OVERHEAD};
pub use lifecycle::LifecycleRecord;
pub use quarantine::Quarantine;
pub use raw::{RawAllocator, SystemAllocator};
pub use report::LeakRecord;
pub use stats::Statistics;
pub use tracker::Tracker;
