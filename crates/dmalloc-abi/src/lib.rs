// All extern "C" exports accept raw pointers from C callers and validate them
// at runtime, so per-function safety docs would repeat the same contract.
#![allow(clippy::missing_safety_doc)]
//! # dmalloc-abi
//!
//! C-callable boundary for the dmalloc tracker.
//!
//! ```text
//! C caller -> ABI entry (this crate) -> process-wide Tracker -> libc malloc/free
//! ```
//!
//! `include/dmalloc.h` declares the exports and wraps them in macros that
//! pass `__FILE__` / `__LINE__`. Behavior on a detected memory bug follows
//! `DMALLOC_ON_BUG`; under `report` the offending call returns without
//! touching the block.

pub mod malloc_abi;
mod state;
mod util;

pub use malloc_abi::{
    dcalloc, dfree, dmalloc, dmalloc_stats, drealloc, get_statistics, print_leak_report,
    print_statistics,
};
