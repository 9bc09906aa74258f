//! ABI layer for the tracked allocation functions.
//!
//! Every entry converts its C call-site arguments, forwards to the
//! process-wide tracker and maps recoverable failures to null. Memory bugs
//! never come back as values: the tracker aborts (or panics) first unless the
//! policy is `report`, in which case the call is dropped after logging.

use std::ffi::{c_char, c_long, c_void};
use std::ptr;

use dmalloc_core::Statistics;

use crate::state::tracker;
use crate::util::call_site;

/// C name of the statistics record. Layout matches [`Statistics`].
#[allow(non_camel_case_types)]
pub type dmalloc_stats = Statistics;

/// Allocate `sz` bytes, recording `file:line`. Null on failure.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dmalloc(sz: usize, file: *const c_char, line: c_long) -> *mut c_void {
    // SAFETY: file is a C string or null per the C contract.
    let site = unsafe { call_site(file, line) };
    match tracker().allocate(sz, site) {
        Ok(p) => p.as_ptr().cast(),
        Err(_) => ptr::null_mut(),
    }
}

/// Free a pointer returned by `dmalloc`, `dcalloc` or `drealloc`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dfree(ptr: *mut c_void, file: *const c_char, line: c_long) {
    // SAFETY: file is a C string or null per the C contract.
    let site = unsafe { call_site(file, line) };
    // SAFETY: the tracker validates ptr before touching the block.
    if let Err(bug) = unsafe { tracker().free(ptr.cast(), site) } {
        tracing::debug!(kind = bug.kind().as_str(), "dfree dropped after memory bug");
    }
}

/// Allocate `nmemb * sz` zeroed bytes. Null on failure or overflow.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dcalloc(
    nmemb: usize,
    sz: usize,
    file: *const c_char,
    line: c_long,
) -> *mut c_void {
    // SAFETY: file is a C string or null per the C contract.
    let site = unsafe { call_site(file, line) };
    match tracker().allocate_zeroed(nmemb, sz, site) {
        Ok(p) => p.as_ptr().cast(),
        Err(_) => ptr::null_mut(),
    }
}

/// Resize a tracked block. Null on failure, leaving `ptr` valid.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn drealloc(
    ptr: *mut c_void,
    sz: usize,
    file: *const c_char,
    line: c_long,
) -> *mut c_void {
    // SAFETY: file is a C string or null per the C contract.
    let site = unsafe { call_site(file, line) };
    // SAFETY: the tracker validates ptr before touching the block.
    match unsafe { tracker().reallocate(ptr.cast(), sz, site) } {
        Ok(p) => p.as_ptr().cast(),
        Err(_) => ptr::null_mut(),
    }
}

/// Copy the current statistics into `stats`. Null is ignored.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn get_statistics(stats: *mut dmalloc_stats) {
    // SAFETY: non-null stats points to writable storage per the C contract.
    if let Some(out) = unsafe { stats.as_mut() } {
        tracker().snapshot_statistics(out);
    }
}

/// Print the two-line statistics summary to stdout.
#[unsafe(no_mangle)]
pub extern "C" fn print_statistics() {
    if let Err(err) = tracker().print_statistics() {
        tracing::warn!(%err, "print_statistics failed");
    }
}

/// Print one `LEAK CHECK` line per live allocation to stdout.
#[unsafe(no_mangle)]
pub extern "C" fn print_leak_report() {
    if let Err(err) = tracker().print_leak_report() {
        tracing::warn!(%err, "print_leak_report failed");
    }
}
