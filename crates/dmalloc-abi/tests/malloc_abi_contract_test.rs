//! Contract tests for the C entry points. They share one process-wide
//! tracker, so every test holds TEST_LOCK and asserts on deltas.

use std::ffi::{c_char, c_void};
use std::ptr;
use std::sync::Mutex;

use dmalloc_abi::{dcalloc, dfree, dmalloc, dmalloc_stats, drealloc, get_statistics};
use dmalloc_core::Statistics;

static TEST_LOCK: Mutex<()> = Mutex::new(());

fn file() -> *const c_char {
    c"abi_test.c".as_ptr()
}

fn snapshot() -> dmalloc_stats {
    let mut stats = Statistics::new();
    // SAFETY: stats is a valid, writable record.
    unsafe { get_statistics(&mut stats) };
    stats
}

#[test]
fn malloc_free_round_trip_updates_counters() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let before = snapshot();

    // SAFETY: valid C string literal.
    let p = unsafe { dmalloc(100, file(), 10) };
    assert!(!p.is_null());
    let during = snapshot();
    assert_eq!(during.active_count, before.active_count + 1);
    assert_eq!(during.active_bytes, before.active_bytes + 100);
    assert!(during.heap_min < p as u64 && (p as u64) < during.heap_max);

    // SAFETY: p came from dmalloc and is live.
    unsafe { dfree(p, file(), 11) };
    let after = snapshot();
    assert_eq!(after.active_count, before.active_count);
    assert_eq!(after.active_bytes, before.active_bytes);
    assert_eq!(after.total_count, before.total_count + 1);
}

#[test]
fn dfree_null_is_ignored() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let before = snapshot();
    // SAFETY: null pointer and null file are both accepted.
    unsafe { dfree(ptr::null_mut(), ptr::null(), 0) };
    assert_eq!(snapshot(), before);
}

#[test]
fn dcalloc_zeroes_and_rejects_overflow() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let before = snapshot();

    // SAFETY: valid C string literal.
    let p = unsafe { dcalloc(16, 4, file(), 20) };
    assert!(!p.is_null());
    // SAFETY: payload spans 64 bytes.
    let bytes = unsafe { std::slice::from_raw_parts(p.cast::<u8>(), 64) };
    assert!(bytes.iter().all(|&b| b == 0));

    // SAFETY: valid C string literal.
    let overflow = unsafe { dcalloc(usize::MAX, 2, file(), 21) };
    assert!(overflow.is_null());
    let mid = snapshot();
    assert_eq!(mid.fail_count, before.fail_count + 1);
    assert_eq!(mid.fail_bytes, before.fail_bytes);

    // SAFETY: p is live.
    unsafe { dfree(p, file(), 22) };
}

#[test]
fn dmalloc_overflow_returns_null() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let before = snapshot();
    // SAFETY: valid C string literal.
    let p = unsafe { dmalloc(usize::MAX - 4, file(), 30) };
    assert!(p.is_null());
    let after = snapshot();
    assert_eq!(after.fail_count, before.fail_count + 1);
    assert_eq!(after.active_count, before.active_count);
}

#[test]
fn drealloc_moves_contents() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let before = snapshot();

    // SAFETY: null ptr acts as dmalloc.
    let p = unsafe { drealloc(ptr::null_mut(), 4, file(), 40) };
    assert!(!p.is_null());
    // SAFETY: p spans 4 bytes; q spans 16.
    unsafe {
        ptr::copy_nonoverlapping(b"abcd".as_ptr(), p.cast::<u8>(), 4);
        let q: *mut c_void = drealloc(p, 16, file(), 41);
        assert!(!q.is_null());
        assert_eq!(std::slice::from_raw_parts(q.cast::<u8>(), 4), b"abcd");
        let mid = snapshot();
        assert_eq!(mid.active_count, before.active_count + 1);
        assert_eq!(mid.active_bytes, before.active_bytes + 16);
        dfree(q, file(), 42);
    }
    assert_eq!(snapshot().active_count, before.active_count);
}

#[test]
fn get_statistics_ignores_null() {
    let _guard = TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    // SAFETY: null is accepted.
    unsafe { get_statistics(ptr::null_mut()) };
}

#[test]
fn stats_record_has_c_layout() {
    assert_eq!(std::mem::size_of::<dmalloc_stats>(), 8 * 8);
    assert_eq!(std::mem::offset_of!(dmalloc_stats, heap_min), 6 * 8);
}
