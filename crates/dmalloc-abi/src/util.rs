//! Conversions from C call-site arguments.

use std::ffi::{CStr, c_char, c_long};

use dmalloc_core::CallSite;

/// Build a [`CallSite`] from a C file name and line.
///
/// A null `file` becomes `"?"`; a line outside `u32` becomes 0. Invalid
/// UTF-8 is replaced lossily.
///
/// # Safety
///
/// `file` must be null or point to a NUL-terminated string.
pub(crate) unsafe fn call_site(file: *const c_char, line: c_long) -> CallSite {
    let line = u32::try_from(line).unwrap_or(0);
    if file.is_null() {
        return CallSite {
            line,
            ..CallSite::unknown()
        };
    }
    // SAFETY: non-null and NUL-terminated per the caller's contract.
    let name = unsafe { CStr::from_ptr(file) }.to_string_lossy();
    CallSite::owned(name.into_owned(), line)
}
