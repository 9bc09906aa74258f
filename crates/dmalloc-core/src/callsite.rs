//! Source locations attached to allocations.

use std::borrow::Cow;
use std::fmt;
use std::panic::Location;

use serde::{Deserialize, Serialize};

/// File and line of the expression that requested an allocation or free.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallSite {
    pub file: Cow<'static, str>,
    pub line: u32,
}

impl CallSite {
    #[must_use]
    pub const fn new(file: &'static str, line: u32) -> Self {
        Self {
            file: Cow::Borrowed(file),
            line,
        }
    }

    /// Call site whose file name is only known at runtime (e.g. from C).
    #[must_use]
    pub fn owned(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: Cow::Owned(file.into()),
            line,
        }
    }

    /// Location of the caller of the function this is invoked from.
    #[must_use]
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self::new(location.file(), location.line())
    }

    #[must_use]
    pub const fn unknown() -> Self {
        Self::new("?", 0)
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// The current `file!()` / `line!()` as a [`CallSite`].
#[macro_export]
macro_rules! callsite {
    () => {
        $crate::CallSite::new(file!(), line!())
    };
}

/// `tracker.allocate(size, callsite!())`.
#[macro_export]
macro_rules! dmalloc {
    ($tracker:expr, $size:expr) => {
        $tracker.allocate($size, $crate::callsite!())
    };
}

/// `tracker.allocate_zeroed(count, elem_size, callsite!())`.
#[macro_export]
macro_rules! dcalloc {
    ($tracker:expr, $count:expr, $elem_size:expr) => {
        $tracker.allocate_zeroed($count, $elem_size, $crate::callsite!())
    };
}

/// `tracker.free(ptr, callsite!())`. Expands to an unsafe call; the caller
/// upholds the contract of [`Tracker::free`](crate::Tracker::free).
#[macro_export]
macro_rules! dfree {
    ($tracker:expr, $ptr:expr) => {
        $tracker.free($ptr, $crate::callsite!())
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_captures_this_file() {
        let site = CallSite::caller();
        assert!(site.file.ends_with("callsite.rs"));
        assert!(site.line > 0);
    }

    #[test]
    fn macro_matches_line() {
        let line = line!() + 1;
        let site = crate::callsite!();
        assert_eq!(site.line, line);
    }

    #[test]
    fn display_is_file_colon_line() {
        assert_eq!(CallSite::new("test.c", 10).to_string(), "test.c:10");
        assert_eq!(CallSite::owned("gen.c", 3).to_string(), "gen.c:3");
        assert_eq!(CallSite::unknown().to_string(), "?:0");
    }
}
