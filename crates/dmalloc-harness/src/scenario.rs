//! Named allocation scenarios.
//!
//! Each scenario drives a tracker through one path. The bug scenarios end in
//! a [`MemoryBug`](dmalloc_core::MemoryBug), which under the default policy
//! aborts the process.

use std::ptr;

use clap::ValueEnum;
use dmalloc_core::{AllocError, Tracker, callsite, dcalloc, dfree, dmalloc};

use crate::report::HarnessError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Allocate and free one block.
    Basic,
    /// Allocate three blocks and free one.
    Leak,
    /// Zeroed allocation over dirtied memory.
    Zeroed,
    /// Grow and shrink a block, checking its contents.
    Realloc,
    /// Request more than the system allocator will give.
    Fail,
    /// Requests whose size arithmetic overflows.
    Overflow,
    /// Free the same block twice.
    DoubleFree,
    /// Free a pointer that never came from the tracker.
    InvalidFree,
    /// Free a pointer into the middle of a block.
    InteriorFree,
    /// Write one byte past a block, then free it.
    WildWrite,
}

impl Scenario {
    pub const ALL: [Self; 10] = [
        Self::Basic,
        Self::Leak,
        Self::Zeroed,
        Self::Realloc,
        Self::Fail,
        Self::Overflow,
        Self::DoubleFree,
        Self::InvalidFree,
        Self::InteriorFree,
        Self::WildWrite,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Leak => "leak",
            Self::Zeroed => "zeroed",
            Self::Realloc => "realloc",
            Self::Fail => "fail",
            Self::Overflow => "overflow",
            Self::DoubleFree => "double-free",
            Self::InvalidFree => "invalid-free",
            Self::InteriorFree => "interior-free",
            Self::WildWrite => "wild-write",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Basic => "allocate 100 bytes and free them",
            Self::Leak => "allocate three blocks, free the middle one",
            Self::Zeroed => "dcalloc over a freshly dirtied heap",
            Self::Realloc => "grow then shrink a block, keeping its prefix",
            Self::Fail => "request more memory than the system will give",
            Self::Overflow => "size and count arithmetic overflow",
            Self::DoubleFree => "free a block twice",
            Self::InvalidFree => "free a stack address",
            Self::InteriorFree => "free a pointer one byte into a block",
            Self::WildWrite => "overrun a block by one byte, then free it",
        }
    }

    /// True when the scenario ends in a memory bug.
    #[must_use]
    pub const fn is_bug(self) -> bool {
        matches!(
            self,
            Self::DoubleFree | Self::InvalidFree | Self::InteriorFree | Self::WildWrite
        )
    }

    /// Run against `tracker`. Returns the recoverable errors provoked on
    /// purpose.
    pub fn run(self, tracker: &Tracker) -> Result<Vec<String>, HarnessError> {
        let mut recovered = Vec::new();
        match self {
            Self::Basic => {
                let p = dmalloc!(tracker, 100)?;
                // SAFETY: p is live.
                unsafe { dfree!(tracker, p.as_ptr()) }?;
            }
            Self::Leak => {
                let _a = dmalloc!(tracker, 10)?;
                let b = dmalloc!(tracker, 20)?;
                let _c = dmalloc!(tracker, 30)?;
                // SAFETY: b is live.
                unsafe { dfree!(tracker, b.as_ptr()) }?;
            }
            Self::Zeroed => {
                let dirty = dmalloc!(tracker, 256)?;
                // SAFETY: dirty spans 256 bytes and is live until freed here.
                unsafe {
                    ptr::write_bytes(dirty.as_ptr(), 0xA5, 256);
                    dfree!(tracker, dirty.as_ptr())?;
                }
                let p = dcalloc!(tracker, 64, 4)?;
                // SAFETY: p spans 64 * 4 initialized bytes.
                let bytes = unsafe { std::slice::from_raw_parts(p.as_ptr(), 256) };
                if let Some(pos) = bytes.iter().position(|&b| b != 0) {
                    return Err(HarnessError::Contents(format!(
                        "dcalloc byte {pos} is {:#x}",
                        bytes[pos]
                    )));
                }
                // SAFETY: p is live and bytes is not used past here.
                unsafe { dfree!(tracker, p.as_ptr()) }?;
            }
            Self::Realloc => {
                let p = dmalloc!(tracker, 8)?;
                // SAFETY: p spans 8 writable bytes.
                unsafe { ptr::copy_nonoverlapping(b"dmalloc!".as_ptr(), p.as_ptr(), 8) };
                // SAFETY: p is live and was returned by this tracker.
                let grown = unsafe { tracker.reallocate(p.as_ptr(), 64, callsite!()) }?;
                // SAFETY: grown replaced p and is live.
                let shrunk = unsafe { tracker.reallocate(grown.as_ptr(), 4, callsite!()) }?;
                // SAFETY: shrunk spans 4 bytes copied from grown.
                let prefix = unsafe { std::slice::from_raw_parts(shrunk.as_ptr(), 4) };
                if prefix != b"dmal" {
                    return Err(HarnessError::Contents(format!(
                        "realloc prefix is {prefix:?}"
                    )));
                }
                // SAFETY: shrunk is live and prefix is not used past here.
                unsafe { dfree!(tracker, shrunk.as_ptr()) }?;
            }
            Self::Fail => {
                expect_failure(dmalloc!(tracker, usize::MAX / 2), &mut recovered)?;
                expect_failure(dcalloc!(tracker, usize::MAX / 8, 4), &mut recovered)?;
            }
            Self::Overflow => {
                expect_failure(dmalloc!(tracker, usize::MAX), &mut recovered)?;
                expect_failure(dcalloc!(tracker, usize::MAX, 2), &mut recovered)?;
            }
            Self::DoubleFree => {
                let p = dmalloc!(tracker, 32)?;
                // SAFETY: the second free is caught by the released set
                // before any header is read.
                unsafe {
                    dfree!(tracker, p.as_ptr())?;
                    dfree!(tracker, p.as_ptr())?;
                }
            }
            Self::InvalidFree => {
                let _p = dmalloc!(tracker, 16)?;
                let mut local = 0_u64;
                let stack = ptr::addr_of_mut!(local).cast::<u8>();
                // SAFETY: stack is outside the heap range, so nothing is read
                // or released through it.
                unsafe { dfree!(tracker, stack) }?;
            }
            Self::InteriorFree => {
                let p = dmalloc!(tracker, 64)?;
                // SAFETY: p + 1 is inside p's payload, and the header bytes
                // before it belong to the same block.
                unsafe { dfree!(tracker, p.as_ptr().add(1)) }?;
            }
            Self::WildWrite => {
                let p = dmalloc!(tracker, 16)?;
                // SAFETY: the canary byte belongs to the same block.
                unsafe {
                    p.as_ptr().add(16).write(0);
                    dfree!(tracker, p.as_ptr())?;
                }
            }
        }
        Ok(recovered)
    }
}

fn expect_failure<T>(
    result: Result<T, AllocError>,
    recovered: &mut Vec<String>,
) -> Result<(), HarnessError> {
    match result {
        Ok(_) => Err(HarnessError::Contents(
            "oversized request unexpectedly succeeded".to_string(),
        )),
        Err(err) => {
            recovered.push(err.to_string());
            Ok(())
        }
    }
}
