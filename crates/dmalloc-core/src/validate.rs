//! Free-time validation.
//!
//! Checks run in a fixed order, cheapest and most fundamental first:
//!
//! 1. the address lies inside the observed heap range;
//! 2. the address was not released recently (checked without reading memory);
//! 3. the header before it names its own address;
//! 4. the block has not been freed already;
//! 5. the canary after the payload is intact.
//!
//! The first failing check decides the [`BugKind`]. Validation never
//! mutates anything.

use crate::error::BugKind;
use crate::layout::{self, AllocationHeader, CANARY_BYTE};
use crate::quarantine::Quarantine;
use crate::registry::Registry;
use crate::stats::Statistics;

/// A payload that passed every check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedBlock {
    pub header_addr: usize,
    pub payload_addr: usize,
    pub size: usize,
}

/// Run the validation sequence for `payload`.
///
/// # Safety
///
/// When `payload` lies in `stats`' heap range, at least one header above
/// `heap_min` and is not in `released`, the `HEADER_SIZE` bytes before it
/// must be readable; when those
/// bytes form a genuine header, the canary byte it describes must be readable
/// if it falls inside the heap range.
pub unsafe fn validate_free(
    payload: usize,
    stats: &Statistics,
    registry: &Registry,
    released: &Quarantine,
) -> Result<ValidatedBlock, BugKind> {
    if !stats.in_heap(payload) {
        return Err(BugKind::NotInHeap);
    }
    // Its block may already be unmapped.
    if released.contains(payload) {
        return Err(BugKind::DoubleFree);
    }

    let header_addr = layout::header_of(payload)
        .filter(|&addr| stats.in_heap(addr))
        .ok_or(BugKind::NotAllocated)?;
    // SAFETY: header_addr is in the heap range; readability is the caller's
    // contract.
    let header = unsafe { AllocationHeader::read(header_addr) };
    if !header.is_genuine(header_addr) {
        return Err(BugKind::NotAllocated);
    }

    // A genuine-looking header whose payload is no longer live was released
    // even if the allocator has since clobbered the flag word.
    if header.is_freed() || !registry.contains(payload) {
        return Err(BugKind::DoubleFree);
    }

    // A canary outside the heap means the size word itself was overwritten.
    let canary_addr = layout::canary_of(payload, header.size)
        .filter(|&addr| stats.in_heap(addr))
        .ok_or(BugKind::WildWrite)?;
    // SAFETY: live block, canary inside the heap range.
    if unsafe { layout::read_canary(canary_addr) } != CANARY_BYTE {
        return Err(BugKind::WildWrite);
    }

    Ok(ValidatedBlock {
        header_addr,
        payload_addr: payload,
        size: header.size,
    })
}
