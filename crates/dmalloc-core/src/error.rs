//! The two outcome tiers: recoverable allocation failures and fatal memory
//! bugs detected at free time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::callsite::CallSite;

/// A request the tracker could not satisfy. The caller may handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// Header and canary overhead pushed the request past `usize::MAX`.
    #[error("allocation of {size} bytes overflows with block overhead")]
    SizeOverflow { size: usize },
    /// `count * elem_size` does not fit in `usize`.
    #[error("zeroed allocation of {count} x {elem_size} bytes overflows")]
    CountOverflow { count: usize, elem_size: usize },
    /// The raw allocator declined the request.
    #[error("underlying allocator declined {size} bytes")]
    OutOfMemory { size: usize },
}

impl AllocError {
    /// Payload bytes charged to `fail_bytes` for this failure.
    #[must_use]
    pub const fn failed_bytes(&self) -> Option<usize> {
        match *self {
            Self::SizeOverflow { size } | Self::OutOfMemory { size } => Some(size),
            Self::CountOverflow { .. } => None,
        }
    }
}

/// Which free-time check rejected a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BugKind {
    /// Outside every address the raw allocator ever returned.
    NotInHeap,
    /// In the heap, but not the start of a payload.
    NotAllocated,
    /// The block was already released.
    DoubleFree,
    /// The canary after the payload was overwritten.
    WildWrite,
}

impl BugKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotInHeap => "not_in_heap",
            Self::NotAllocated => "not_allocated",
            Self::DoubleFree => "double_free",
            Self::WildWrite => "wild_write",
        }
    }
}

/// Heap metadata can no longer be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryBug {
    #[error("MEMORY BUG: {site}: invalid free of pointer {addr:#x}, not in heap")]
    NotInHeap { site: CallSite, addr: usize },
    #[error("MEMORY BUG: {site}: invalid free of pointer {addr:#x}, not allocated")]
    NotAllocated { site: CallSite, addr: usize },
    #[error("MEMORY BUG: {site}: invalid free of pointer {addr:#x}, double free")]
    DoubleFree { site: CallSite, addr: usize },
    #[error("MEMORY BUG: {site}: detected wild write during free of pointer {addr:#x}")]
    WildWrite { site: CallSite, addr: usize },
}

impl MemoryBug {
    #[must_use]
    pub fn new(kind: BugKind, site: CallSite, addr: usize) -> Self {
        match kind {
            BugKind::NotInHeap => Self::NotInHeap { site, addr },
            BugKind::NotAllocated => Self::NotAllocated { site, addr },
            BugKind::DoubleFree => Self::DoubleFree { site, addr },
            BugKind::WildWrite => Self::WildWrite { site, addr },
        }
    }

    #[must_use]
    pub fn kind(&self) -> BugKind {
        match self {
            Self::NotInHeap { .. } => BugKind::NotInHeap,
            Self::NotAllocated { .. } => BugKind::NotAllocated,
            Self::DoubleFree { .. } => BugKind::DoubleFree,
            Self::WildWrite { .. } => BugKind::WildWrite,
        }
    }

    #[must_use]
    pub fn site(&self) -> &CallSite {
        match self {
            Self::NotInHeap { site, .. }
            | Self::NotAllocated { site, .. }
            | Self::DoubleFree { site, .. }
            | Self::WildWrite { site, .. } => site,
        }
    }

    #[must_use]
    pub fn addr(&self) -> usize {
        match *self {
            Self::NotInHeap { addr, .. }
            | Self::NotAllocated { addr, .. }
            | Self::DoubleFree { addr, .. }
            | Self::WildWrite { addr, .. } => addr,
        }
    }
}

/// Failure of [`Tracker::reallocate`](crate::Tracker::reallocate).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReallocError {
    #[error(transparent)]
    Alloc(#[from] AllocError),
    #[error(transparent)]
    Bug(#[from] MemoryBug),
}
