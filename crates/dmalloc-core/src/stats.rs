//! Running allocation counters and observed heap bounds.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

/// Point-in-time allocation statistics.
///
/// Field order is part of the C interface (`dmalloc_stats`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(C)]
pub struct Statistics {
    /// Live allocations.
    pub active_count: u64,
    /// Allocations ever made.
    pub total_count: u64,
    /// Failed allocation requests.
    pub fail_count: u64,
    /// Payload bytes in live allocations.
    pub active_bytes: u64,
    /// Payload bytes ever allocated.
    pub total_bytes: u64,
    /// Payload bytes in failed requests.
    pub fail_bytes: u64,
    /// Lowest block address ever returned by the raw allocator.
    pub heap_min: u64,
    /// Highest block end address ever observed.
    pub heap_max: u64,
}

impl Statistics {
    /// Identity values: zero counters and an empty heap range.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active_count: 0,
            total_count: 0,
            fail_count: 0,
            active_bytes: 0,
            total_bytes: 0,
            fail_bytes: 0,
            heap_min: u64::MAX,
            heap_max: 0,
        }
    }

    /// True when `addr` lies within `[heap_min, heap_max]`.
    #[must_use]
    pub fn in_heap(&self, addr: usize) -> bool {
        let addr = addr as u64;
        self.heap_min <= addr && addr <= self.heap_max
    }

    pub(crate) fn record_alloc(&mut self, size: usize, block_start: usize, block_end: usize) {
        let size = size as u64;
        self.active_count += 1;
        self.total_count += 1;
        self.active_bytes = self.active_bytes.saturating_add(size);
        self.total_bytes = self.total_bytes.saturating_add(size);
        self.heap_min = self.heap_min.min(block_start as u64);
        self.heap_max = self.heap_max.max(block_end as u64);
    }

    pub(crate) fn record_free(&mut self, size: usize) {
        self.active_count = self.active_count.saturating_sub(1);
        self.active_bytes = self.active_bytes.saturating_sub(size as u64);
    }

    pub(crate) fn record_failure(&mut self, bytes: Option<usize>) {
        self.fail_count += 1;
        if let Some(bytes) = bytes {
            self.fail_bytes = self.fail_bytes.saturating_add(bytes as u64);
        }
    }

    /// Two-line human readable summary.
    pub fn write_summary<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        writeln!(
            out,
            "alloc count: active {:>10}   total {:>10}   fail {:>10}",
            self.active_count, self.total_count, self.fail_count
        )?;
        writeln!(
            out,
            "alloc size:  active {:>10}   total {:>10}   fail {:>10}",
            self.active_bytes, self.total_bytes, self.fail_bytes
        )
    }
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}
