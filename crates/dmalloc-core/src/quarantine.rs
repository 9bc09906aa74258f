//! Recently released payloads.
//!
//! The raw allocator may unmap a block as soon as it is released (the C heap
//! does this for large requests), so a second free cannot always read the
//! header. Released payload addresses are remembered here, oldest evicted
//! first, and matched before any memory is touched.

use std::collections::{HashMap, VecDeque};

/// Maximum quarantine size in block bytes.
pub const QUARANTINE_MAX_BYTES: usize = 64 * 1024 * 1024; // 64 MB

/// Maximum quarantine entry count.
pub const QUARANTINE_MAX_ENTRIES: usize = 65_536;

#[derive(Debug, Clone, Copy)]
struct Entry {
    seq: u64,
    block_bytes: usize,
}

/// Bounded set of released payload addresses.
#[derive(Debug)]
pub struct Quarantine {
    order: VecDeque<(usize, u64)>,
    members: HashMap<usize, Entry>,
    bytes: usize,
    max_entries: usize,
    max_bytes: usize,
    next_seq: u64,
}

impl Default for Quarantine {
    fn default() -> Self {
        Self::with_limits(QUARANTINE_MAX_ENTRIES, QUARANTINE_MAX_BYTES)
    }
}

impl Quarantine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_limits(max_entries: usize, max_bytes: usize) -> Self {
        Self {
            order: VecDeque::new(),
            members: HashMap::new(),
            bytes: 0,
            max_entries,
            max_bytes,
            next_seq: 0,
        }
    }

    /// Remember `payload`, whose whole block spans `block_bytes`.
    pub fn push(&mut self, payload: usize, block_bytes: usize) {
        self.forget(payload);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.push_back((payload, seq));
        self.members.insert(payload, Entry { seq, block_bytes });
        self.bytes = self.bytes.saturating_add(block_bytes);
        self.drain();
    }

    /// Drop `payload` because the raw allocator handed its address out again.
    pub fn forget(&mut self, payload: usize) {
        if let Some(entry) = self.members.remove(&payload) {
            self.bytes -= entry.block_bytes;
        }
    }

    #[must_use]
    pub fn contains(&self, payload: usize) -> bool {
        self.members.contains_key(&payload)
    }

    /// Evict oldest entries until both caps hold.
    fn drain(&mut self) {
        while self.members.len() > self.max_entries || self.bytes > self.max_bytes {
            let Some((payload, seq)) = self.order.pop_front() else {
                break;
            };
            // Entries forgotten (or re-pushed) since are stale.
            if self.members.get(&payload).is_some_and(|e| e.seq == seq) {
                self.forget(payload);
            }
        }
        // Stale entries only cost memory; bound them too.
        while self.order.len() > self.max_entries.saturating_mul(2) {
            let Some((payload, seq)) = self.order.pop_front() else {
                break;
            };
            if self.members.get(&payload).is_some_and(|e| e.seq == seq) {
                self.forget(payload);
            }
        }
    }
}
