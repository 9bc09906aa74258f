//! Structured allocator lifecycle records.
//!
//! Every allocate, free, failure and detected bug appends one record to a
//! bounded in-memory log. Callers drain it when they want to inspect or
//! persist what happened.

use std::collections::VecDeque;

use serde::Serialize;

use crate::callsite::CallSite;
use crate::stats::Statistics;

/// One lifecycle event together with the counters right after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleRecord {
    /// Monotonic id, unique per tracker.
    pub decision_id: u64,
    /// API symbol (`dmalloc`, `dfree`, `dcalloc`, `drealloc`).
    pub symbol: &'static str,
    /// Event kind (`alloc`, `free`, `alloc_failed`, `memory_bug`).
    pub event: &'static str,
    pub ptr: Option<usize>,
    pub size: Option<usize>,
    /// Machine-readable outcome label.
    pub outcome: &'static str,
    pub site: CallSite,
    pub active_count: u64,
    pub active_bytes: u64,
}

/// What to record; counters are filled in from the statistics.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Event<'a> {
    pub symbol: &'static str,
    pub event: &'static str,
    pub ptr: Option<usize>,
    pub size: Option<usize>,
    pub outcome: &'static str,
    pub site: &'a CallSite,
}

#[derive(Debug)]
pub(crate) struct LifecycleLog {
    records: VecDeque<LifecycleRecord>,
    capacity: usize,
    next_decision_id: u64,
}

impl LifecycleLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(64)),
            capacity,
            next_decision_id: 1,
        }
    }

    pub fn record(&mut self, event: Event<'_>, stats: &Statistics) {
        let decision_id = self.next_decision_id;
        self.next_decision_id = self.next_decision_id.wrapping_add(1);
        if self.capacity == 0 {
            return;
        }
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(LifecycleRecord {
            decision_id,
            symbol: event.symbol,
            event: event.event,
            ptr: event.ptr,
            size: event.size,
            outcome: event.outcome,
            site: event.site.clone(),
            active_count: stats.active_count,
            active_bytes: stats.active_bytes,
        });
    }

    pub fn drain(&mut self) -> Vec<LifecycleRecord> {
        self.records.drain(..).collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(site: &CallSite) -> Event<'_> {
        Event {
            symbol: "dmalloc",
            event: "alloc",
            ptr: Some(0x1000),
            size: Some(8),
            outcome: "ok",
            site,
        }
    }

    #[test]
    fn drops_oldest_when_full() {
        let site = CallSite::new("a.c", 1);
        let stats = Statistics::new();
        let mut log = LifecycleLog::new(2);
        for _ in 0..3 {
            log.record(event(&site), &stats);
        }
        assert_eq!(log.len(), 2);
        let ids: Vec<u64> = log.drain().iter().map(|r| r.decision_id).collect();
        assert_eq!(ids, [2, 3]);
        assert_eq!(log.len(), 0);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let site = CallSite::new("a.c", 1);
        let mut log = LifecycleLog::new(0);
        log.record(event(&site), &Statistics::new());
        assert!(log.drain().is_empty());
    }

    #[test]
    fn record_serializes() {
        let site = CallSite::new("a.c", 7);
        let mut log = LifecycleLog::new(4);
        log.record(event(&site), &Statistics::new());
        let json = serde_json::to_value(&log.drain()[0]).unwrap();
        assert_eq!(json["symbol"], "dmalloc");
        assert_eq!(json["site"]["file"], "a.c");
        assert_eq!(json["site"]["line"], 7);
    }
}
