#![no_main]
use dmalloc_core::{
    BugKind, CANARY_BYTE, CallSite, HEADER_SIZE, SystemAllocator, Tracker, TrackerConfig,
    ViolationPolicy,
};
use libfuzzer_sys::fuzz_target;

const SITE: CallSite = CallSite::new("fuzz_tracker.rs", 0);

fuzz_target!(|data: &[u8]| {
    // Each 4-byte chunk is one operation: op, size (u16 le), selector.
    let tracker = Tracker::with_config(
        SystemAllocator,
        TrackerConfig::default()
            .with_policy(ViolationPolicy::Report)
            .with_log_capacity(16),
    );
    let mut live: Vec<(*mut u8, usize)> = Vec::new();

    for chunk in data.chunks_exact(4) {
        let size = u16::from_le_bytes([chunk[1], chunk[2]]) as usize;
        let pick = chunk[3] as usize;

        match chunk[0] % 5 {
            0 => {
                if let Ok(p) = tracker.allocate(size, SITE) {
                    live.push((p.as_ptr(), size));
                }
            }
            1 if !live.is_empty() => {
                let (p, _) = live.swap_remove(pick % live.len());
                // SAFETY: p is live.
                unsafe { tracker.free(p, SITE) }.expect("live block frees");
            }
            2 if !live.is_empty() => {
                let idx = pick % live.len();
                let (p, _) = live[idx];
                // SAFETY: p is live.
                let q = unsafe { tracker.reallocate(p, size, SITE) }.expect("realloc");
                live[idx] = (q.as_ptr(), size);
            }
            3 if !live.is_empty() => {
                let (p, sz) = live[pick % live.len()];
                let offset = 1 + pick % HEADER_SIZE;
                if offset <= sz {
                    // SAFETY: the pointer stays inside the payload.
                    let err = unsafe { tracker.free(p.add(offset), SITE) }
                        .expect_err("interior pointer");
                    assert_eq!(err.kind(), BugKind::NotAllocated);
                }
            }
            4 if !live.is_empty() => {
                let idx = pick % live.len();
                let (p, sz) = live[idx];
                // SAFETY: the canary byte belongs to p's block.
                unsafe {
                    p.add(sz).write(!CANARY_BYTE);
                    let err = tracker.free(p, SITE).expect_err("smashed canary");
                    assert_eq!(err.kind(), BugKind::WildWrite);
                    p.add(sz).write(CANARY_BYTE);
                }
            }
            _ => {}
        }

        let stats = tracker.statistics();
        assert_eq!(stats.active_count, live.len() as u64);
        assert_eq!(
            stats.active_bytes,
            live.iter().map(|&(_, s)| s as u64).sum::<u64>()
        );
    }

    assert_eq!(tracker.leaks().len(), live.len());
    for (p, _) in live {
        // SAFETY: remaining blocks are live.
        unsafe { tracker.free(p, SITE) }.expect("cleanup");
    }
});
