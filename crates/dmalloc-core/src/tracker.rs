//! The tracking context.
//!
//! A [`Tracker`] owns one raw allocator plus the registry, statistics and
//! lifecycle log guarded together by a single `parking_lot::Mutex`. The lock
//! is held for the whole of every operation, so counters and registry never
//! disagree. Independent trackers are independent heaps.

use std::io::{self, Write};
use std::process;
use std::ptr::{self, NonNull};

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::callsite::CallSite;
use crate::config::{TrackerConfig, ViolationPolicy};
use crate::error::{AllocError, BugKind, MemoryBug, ReallocError};
use crate::layout::{self, AllocationHeader};
use crate::lifecycle::{Event, LifecycleLog, LifecycleRecord};
use crate::quarantine::Quarantine;
use crate::raw::{RawAllocator, SystemAllocator};
use crate::registry::Registry;
use crate::report::{self, LeakRecord};
use crate::stats::Statistics;
use crate::validate::{ValidatedBlock, validate_free};

/// Debugging allocator front end.
#[derive(Debug)]
pub struct Tracker<A: RawAllocator = SystemAllocator> {
    allocator: A,
    config: TrackerConfig,
    state: Mutex<TrackerState>,
}

#[derive(Debug)]
struct TrackerState {
    stats: Statistics,
    registry: Registry,
    released: Quarantine,
    log: LifecycleLog,
}

impl Tracker<SystemAllocator> {
    /// Tracker over the C heap, configured from the environment.
    #[must_use]
    pub fn new() -> Self {
        Self::with_allocator(SystemAllocator)
    }
}

impl Default for Tracker<SystemAllocator> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: RawAllocator> Tracker<A> {
    /// Tracker over `allocator`, configured from the environment.
    #[must_use]
    pub fn with_allocator(allocator: A) -> Self {
        Self::with_config(allocator, TrackerConfig::from_env())
    }

    #[must_use]
    pub fn with_config(allocator: A, config: TrackerConfig) -> Self {
        Self {
            allocator,
            config,
            state: Mutex::new(TrackerState {
                stats: Statistics::new(),
                registry: Registry::new(),
                released: Quarantine::new(),
                log: LifecycleLog::new(config.log_capacity),
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Allocate `size` bytes. The payload is uninitialized.
    pub fn allocate(&self, size: usize, site: CallSite) -> Result<NonNull<u8>, AllocError> {
        self.state
            .lock()
            .allocate(&self.allocator, size, site, "dmalloc")
    }

    /// Allocate `count * elem_size` zeroed bytes.
    pub fn allocate_zeroed(
        &self,
        count: usize,
        elem_size: usize,
        site: CallSite,
    ) -> Result<NonNull<u8>, AllocError> {
        let mut state = self.state.lock();
        let Some(size) = layout::array_size(count, elem_size) else {
            let err = AllocError::CountOverflow { count, elem_size };
            return Err(state.fail(err, "dcalloc", &site));
        };
        let payload = state.allocate(&self.allocator, size, site, "dcalloc")?;
        // SAFETY: the payload was just allocated with `size` bytes.
        unsafe { ptr::write_bytes(payload.as_ptr(), 0, size) };
        Ok(payload)
    }

    /// Release a payload after validating it. Null is a no-op.
    ///
    /// A pointer that fails validation is a [`MemoryBug`]; what happens next
    /// depends on the configured [`ViolationPolicy`]. Only
    /// [`ViolationPolicy::Report`] returns `Err`, and then nothing was
    /// released.
    ///
    /// # Safety
    ///
    /// `ptr` must be null, or the `HEADER_SIZE` bytes before it must be
    /// readable whenever it falls inside this tracker's heap range. Every
    /// pointer this tracker returned qualifies. Recently freed ones are
    /// recognized without reading memory, so the raw allocator may unmap
    /// released blocks; older ones need their memory to stay mapped.
    pub unsafe fn free(&self, ptr: *mut u8, site: CallSite) -> Result<(), MemoryBug> {
        let Some(ptr) = NonNull::new(ptr) else {
            return Ok(());
        };
        let addr = ptr.as_ptr() as usize;
        let mut state = self.state.lock();
        // SAFETY: forwarded caller contract.
        match unsafe { state.validate(addr, &site, "dfree") } {
            Ok(block) => {
                // SAFETY: the block passed validation under this lock.
                unsafe { state.release(&self.allocator, block, &site, "dfree") };
                Ok(())
            }
            Err(kind) => {
                drop(state);
                Err(self.escalate(MemoryBug::new(kind, site, addr)))
            }
        }
    }

    /// Resize a payload, moving it to a new block.
    ///
    /// Null behaves like [`Tracker::allocate`]. The old block is validated
    /// first exactly as [`Tracker::free`] would; if the new block cannot be
    /// allocated the old one stays live and untouched.
    ///
    /// # Safety
    ///
    /// Same contract as [`Tracker::free`].
    pub unsafe fn reallocate(
        &self,
        ptr: *mut u8,
        new_size: usize,
        site: CallSite,
    ) -> Result<NonNull<u8>, ReallocError> {
        let Some(old) = NonNull::new(ptr) else {
            return Ok(self
                .state
                .lock()
                .allocate(&self.allocator, new_size, site, "drealloc")?);
        };
        let addr = old.as_ptr() as usize;
        let mut state = self.state.lock();
        // SAFETY: forwarded caller contract.
        let block = match unsafe { state.validate(addr, &site, "drealloc") } {
            Ok(block) => block,
            Err(kind) => {
                drop(state);
                return Err(self.escalate(MemoryBug::new(kind, site, addr)).into());
            }
        };
        let fresh = state.allocate(&self.allocator, new_size, site.clone(), "drealloc")?;
        // SAFETY: both payloads are live, distinct blocks and each holds at
        // least the copied length.
        unsafe {
            ptr::copy_nonoverlapping(old.as_ptr(), fresh.as_ptr(), block.size.min(new_size));
            state.release(&self.allocator, block, &site, "drealloc");
        }
        Ok(fresh)
    }

    /// Copy of the current statistics.
    #[must_use]
    pub fn statistics(&self) -> Statistics {
        self.state.lock().stats
    }

    /// Fill `out` with the current statistics.
    pub fn snapshot_statistics(&self, out: &mut Statistics) {
        *out = self.statistics();
    }

    /// Live allocations in ascending address order.
    #[must_use]
    pub fn leaks(&self) -> Vec<LeakRecord> {
        let state = self.state.lock();
        if state.registry.is_empty() {
            return Vec::new();
        }
        state
            .registry
            .iter()
            .filter_map(|(addr, site)| {
                let header_addr = layout::header_of(addr)?;
                // SAFETY: registered payloads are live blocks written by
                // init_block, so their headers are readable.
                let header = unsafe { AllocationHeader::read(header_addr) };
                Some(LeakRecord {
                    site: site.clone(),
                    addr,
                    size: header.size,
                })
            })
            .collect()
    }

    /// Number of live allocations.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.state.lock().registry.len()
    }

    /// True if `ptr` is a live payload of this tracker.
    #[must_use]
    pub fn is_live(&self, ptr: *const u8) -> bool {
        self.state.lock().registry.contains(ptr as usize)
    }

    /// Take every retained lifecycle record, oldest first.
    pub fn drain_lifecycle_log(&self) -> Vec<LifecycleRecord> {
        self.state.lock().log.drain()
    }

    pub fn write_statistics<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        self.statistics().write_summary(out)
    }

    /// Two-line statistics summary on stdout.
    pub fn print_statistics(&self) -> io::Result<()> {
        self.write_statistics(&mut io::stdout().lock())
    }

    pub fn write_leak_report<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<()> {
        report::write_leak_report(&self.leaks(), out)
    }

    /// One line per live allocation on stdout; nothing when there are none.
    pub fn print_leak_report(&self) -> io::Result<()> {
        self.write_leak_report(&mut io::stdout().lock())
    }

    /// Apply the violation policy. Returns only under
    /// [`ViolationPolicy::Report`].
    fn escalate(&self, bug: MemoryBug) -> MemoryBug {
        debug!(
            kind = bug.kind().as_str(),
            addr = bug.addr(),
            site = %bug.site(),
            policy = ?self.config.policy,
            "memory bug"
        );
        match self.config.policy {
            ViolationPolicy::Abort => {
                eprintln!("{bug}");
                process::abort()
            }
            ViolationPolicy::Panic => panic!("{bug}"),
            ViolationPolicy::Report => bug,
        }
    }
}

impl TrackerState {
    fn allocate<A: RawAllocator>(
        &mut self,
        allocator: &A,
        size: usize,
        site: CallSite,
        symbol: &'static str,
    ) -> Result<NonNull<u8>, AllocError> {
        let Some(total) = layout::block_size(size) else {
            return Err(self.fail(AllocError::SizeOverflow { size }, symbol, &site));
        };
        let Some(block) = allocator.acquire(total) else {
            return Err(self.fail(AllocError::OutOfMemory { size }, symbol, &site));
        };

        let start = block.as_ptr() as usize;
        // SAFETY: the raw allocator returned `total` writable bytes.
        let payload = unsafe { layout::init_block(block, size) };
        let addr = payload.as_ptr() as usize;
        let end = layout::block_end(start, size).unwrap_or(usize::MAX);
        self.stats.record_alloc(size, start, end);

        trace!(symbol, addr, size, site = %site, "alloc");
        self.released.forget(addr);
        self.log.record(
            Event {
                symbol,
                event: "alloc",
                ptr: Some(addr),
                size: Some(size),
                outcome: "ok",
                site: &site,
            },
            &self.stats,
        );
        self.registry.insert(addr, site);
        Ok(payload)
    }

    fn fail(&mut self, err: AllocError, symbol: &'static str, site: &CallSite) -> AllocError {
        self.stats.record_failure(err.failed_bytes());
        warn!(symbol, site = %site, "{err}");
        self.log.record(
            Event {
                symbol,
                event: "alloc_failed",
                ptr: None,
                size: err.failed_bytes(),
                outcome: "declined",
                site,
            },
            &self.stats,
        );
        err
    }

    /// # Safety
    ///
    /// See [`validate_free`].
    unsafe fn validate(
        &mut self,
        addr: usize,
        site: &CallSite,
        symbol: &'static str,
    ) -> Result<ValidatedBlock, BugKind> {
        // SAFETY: forwarded caller contract.
        let result = unsafe { validate_free(addr, &self.stats, &self.registry, &self.released) };
        if let Err(kind) = result {
            self.log.record(
                Event {
                    symbol,
                    event: "memory_bug",
                    ptr: Some(addr),
                    size: None,
                    outcome: kind.as_str(),
                    site,
                },
                &self.stats,
            );
        }
        result
    }

    /// # Safety
    ///
    /// `block` must have just passed [`TrackerState::validate`] on this state.
    unsafe fn release<A: RawAllocator>(
        &mut self,
        allocator: &A,
        block: ValidatedBlock,
        site: &CallSite,
        symbol: &'static str,
    ) {
        // SAFETY: a validated block is live and its header readable and
        // writable. The flag is set before the memory goes back because the
        // header is not ours afterwards.
        unsafe {
            layout::mark_freed(block.header_addr);
            allocator.release(NonNull::new_unchecked(block.header_addr as *mut u8));
        }
        self.stats.record_free(block.size);
        self.registry.remove(block.payload_addr);
        let block_bytes = layout::block_size(block.size).unwrap_or(usize::MAX);
        self.released.push(block.payload_addr, block_bytes);

        trace!(symbol, addr = block.payload_addr, size = block.size, site = %site, "free");
        self.log.record(
            Event {
                symbol,
                event: "free",
                ptr: Some(block.payload_addr),
                size: Some(block.size),
                outcome: "ok",
                site,
            },
            &self.stats,
        );
    }
}
