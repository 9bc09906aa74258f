//! Block layout: metadata header, payload, boundary canary.
//!
//! Every tracked allocation is a single block obtained from the raw
//! allocator:
//!
//! ```text
//! +--------------------+ <- block start (header address)
//! | AllocationHeader   | HEADER_SIZE bytes
//! +--------------------+ <- payload address (returned to the caller)
//! | payload            | header.size bytes
//! +--------------------+
//! | canary             | CANARY_SIZE bytes
//! +--------------------+ <- block end
//! ```
//!
//! All offset arithmetic lives in this module. Nothing else re-derives where
//! the header or canary of a payload sits.

use std::mem;
use std::ptr::NonNull;

/// Sentinel written immediately after every payload.
pub const CANARY_BYTE: u8 = b'c';

/// Size of the trailing canary.
pub const CANARY_SIZE: usize = 1;

/// Size of the header prepended to every payload.
pub const HEADER_SIZE: usize = mem::size_of::<AllocationHeader>();

/// Header + canary bytes added to every request.
pub const OVERHEAD: usize = HEADER_SIZE + CANARY_SIZE;

const LIVE: usize = 0;
const FREED: usize = 1;

/// Metadata stored immediately before each payload.
///
/// Three machine words, no implicit padding. `freed` is a flag word rather
/// than a `bool` because validation reads headers that may have been
/// clobbered after release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct AllocationHeader {
    /// Requested payload size, excluding header and canary.
    pub size: usize,
    freed: usize,
    /// Address of this header, written at creation.
    pub self_reference: usize,
}

impl AllocationHeader {
    /// Header for a fresh block whose header lives at `header_addr`.
    #[must_use]
    pub const fn new(size: usize, header_addr: usize) -> Self {
        Self {
            size,
            freed: LIVE,
            self_reference: header_addr,
        }
    }

    #[must_use]
    pub const fn is_freed(&self) -> bool {
        self.freed != LIVE
    }

    pub fn mark_freed(&mut self) {
        self.freed = FREED;
    }

    /// True when this header claims to live at `header_addr`.
    #[must_use]
    pub const fn is_genuine(&self, header_addr: usize) -> bool {
        self.self_reference == header_addr
    }

    /// Read a header from an arbitrary address.
    ///
    /// # Safety
    ///
    /// `header_addr` must be valid for reads of `HEADER_SIZE` bytes. No
    /// alignment is required.
    #[must_use]
    pub unsafe fn read(header_addr: usize) -> Self {
        // SAFETY: readability is the caller's contract; read_unaligned has no
        // alignment requirement.
        unsafe { (header_addr as *const Self).read_unaligned() }
    }

    /// Store this header at `header_addr`.
    ///
    /// # Safety
    ///
    /// `header_addr` must be valid for writes of `HEADER_SIZE` bytes.
    pub unsafe fn write(self, header_addr: usize) {
        // SAFETY: writability is the caller's contract.
        unsafe { (header_addr as *mut Self).write_unaligned(self) }
    }
}

/// Total block size for a payload of `payload_size` bytes, or `None` when
/// the overhead would overflow `usize`.
#[must_use]
pub fn block_size(payload_size: usize) -> Option<usize> {
    payload_size.checked_add(HEADER_SIZE)?.checked_add(CANARY_SIZE)
}

/// Byte count of `count` elements of `elem_size` bytes, or `None` on overflow.
#[must_use]
pub fn array_size(count: usize, elem_size: usize) -> Option<usize> {
    count.checked_mul(elem_size)
}

/// Payload address for a header at `header_addr`.
#[must_use]
pub const fn payload_of(header_addr: usize) -> usize {
    header_addr + HEADER_SIZE
}

/// Header address for a payload, or `None` when it would lie below zero.
#[must_use]
pub fn header_of(payload_addr: usize) -> Option<usize> {
    payload_addr.checked_sub(HEADER_SIZE)
}

/// Canary address for a payload of `size` bytes.
#[must_use]
pub fn canary_of(payload_addr: usize, size: usize) -> Option<usize> {
    payload_addr.checked_add(size)
}

/// One past the last byte of the block whose header is at `header_addr`.
#[must_use]
pub fn block_end(header_addr: usize, size: usize) -> Option<usize> {
    header_addr.checked_add(block_size(size)?)
}

/// Write header and canary into a freshly acquired block and return the
/// payload pointer.
///
/// # Safety
///
/// `block` must be valid for writes of `block_size(size)` bytes.
pub unsafe fn init_block(block: NonNull<u8>, size: usize) -> NonNull<u8> {
    let header_addr = block.as_ptr() as usize;
    // SAFETY: the block spans header, payload and canary per the caller's
    // contract; every write below stays inside it.
    unsafe {
        AllocationHeader::new(size, header_addr).write(header_addr);
        let payload = block.add(HEADER_SIZE);
        payload.add(size).write(CANARY_BYTE);
        payload
    }
}

/// Flip the `freed` flag of the header at `header_addr`.
///
/// # Safety
///
/// `header_addr` must be valid for reads and writes of `HEADER_SIZE` bytes.
pub unsafe fn mark_freed(header_addr: usize) {
    // SAFETY: forwarded caller contract.
    unsafe {
        let mut header = AllocationHeader::read(header_addr);
        header.mark_freed();
        header.write(header_addr);
    }
}

/// Read the canary byte at `canary_addr`.
///
/// # Safety
///
/// `canary_addr` must be valid for a one byte read.
#[must_use]
pub unsafe fn read_canary(canary_addr: usize) -> u8 {
    // SAFETY: forwarded caller contract.
    unsafe { (canary_addr as *const u8).read() }
}
