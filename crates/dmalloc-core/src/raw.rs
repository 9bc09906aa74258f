//! Underlying allocator primitives.
//!
//! The tracker never manages memory itself: it asks a [`RawAllocator`] for
//! whole blocks and hands them back on release.

use std::ptr::NonNull;

/// Opaque acquire/release primitives the tracker delegates to.
pub trait RawAllocator {
    /// Acquire `bytes` bytes, or `None` if the request is declined.
    fn acquire(&self, bytes: usize) -> Option<NonNull<u8>>;

    /// Return a block to the allocator.
    ///
    /// # Safety
    ///
    /// `block` must have been returned by [`RawAllocator::acquire`] on this
    /// allocator and not released since.
    unsafe fn release(&self, block: NonNull<u8>);
}

impl<A: RawAllocator + ?Sized> RawAllocator for &A {
    fn acquire(&self, bytes: usize) -> Option<NonNull<u8>> {
        (**self).acquire(bytes)
    }

    unsafe fn release(&self, block: NonNull<u8>) {
        // SAFETY: forwarded caller contract.
        unsafe { (**self).release(block) }
    }
}

/// The C library heap (`malloc` / `free`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl RawAllocator for SystemAllocator {
    fn acquire(&self, bytes: usize) -> Option<NonNull<u8>> {
        // SAFETY: malloc accepts any size and reports failure with null.
        NonNull::new(unsafe { libc::malloc(bytes) }.cast::<u8>())
    }

    unsafe fn release(&self, block: NonNull<u8>) {
        // SAFETY: block came from libc::malloc per the caller's contract.
        unsafe { libc::free(block.as_ptr().cast()) }
    }
}
