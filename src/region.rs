//! Backing memory handles.
//!
//! A [`Region`] is a raw view of caller-owned bytes, typically an mmap'd
//! shared segment. [`HeapRegion`] owns a zeroed heap allocation and hands out
//! regions over it.

use std::alloc::{self, Layout};
use std::mem::{align_of, size_of};
use std::ptr::NonNull;

/// Alignment of [`HeapRegion`] allocations (one cache line).
pub const REGION_ALIGN: usize = 64;

/// A raw, copyable view of a byte region.
///
/// The region does not own its memory. Whoever built it with
/// [`Region::from_raw`] guarantees the memory stays valid for as long as the
/// region is used.
#[derive(Debug, Clone, Copy)]
pub struct Region {
    base: *mut u8,
    len: usize,
}

unsafe impl Send for Region {}
unsafe impl Sync for Region {}

impl Region {
    /// Builds a region over `len` bytes at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be valid for reads and writes of `len` bytes for as long
    /// as the region or any copy of it is used, and the memory must only be
    /// accessed through ring buffer operations while a ring uses it.
    pub unsafe fn from_raw(base: *mut u8, len: usize) -> Self {
        Self { base, len }
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the region has no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base address of the region.
    #[inline]
    pub fn as_ptr(&self) -> *mut u8 {
        self.base
    }

    /// Returns a pointer `offset` bytes into the region.
    ///
    /// # Safety
    ///
    /// `offset` must be within the region.
    #[inline]
    pub(crate) unsafe fn offset(&self, offset: usize) -> *mut u8 {
        debug_assert!(offset <= self.len, "offset {offset} outside region");
        unsafe { self.base.add(offset) }
    }

    /// Returns true if a `T` fits at `offset` with correct alignment.
    pub(crate) fn fits<T>(&self, offset: usize) -> bool {
        let addr = (self.base as usize).wrapping_add(offset);
        addr % align_of::<T>() == 0
            && offset
                .checked_add(size_of::<T>())
                .is_some_and(|end| end <= self.len)
    }

    /// Reinterprets the bytes at `offset` as a `T`.
    ///
    /// # Safety
    ///
    /// The bytes at `offset` must hold a valid, initialized `T`, suitably
    /// aligned, and must not be mutated non-atomically while the reference
    /// lives.
    #[inline]
    pub unsafe fn get<'a, T>(&self, offset: usize) -> &'a T {
        debug_assert!(self.fits::<T>(offset));
        unsafe { &*(self.offset(offset) as *const T) }
    }
}

/// An owned, zeroed, cache-line aligned heap allocation.
#[derive(Debug)]
pub struct HeapRegion {
    ptr: NonNull<u8>,
    layout: Layout,
}

unsafe impl Send for HeapRegion {}
unsafe impl Sync for HeapRegion {}

impl HeapRegion {
    /// Allocates `len` zeroed bytes.
    ///
    /// # Panics
    /// Panics if `len` is zero or too large for a valid layout, and aborts
    /// through the global allocation error handler on allocation failure.
    pub fn new_zeroed(len: usize) -> Self {
        assert!(len > 0, "region length must be non-zero");
        let layout = Layout::from_size_align(len, REGION_ALIGN).expect("invalid region layout");
        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout);
        };
        Self { ptr, layout }
    }

    /// Returns a region over the whole allocation.
    ///
    /// The region must not be used after this `HeapRegion` is dropped.
    pub fn region(&self) -> Region {
        // SAFETY: the allocation is live and `layout.size()` bytes long.
        unsafe { Region::from_raw(self.ptr.as_ptr(), self.layout.size()) }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.layout.size()
    }

    /// Always false; allocations are non-empty.
    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }
}

impl Drop for HeapRegion {
    fn drop(&mut self) {
        // SAFETY: allocated in `new_zeroed` with the same layout.
        unsafe { alloc::dealloc(self.ptr.as_ptr(), self.layout) };
    }
}
