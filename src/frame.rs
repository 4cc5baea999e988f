//! Record framing inside the backing region.
//!
//! ```text
//! position p (8-aligned)
//! +----------------------+---------------------------+---------+
//! | header (u64, atomic) | payload (len bytes)       | pad → 8 |
//! +----------------------+---------------------------+---------+
//! header: bits 0..32 len | bit 62 PUBLISHED | bit 63 CONSUMED
//! ```
//!
//! Positions are monotonically increasing; `p % capacity` is the offset. The
//! capacity is a multiple of 8, so a header never straddles the end of the
//! region. Payload bytes may, and continue at offset 0.

use std::ptr;
use std::sync::atomic::AtomicU64 as HeaderWord;

use crate::region::Region;

/// Size of the record header in bytes.
pub const HEADER_LEN: usize = 8;

/// Every record starts on a multiple of this.
pub const RECORD_ALIGN: usize = 8;

/// Smallest capacity a ring accepts: one header plus one aligned word.
pub const MIN_CAPACITY: u64 = 16;

pub(crate) const PUBLISHED: u64 = 1 << 62;
pub(crate) const CONSUMED: u64 = 1 << 63;
const LEN_MASK: u64 = u32::MAX as u64;

/// Total bytes a record of `payload_len` occupies in the ring.
#[inline]
pub const fn frame_len(payload_len: usize) -> usize {
    align_up(HEADER_LEN + payload_len, RECORD_ALIGN)
}

#[inline]
pub(crate) const fn align_up(value: usize, align: usize) -> usize {
    (value + (align - 1)) & !(align - 1)
}

#[inline]
pub(crate) fn encode_header(len: usize) -> u64 {
    debug_assert!(len as u64 <= LEN_MASK);
    PUBLISHED | len as u64
}

/// Extracts the payload length from a published header.
#[inline]
pub(crate) fn header_len(word: u64) -> Option<usize> {
    (word & PUBLISHED != 0).then_some((word & LEN_MASK) as usize)
}

/// Physical layout of a record within a region of `capacity` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    /// Offset of the header.
    pub header: usize,
    /// Offset of the first payload byte.
    pub payload: usize,
    /// Payload bytes before the end of the region.
    pub first: usize,
    /// Payload bytes continuing from offset 0.
    pub second: usize,
}

impl Span {
    pub(crate) fn new(capacity: u64, position: u64, len: usize) -> Self {
        let header = (position % capacity) as usize;
        let capacity = capacity as usize;
        debug_assert!(header + HEADER_LEN <= capacity);
        let payload = (header + HEADER_LEN) % capacity;
        let first = len.min(capacity - payload);
        Self {
            header,
            payload,
            first,
            second: len - first,
        }
    }

    #[inline]
    pub(crate) fn is_split(&self) -> bool {
        self.second > 0
    }
}

/// Returns the header word for the record at `offset`.
///
/// # Safety
///
/// `offset` must be 8-aligned and at most `region.len() - 8`, and the region
/// base must be 8-aligned.
#[inline]
pub(crate) unsafe fn header_at(region: &Region, offset: usize) -> &HeaderWord {
    unsafe { HeaderWord::from_ptr(region.offset(offset) as *mut u64) }
}

/// Copies `payload` into the region at `span`.
///
/// # Safety
///
/// The caller must hold the reservation covering `span`.
pub(crate) unsafe fn write_payload(region: &Region, span: Span, payload: &[u8]) {
    debug_assert_eq!(span.first + span.second, payload.len());
    unsafe {
        ptr::copy_nonoverlapping(payload.as_ptr(), region.offset(span.payload), span.first);
        if span.is_split() {
            ptr::copy_nonoverlapping(
                payload.as_ptr().add(span.first),
                region.offset(0),
                span.second,
            );
        }
    }
}

/// Copies the payload at `span` into the front of `out`.
///
/// # Safety
///
/// The caller must hold the claim covering `span`, and `out` must be at
/// least as long as the payload.
pub(crate) unsafe fn read_payload(region: &Region, span: Span, out: &mut [u8]) {
    debug_assert!(out.len() >= span.first + span.second);
    unsafe {
        ptr::copy_nonoverlapping(region.offset(span.payload), out.as_mut_ptr(), span.first);
        if span.is_split() {
            ptr::copy_nonoverlapping(
                region.offset(0),
                out.as_mut_ptr().add(span.first),
                span.second,
            );
        }
    }
}
