//! # recring - variable-record ring buffer over caller-supplied memory
//!
//! A lock-free byte ring that queues variable-length records between any
//! number of producer and consumer threads (or processes).
//!
//! ## Design
//!
//! - The control state ([`RingBuffer`]) holds only atomic cursors and the
//!   capacity; the bytes live in a [`Region`] the caller owns and passes to
//!   every operation, so either can sit in shared memory
//! - Records are framed as an 8-byte header plus payload, padded to 8 bytes;
//!   payloads may wrap the end of the region and are reassembled on read
//! - Producers claim space with a compare-exchange on the write cursor, copy,
//!   then publish in claim order
//! - Consumers claim records with a compare-exchange on the read cursor;
//!   space is freed in order once each claimed record is released
//! - Every operation returns immediately; `Full` and `Empty` are for the
//!   caller to retry with its own backoff
//!
//! ## Example
//!
//! ```
//! use recring::{HeapRegion, PeekFlags, RingBuffer};
//!
//! // 1 KiB ring over a heap region
//! let backing = HeapRegion::new_zeroed(1024);
//! let region = backing.region();
//! let rb = RingBuffer::with_capacity(1024).unwrap();
//!
//! // Producer: copy a record in
//! rb.push(b"hello world", &region).unwrap();
//!
//! // Consumer: copy it out
//! let mut out = [0u8; 64];
//! let len = rb.pop(&mut out, &region).unwrap();
//! assert_eq!(&out[..len], b"hello world");
//!
//! // Consumer: read in place, then release
//! rb.push(b"zero copy", &region).unwrap();
//! let record = rb.peek(PeekFlags::empty(), &region).unwrap();
//! assert_eq!(record.as_slices().0, b"zero copy");
//! rb.remove(record).unwrap();
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod frame;
mod region;
mod ring_buffer;
mod sync;


pub use config::{Concurrency, Config, PeekFlags};
pub use error::{
    status_code, Error, STATUS_BUFFER_TOO_SMALL, STATUS_INVALID_USE, STATUS_OK, STATUS_RETRY,
};
pub use frame::{frame_len, HEADER_LEN, MIN_CAPACITY, RECORD_ALIGN};
pub use region::{HeapRegion, Region, REGION_ALIGN};
pub use ring_buffer::{Peeked, RingBuffer, RingStatus};
