use std::fmt;
use std::mem::{align_of, size_of};
use std::ptr;
use std::slice;

use tracing::{debug, trace, warn};

use crate::config::{Concurrency, Config, PeekFlags};
use crate::error::Error;
use crate::frame::{self, Span, CONSUMED, HEADER_LEN, RECORD_ALIGN};
use crate::region::Region;
use crate::sync::{spin_loop, AtomicU64, Ordering};

/// Marks an initialized control block ("RECR").
const MAGIC: u32 = 0x5245_4352;

/// Control state of a variable-record ring buffer.
///
/// The ring holds no pointer to its storage. Every operation takes the
/// backing [`Region`], so the control block and the bytes can live in
/// different segments. Cursors are byte positions that only ever grow and
/// are reduced modulo the capacity to address the region:
///
/// ```text
///   cons_tail <= cons_head <= prod_tail <= prod_head <= cons_tail + capacity
///   |  claimed  |  unread   | reserved  |
/// ```
///
/// - Producers reserve at `prod_head` and publish in reservation order by
///   advancing `prod_tail`.
/// - Consumers claim at `cons_head`, mark the record consumed when done, and
///   whoever sees a consumed record at `cons_tail` moves it forward.
#[repr(C, align(64))]
pub struct RingBuffer {
    /// Reservation cursor (producers claim space from here).
    prod_head: AtomicU64,
    _pad0: [u8; 56],
    /// Publication cursor (everything below is fully written).
    prod_tail: AtomicU64,
    _pad1: [u8; 56],
    /// Claim cursor (consumers take records from here).
    cons_head: AtomicU64,
    _pad2: [u8; 56],
    /// Release cursor (everything below is free for producers).
    cons_tail: AtomicU64,
    _pad3: [u8; 56],
    capacity: u64,
    magic: u32,
    mode: u32,
    _pad4: [u8; 48],
}

#[cfg(not(feature = "loom"))]
const _: () = assert!(size_of::<RingBuffer>() == 320);

impl fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("producers", &self.producers())
            .field("consumers", &self.consumers())
            .field("prod_head", &self.prod_head.load(Ordering::Relaxed))
            .field("prod_tail", &self.prod_tail.load(Ordering::Relaxed))
            .field("cons_head", &self.cons_head.load(Ordering::Relaxed))
            .field("cons_tail", &self.cons_tail.load(Ordering::Relaxed))
            .finish()
    }
}

/// A record claimed by a consumer.
#[derive(Debug, Clone, Copy)]
struct Claim {
    position: u64,
    len: usize,
    span: Span,
}

#[cold]
fn misuse(err: Error) -> Error {
    warn!(error = %err, "ring buffer misuse");
    err
}

impl RingBuffer {
    /// Create a new ring buffer
    ///
    /// # Arguments
    /// * `config` - Capacity and concurrency modes
    ///
    /// # Returns
    /// * `Ok(RingBuffer)` on success
    /// * `Err(Error::InvalidCapacity)` if the capacity is below 16 bytes or
    ///   not a multiple of 8
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate().map_err(misuse)?;

        debug!(
            capacity = config.capacity,
            producers = ?config.producers,
            consumers = ?config.consumers,
            "ring buffer created"
        );

        Ok(Self {
            prod_head: AtomicU64::new(0),
            _pad0: [0; 56],
            prod_tail: AtomicU64::new(0),
            _pad1: [0; 56],
            cons_head: AtomicU64::new(0),
            _pad2: [0; 56],
            cons_tail: AtomicU64::new(0),
            _pad3: [0; 56],
            capacity: config.capacity,
            magic: MAGIC,
            mode: config.mode_bits(),
            _pad4: [0; 48],
        })
    }

    /// Multi-producer, multi-consumer ring of `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Result<Self, Error> {
        Self::new(Config::new(capacity))
    }

    /// Initialize a control block at `offset` inside `region`.
    ///
    /// Use this to place the control state in a shared segment that other
    /// processes [`attach`](Self::attach) to.
    ///
    /// # Safety
    ///
    /// The region must be writable and valid for `'a`, and nothing else may
    /// access the control block bytes during initialization.
    pub unsafe fn init_in<'a>(
        region: Region,
        offset: usize,
        config: Config,
    ) -> Result<&'a RingBuffer, Error> {
        Self::check_control_slot(&region, offset)?;
        let ring = Self::new(config)?;

        let dst = unsafe { region.offset(offset) } as *mut RingBuffer;
        unsafe { ptr::write(dst, ring) };

        debug!(offset, capacity = config.capacity, "control block initialized");
        Ok(unsafe { &*dst })
    }

    /// Attach to a control block previously written by
    /// [`init_in`](Self::init_in).
    ///
    /// # Safety
    ///
    /// The region must be valid for `'a` and its bytes at `offset` must be
    /// initialized.
    pub unsafe fn attach<'a>(region: Region, offset: usize) -> Result<&'a RingBuffer, Error> {
        Self::check_control_slot(&region, offset)?;
        let ring: &RingBuffer = unsafe { region.get(offset) };

        if ring.magic != MAGIC || ring.config().validate().is_err() {
            return Err(misuse(Error::Uninitialized));
        }

        debug!(offset, capacity = ring.capacity, "attached to control block");
        Ok(ring)
    }

    fn check_control_slot(region: &Region, offset: usize) -> Result<(), Error> {
        let addr = (region.as_ptr() as usize).wrapping_add(offset);
        if addr % align_of::<RingBuffer>() != 0 {
            return Err(misuse(Error::RegionMisaligned { addr }));
        }
        if !region.fits::<RingBuffer>(offset) {
            return Err(misuse(Error::RegionTooSmall {
                len: region.len(),
                required: offset.saturating_add(size_of::<RingBuffer>()),
            }));
        }
        Ok(())
    }

    #[inline]
    fn check_region(&self, region: &Region) -> Result<(), Error> {
        let addr = region.as_ptr() as usize;
        if addr % RECORD_ALIGN != 0 {
            return Err(misuse(Error::RegionMisaligned { addr }));
        }
        if (region.len() as u64) < self.capacity {
            return Err(misuse(Error::RegionTooSmall {
                len: region.len(),
                required: self.capacity as usize,
            }));
        }
        Ok(())
    }

    /// Push a record into the ring buffer
    ///
    /// Reserves space for the framed record, copies the payload in (splitting
    /// it across the end of the region if needed) and publishes it once every
    /// earlier reservation is published.
    ///
    /// # Returns
    /// * `Ok(())` once the record is visible to consumers
    /// * `Err(Error::Full)` if there is not enough free space right now
    /// * `Err(Error::PayloadTooLarge)` if the payload can never fit
    pub fn push(&self, payload: &[u8], region: &Region) -> Result<(), Error> {
        self.check_region(region)?;

        let max = self.max_payload();
        if payload.len() > max {
            return Err(misuse(Error::PayloadTooLarge {
                len: payload.len(),
                max,
            }));
        }

        let framed = frame::frame_len(payload.len()) as u64;
        let start = self.reserve(framed)?;
        let span = Span::new(self.capacity, start, payload.len());

        // SAFETY: [start, start + framed) is reserved for this call alone and
        // no consumer reads it before `publish`.
        unsafe {
            frame::write_payload(region, span, payload);
            frame::header_at(region, span.header)
                .store(frame::encode_header(payload.len()), Ordering::Relaxed);
        }

        self.publish(start, start + framed);
        Ok(())
    }

    fn reserve(&self, framed: u64) -> Result<u64, Error> {
        let mut head = self.prod_head.load(Ordering::Relaxed);

        loop {
            let tail = self.cons_tail.load(Ordering::Acquire);
            let used = head.wrapping_sub(tail);

            if used > self.capacity || used + framed > self.capacity {
                // A stale head makes the ring look fuller than it is.
                let current = self.prod_head.load(Ordering::Relaxed);
                if current != head {
                    head = current;
                    continue;
                }
                return Err(Error::Full);
            }

            if self.producers() == Concurrency::Single {
                self.prod_head.store(head + framed, Ordering::Relaxed);
                return Ok(head);
            }

            match self.prod_head.compare_exchange_weak(
                head,
                head + framed,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(head),
                Err(actual) => {
                    head = actual;
                    spin_loop();
                }
            }
        }
    }

    fn publish(&self, start: u64, end: u64) {
        if self.producers() == Concurrency::Multi {
            // Earlier reservations publish first so the unread span has no holes.
            while self.prod_tail.load(Ordering::Acquire) != start {
                spin_loop();
            }
        }
        debug_assert_eq!(self.prod_tail.load(Ordering::Relaxed), start);
        self.prod_tail.store(end, Ordering::Release);
    }

    /// Pop the oldest record into `out`
    ///
    /// # Returns
    /// * `Ok(len)` with the record copied into `out[..len]`
    /// * `Err(Error::Empty)` if no record is waiting
    /// * `Err(Error::BufferTooSmall)` if `out` is shorter than the record;
    ///   the record stays in the ring
    pub fn pop(&self, out: &mut [u8], region: &Region) -> Result<usize, Error> {
        self.check_region(region)?;

        let claim = self.claim(region, Some(out.len()), false)?;
        // SAFETY: the claim gives this call exclusive read access to the span.
        unsafe { frame::read_payload(region, claim.span, out) };
        self.release(region, claim.position);

        Ok(claim.len)
    }

    /// Claim the oldest record for zero-copy reading
    ///
    /// The record stays in place until the returned guard is passed to
    /// [`remove`](Self::remove) or dropped. A record whose payload wraps the
    /// end of the region is exposed as two slices; pass
    /// [`PeekFlags::CONTIGUOUS`] to get [`Error::Fragmented`] instead.
    ///
    /// # Returns
    /// * `Ok(Peeked)` holding the claimed record
    /// * `Err(Error::Empty)` if no record is waiting
    pub fn peek<'a>(&'a self, flags: PeekFlags, region: &'a Region) -> Result<Peeked<'a>, Error> {
        self.check_region(region)?;

        let claim = self.claim(region, None, flags.contains(PeekFlags::CONTIGUOUS))?;
        Ok(Peeked {
            ring: self,
            region,
            claim,
            removed: false,
        })
    }

    /// Release a record obtained from [`peek`](Self::peek).
    ///
    /// A record peeked from another ring is rejected with
    /// [`Error::ForeignRecord`] and released back to its own ring.
    pub fn remove(&self, record: Peeked<'_>) -> Result<(), Error> {
        if !ptr::eq(record.ring, self) {
            return Err(misuse(Error::ForeignRecord));
        }
        record.remove();
        Ok(())
    }

    fn claim(
        &self,
        region: &Region,
        limit: Option<usize>,
        contiguous: bool,
    ) -> Result<Claim, Error> {
        // Acquire so the publication cursor read below is at least `head`.
        let mut head = self.cons_head.load(Ordering::Acquire);

        loop {
            let published = self.prod_tail.load(Ordering::Acquire);
            if head >= published {
                return Err(Error::Empty);
            }

            // SAFETY: region was checked; headers are 8-aligned and never
            // straddle the end.
            // A stale `head` may point into a slot a producer has since
            // reused and is filling with `copy_nonoverlapping`. This load
            // then races with those plain writes; the value is discarded
            // because the `cons_head` CAS below fails.
            let word = unsafe { frame::header_at(region, (head % self.capacity) as usize) }
                .load(Ordering::Acquire);

            let len = match frame::header_len(word) {
                Some(len)
                    if len <= self.max_payload()
                        && frame::frame_len(len) as u64 <= published - head =>
                {
                    len
                }
                _ => {
                    // Garbage is expected when `head` went stale and the slot
                    // was reused; at the current head it is not.
                    let current = self.cons_head.load(Ordering::Acquire);
                    if current == head {
                        return Err(misuse(Error::CorruptHeader { position: head }));
                    }
                    head = current;
                    continue;
                }
            };

            let span = Span::new(self.capacity, head, len);
            let refusal = match limit {
                Some(limit) if len > limit => Some(Error::BufferTooSmall { needed: len }),
                _ if contiguous && span.is_split() => Some(Error::Fragmented { len }),
                _ => None,
            };
            if let Some(err) = refusal {
                let current = self.cons_head.load(Ordering::Acquire);
                if current == head {
                    return Err(err);
                }
                head = current;
                continue;
            }

            let next = head + frame::frame_len(len) as u64;
            let claim = Claim {
                position: head,
                len,
                span,
            };

            if self.consumers() == Concurrency::Single {
                self.cons_head.store(next, Ordering::Release);
                return Ok(claim);
            }

            match self.cons_head.compare_exchange_weak(
                head,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(claim),
                Err(actual) => {
                    head = actual;
                    spin_loop();
                }
            }
        }
    }

    fn release(&self, region: &Region, position: u64) {
        // SAFETY: the caller holds the claim on this record; producers do not
        // touch it until `cons_tail` moves past it.
        unsafe { frame::header_at(region, (position % self.capacity) as usize) }
            .fetch_or(CONSUMED, Ordering::SeqCst);
        self.advance_tail(region);
    }

    /// Moves `cons_tail` over every consecutive consumed record.
    ///
    /// Each consumer runs this after marking its own record, so the last one
    /// to finish always frees the span. The consumed bit and the header loads
    /// are `SeqCst` so two consumers cannot both miss each other's mark.
    fn advance_tail(&self, region: &Region) {
        loop {
            let tail = self.cons_tail.load(Ordering::SeqCst);
            let head = self.cons_head.load(Ordering::Acquire);
            if tail >= head {
                return;
            }

            // SAFETY: region was checked by the calling operation.
            // As in `claim`, a stale `tail` can land in a reused slot while a
            // producer writes payload bytes there; the value is discarded
            // because the `cons_tail` CAS below fails.
            let word = unsafe { frame::header_at(region, (tail % self.capacity) as usize) }
                .load(Ordering::SeqCst);
            if word & CONSUMED == 0 {
                return;
            }

            // A stale tail may read a reused slot; whoever moved the tail
            // carries on from the fresh value.
            let Some(len) = frame::header_len(word) else {
                return;
            };
            let next = tail + frame::frame_len(len) as u64;
            if next > head {
                return;
            }

            let _ = self.cons_tail.compare_exchange(
                tail,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            );
        }
    }

    /// Get the capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Largest payload a single record may carry.
    pub fn max_payload(&self) -> usize {
        (self.capacity as usize - HEADER_LEN).min(u32::MAX as usize)
    }

    /// Configuration this ring was built with.
    pub fn config(&self) -> Config {
        Config::from_parts(self.capacity, self.mode)
    }

    #[inline]
    fn producers(&self) -> Concurrency {
        self.config().producers
    }

    #[inline]
    fn consumers(&self) -> Concurrency {
        self.config().consumers
    }

    /// Bytes reserved by producers and not yet released by consumers.
    pub fn occupied(&self) -> usize {
        let tail = self.cons_tail.load(Ordering::Acquire);
        let head = self.prod_head.load(Ordering::Acquire);
        head.saturating_sub(tail) as usize
    }

    /// Bytes free for new reservations.
    pub fn available(&self) -> usize {
        self.capacity().saturating_sub(self.occupied())
    }

    /// Returns true if no published record is waiting to be claimed.
    pub fn is_empty(&self) -> bool {
        let head = self.cons_head.load(Ordering::Acquire);
        let published = self.prod_tail.load(Ordering::Acquire);
        head >= published
    }

    /// Returns a snapshot of all cursors.
    pub fn status(&self) -> RingStatus {
        let cons_tail = self.cons_tail.load(Ordering::Acquire);
        let cons_head = self.cons_head.load(Ordering::Acquire);
        let prod_tail = self.prod_tail.load(Ordering::Acquire);
        let prod_head = self.prod_head.load(Ordering::Acquire);

        RingStatus {
            capacity: self.capacity,
            prod_head,
            prod_tail,
            cons_head,
            cons_tail,
        }
    }
}

/// Status snapshot of a ring.
///
/// Cursors are loaded one by one, so under concurrent use the snapshot is
/// approximate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingStatus {
    /// Capacity in bytes.
    pub capacity: u64,
    /// Reservation cursor.
    pub prod_head: u64,
    /// Publication cursor.
    pub prod_tail: u64,
    /// Claim cursor.
    pub cons_head: u64,
    /// Release cursor.
    pub cons_tail: u64,
}

impl RingStatus {
    /// Published bytes not yet claimed by a consumer.
    pub fn unread(&self) -> u64 {
        self.prod_tail.saturating_sub(self.cons_head)
    }

    /// Reserved bytes not yet released.
    pub fn occupied(&self) -> u64 {
        self.prod_head.saturating_sub(self.cons_tail)
    }
}

/// A record claimed by [`RingBuffer::peek`], read in place.
///
/// Dropping the guard releases the record just like
/// [`RingBuffer::remove`].
pub struct Peeked<'a> {
    ring: &'a RingBuffer,
    region: &'a Region,
    claim: Claim,
    removed: bool,
}

impl fmt::Debug for Peeked<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peeked")
            .field("position", &self.claim.position)
            .field("len", &self.claim.len)
            .field("split", &self.claim.span.is_split())
            .finish()
    }
}

impl<'a> Peeked<'a> {
    /// Get the length of the record payload
    pub fn len(&self) -> usize {
        self.claim.len
    }

    /// Check if this record is empty
    pub fn is_empty(&self) -> bool {
        self.claim.len == 0
    }

    /// Returns true if the payload does not wrap the end of the region.
    pub fn is_contiguous(&self) -> bool {
        !self.claim.span.is_split()
    }

    /// The payload as two slices; the second is non-empty only when the
    /// payload wraps the end of the region.
    pub fn as_slices(&self) -> (&[u8], &[u8]) {
        let span = self.claim.span;
        // SAFETY: the span is claimed until this guard is dropped, and no
        // producer writes it before the release.
        unsafe {
            (
                slice::from_raw_parts(self.region.offset(span.payload), span.first),
                slice::from_raw_parts(self.region.offset(0), span.second),
            )
        }
    }

    /// The payload as one slice, if it is contiguous.
    pub fn as_contiguous(&self) -> Option<&[u8]> {
        self.is_contiguous().then(|| self.as_slices().0)
    }

    /// Copies the payload into the front of `out`.
    pub fn copy_to(&self, out: &mut [u8]) -> Result<usize, Error> {
        if out.len() < self.claim.len {
            return Err(Error::BufferTooSmall {
                needed: self.claim.len,
            });
        }
        // SAFETY: see `as_slices`.
        unsafe { frame::read_payload(self.region, self.claim.span, out) };
        Ok(self.claim.len)
    }

    /// Copies the payload into a new vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let (first, second) = self.as_slices();
        let mut out = Vec::with_capacity(self.claim.len);
        out.extend_from_slice(first);
        out.extend_from_slice(second);
        out
    }

    /// Release the record back to the ring.
    pub fn remove(mut self) {
        self.removed = true;
    }
}

impl Drop for Peeked<'_> {
    fn drop(&mut self) {
        if !self.removed {
            trace!(
                position = self.claim.position,
                "peeked record released without remove"
            );
        }
        self.ring.release(self.region, self.claim.position);
    }
}
