use bitflags::bitflags;

use crate::error::Error;
use crate::frame::{MIN_CAPACITY, RECORD_ALIGN};

/// How many threads may drive one side of the ring at once.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Concurrency {
    /// Exactly one thread at a time. Cursors are advanced with plain stores.
    Single = 0,
    /// Any number of threads. Cursors are claimed with compare-exchange.
    #[default]
    Multi = 1,
}

/// Construction parameters for a [`RingBuffer`](crate::RingBuffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub(crate) capacity: u64,
    pub(crate) producers: Concurrency,
    pub(crate) consumers: Concurrency,
}

impl Config {
    /// A multi-producer, multi-consumer ring of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity as u64,
            producers: Concurrency::Multi,
            consumers: Concurrency::Multi,
        }
    }

    /// Selects the single-producer fast path.
    ///
    /// # Safety
    ///
    /// At most one thread may call `push` on the resulting ring at any time.
    /// Concurrent pushes would write the same bytes.
    pub unsafe fn single_producer(mut self) -> Self {
        self.producers = Concurrency::Single;
        self
    }

    /// Selects the single-consumer fast path.
    ///
    /// # Safety
    ///
    /// At most one thread may call `pop` or `peek` on the resulting ring at
    /// any time. Concurrent consumers could be handed the same record and
    /// release space still being read.
    pub unsafe fn single_consumer(mut self) -> Self {
        self.consumers = Concurrency::Single;
        self
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Producer-side mode.
    pub fn producers(&self) -> Concurrency {
        self.producers
    }

    /// Consumer-side mode.
    pub fn consumers(&self) -> Concurrency {
        self.consumers
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.capacity < MIN_CAPACITY || self.capacity % RECORD_ALIGN as u64 != 0 {
            return Err(Error::InvalidCapacity {
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Packs the concurrency modes into one word for the control block.
    pub(crate) fn mode_bits(&self) -> u32 {
        (self.producers as u32) | ((self.consumers as u32) << 1)
    }

    pub(crate) fn from_parts(capacity: u64, mode: u32) -> Self {
        let side = |bit: u32| {
            if mode & bit != 0 {
                Concurrency::Multi
            } else {
                Concurrency::Single
            }
        };
        Self {
            capacity,
            producers: side(1),
            consumers: side(2),
        }
    }
}

bitflags! {
    /// Options for [`RingBuffer::peek`](crate::RingBuffer::peek).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PeekFlags: u32 {
        /// Refuse records whose payload wraps the end of the region, returning
        /// [`Error::Fragmented`] without claiming them.
        const CONTIGUOUS = 1 << 0;
    }
}
