use thiserror::Error;

/// Status code for a successful operation.
pub const STATUS_OK: i32 = 0;
/// Status code for a transient condition (`Full` or `Empty`).
pub const STATUS_RETRY: i32 = -1;
/// Status code for a destination buffer that cannot hold the next record.
pub const STATUS_BUFFER_TOO_SMALL: i32 = -2;
/// Status code for caller misuse.
pub const STATUS_INVALID_USE: i32 = -3;

/// Errors returned by ring buffer operations.
///
/// `Full` and `Empty` are transient and the caller is expected to retry after
/// its own backoff. Everything else needs caller action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// Not enough free space for the record right now.
    #[error("ring buffer is full")]
    Full,
    /// No published record is waiting.
    #[error("ring buffer is empty")]
    Empty,
    /// The destination buffer is shorter than the next record. The record was
    /// not consumed.
    #[error("destination buffer too small: next record is {needed} bytes")]
    BufferTooSmall {
        /// Length of the pending record.
        needed: usize,
    },
    /// A contiguous peek was requested but the next record wraps the end of
    /// the backing region. The record was not consumed.
    #[error("record of {len} bytes wraps the end of the backing region")]
    Fragmented {
        /// Length of the pending record.
        len: usize,
    },
    /// The payload can never fit in this ring.
    #[error("payload of {len} bytes exceeds the maximum of {max}")]
    PayloadTooLarge {
        /// Requested payload length.
        len: usize,
        /// Largest payload this ring accepts.
        max: usize,
    },
    /// Capacity must be at least 16 bytes and a multiple of 8.
    #[error("invalid ring capacity {capacity}")]
    InvalidCapacity {
        /// Rejected capacity.
        capacity: u64,
    },
    /// The backing region is shorter than the ring requires.
    #[error("backing region is {len} bytes, {required} required")]
    RegionTooSmall {
        /// Region length.
        len: usize,
        /// Required length.
        required: usize,
    },
    /// The backing region or control block offset is not suitably aligned.
    #[error("region address {addr:#x} is misaligned")]
    RegionMisaligned {
        /// Offending address.
        addr: usize,
    },
    /// A peeked record was handed to a ring that did not produce it.
    #[error("record was peeked from a different ring")]
    ForeignRecord,
    /// A published header is not a valid record header.
    #[error("corrupt record header at position {position}")]
    CorruptHeader {
        /// Cursor position of the header.
        position: u64,
    },
    /// No initialized control block was found at the given offset.
    #[error("control block is not initialized")]
    Uninitialized,
}

impl Error {
    /// Returns true for conditions that resolve on their own (`Full`, `Empty`).
    #[inline]
    pub fn is_retryable(self) -> bool {
        matches!(self, Error::Full | Error::Empty)
    }

    /// Returns true for errors that indicate caller misuse rather than
    /// contention or sizing.
    pub fn is_invalid_use(self) -> bool {
        !self.is_retryable()
            && !matches!(self, Error::BufferTooSmall { .. } | Error::Fragmented { .. })
    }

    /// Integer status for callers bridging to a C-style interface.
    pub fn code(self) -> i32 {
        match self {
            Error::Full | Error::Empty => STATUS_RETRY,
            Error::BufferTooSmall { .. } | Error::Fragmented { .. } => STATUS_BUFFER_TOO_SMALL,
            _ => STATUS_INVALID_USE,
        }
    }
}

/// Maps an operation result to its integer status code.
pub fn status_code<T>(result: &Result<T, Error>) -> i32 {
    match result {
        Ok(_) => STATUS_OK,
        Err(e) => e.code(),
    }
}
