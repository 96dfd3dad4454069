//! Error types for chainstore.

use thiserror::Error;

use super::BlockId;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in chainstore.
///
/// Every variant belongs to exactly one [`ErrorKind`]. `NotFound` and
/// `OutOfRange` are ordinary, recoverable outcomes; storage faults and
/// invariant violations abort the operation that hit them.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error against the backing medium.
    ///
    /// The operation is aborted without retry.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Block id lies past the end of the medium.
    #[error("{0} not found")]
    BlockNotFound(BlockId),

    /// No live record starts at this block.
    #[error("record {0} not found")]
    RecordNotFound(BlockId),

    /// Key is not present in the index.
    #[error("key not found")]
    KeyNotFound,

    /// A content access reaches past the block's content region.
    #[error("content range {offset}+{len} exceeds block capacity {capacity}")]
    OutOfRange {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    /// A sealed block failed its CRC32 check.
    #[error("checksum mismatch in {0}")]
    ChecksumMismatch(BlockId),

    /// Corrupt chain link, malformed header or broken tree structure.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The supplied configuration cannot describe a valid store.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing block, record or key.
    NotFound,
    /// Content offset or length exceeds a block's capacity.
    OutOfRange,
    /// I/O failure against the medium.
    StorageFault,
    /// Corruption; the current operation must not continue.
    InvariantViolation,
    /// Rejected configuration.
    InvalidConfig,
}

impl Error {
    /// Shorthand for building an [`Error::InvariantViolation`].
    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        Error::InvariantViolation(msg.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::StorageFault,
            Error::BlockNotFound(_) | Error::RecordNotFound(_) | Error::KeyNotFound => {
                ErrorKind::NotFound
            }
            Error::OutOfRange { .. } => ErrorKind::OutOfRange,
            Error::ChecksumMismatch(_) | Error::InvariantViolation(_) => {
                ErrorKind::InvariantViolation
            }
            Error::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }

    /// Whether the caller can reasonably carry on after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::NotFound | ErrorKind::OutOfRange)
    }
}
