//! Block identifier type.

use std::fmt;

/// Identifies a block in the backing medium.
///
/// A block id is the block's ordinal position: block N lives at byte offset
/// `N × block_size`. Records are identified by the id of their first block,
/// so the same type doubles as a record id.
///
/// # Example
/// ```
/// use chainstore::BlockId;
///
/// let block_id = BlockId::new(42);
/// assert_eq!(block_id.0, 42);
/// assert_eq!(block_id.offset(4096), 42 * 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u64);

impl BlockId {
    /// Create a new BlockId.
    #[inline]
    pub fn new(id: u64) -> Self {
        BlockId(id)
    }

    /// Byte offset of this block for the given block size.
    ///
    /// Saturates instead of overflowing; a saturated offset is always past
    /// the end of any real medium and fails the bounds check in `find`.
    #[inline]
    pub fn offset(self, block_size: usize) -> u64 {
        self.0.saturating_mul(block_size as u64)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Block({})", self.0)
    }
}
