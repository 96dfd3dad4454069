//! Block - a scoped, dirty-tracked view over one block.
//!
//! A [`Block`] owns a copy of one block's bytes. Header and content writes
//! mark it dirty; on release the buffer is written back to the medium if
//! and only if it is dirty. Release happens explicitly through
//! [`Block::release`] or implicitly on drop, so every exit path (including
//! `?` early returns) writes back.

use tracing::error;

use crate::common::{BlockId, Error, Result};
use crate::storage::block::header::{self, HeaderField};
use crate::storage::block_store::BlockStore;
use crate::storage::medium::Medium;

/// Handle to a single block of a [`BlockStore`].
///
/// Any number of handles can be alive at once, each with its own buffer.
/// Two live handles to the same block don't see each other's writes, and
/// the one released last wins.
///
/// # Example
/// ```
/// use chainstore::storage::{BlockStore, HeaderField, MemoryMedium};
/// use chainstore::Config;
///
/// let store = BlockStore::with_medium(MemoryMedium::new(), &Config::default()).unwrap();
///
/// let mut block = store.create_new().unwrap();
/// block.write_content(0, b"hello").unwrap();
/// block.set_header(HeaderField::ContentLength, 5);
/// let id = block.id();
/// drop(block); // dirty: written back here
///
/// let block = store.find(id).unwrap();
/// assert_eq!(block.read_content(0, 5).unwrap(), b"hello");
/// ```
pub struct Block<'a, M: Medium> {
    /// Store to write back to on release.
    store: &'a BlockStore<M>,
    /// Which block this is.
    id: BlockId,
    /// Full block bytes, header included.
    buffer: Vec<u8>,
    /// Whether the buffer differs from the medium.
    dirty: bool,
}

impl<'a, M: Medium> Block<'a, M> {
    /// Wrap a freshly read buffer.
    ///
    /// Called by `BlockStore::find()` and `BlockStore::create_new()`.
    pub(crate) fn new(store: &'a BlockStore<M>, id: BlockId, buffer: Vec<u8>) -> Self {
        Self {
            store,
            id,
            buffer,
            dirty: false,
        }
    }

    /// Get the block ID.
    #[inline]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Whether the handle holds unwritten changes.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Size of the content region.
    #[inline]
    pub fn content_size(&self) -> usize {
        self.store.layout().content_size()
    }

    // ========================================================================
    // Header access
    // ========================================================================

    /// Read a raw header field.
    pub fn header(&self, field: HeaderField) -> i64 {
        let raw = header::read_u64(&self.buffer, field.offset());
        i64::from_le_bytes(raw.to_le_bytes())
    }

    /// Write a raw header field and mark the block dirty.
    pub fn set_header(&mut self, field: HeaderField, value: i64) {
        let offset = field.offset();
        self.buffer[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
        self.dirty = true;
    }

    /// Successor in the record chain.
    ///
    /// # Errors
    /// `Error::InvariantViolation` if the stored link is negative.
    pub fn next_block(&self) -> Result<Option<BlockId>> {
        header::decode_next(self.header(HeaderField::NextBlockId)).map_err(|raw| {
            Error::invariant(format!("{} has malformed next link {}", self.id, raw))
        })
    }

    /// Set or clear the successor link.
    ///
    /// # Errors
    /// `Error::InvariantViolation` if the id doesn't fit the field; the
    /// header is left untouched.
    pub fn set_next_block(&mut self, next: Option<BlockId>) -> Result<()> {
        let raw = header::encode_next(next)?;
        self.set_header(HeaderField::NextBlockId, raw);
        Ok(())
    }

    /// Number of valid content bytes.
    ///
    /// # Errors
    /// `Error::InvariantViolation` if the stored length is negative or larger
    /// than the content region.
    pub fn content_length(&self) -> Result<usize> {
        let raw = self.header(HeaderField::ContentLength);
        usize::try_from(raw)
            .ok()
            .filter(|&len| len <= self.content_size())
            .ok_or_else(|| {
                Error::invariant(format!(
                    "{} claims {} content bytes, capacity is {}",
                    self.id,
                    raw,
                    self.content_size()
                ))
            })
    }

    /// Set the number of valid content bytes.
    ///
    /// # Errors
    /// `Error::OutOfRange` if `len` exceeds the content region.
    pub fn set_content_length(&mut self, len: usize) -> Result<()> {
        self.check_range(0, len)?;
        self.set_header(HeaderField::ContentLength, len as i64);
        Ok(())
    }

    /// Whether the block has been deleted.
    pub fn is_deleted(&self) -> bool {
        self.header(HeaderField::DeletedFlag) != 0
    }

    /// Set the deleted flag. There is no way to clear it.
    pub fn mark_deleted(&mut self) {
        self.set_header(HeaderField::DeletedFlag, 1);
    }

    // ========================================================================
    // Content access
    // ========================================================================

    /// Borrow `count` content bytes starting at `offset`.
    ///
    /// # Errors
    /// `Error::OutOfRange` if the range leaves the content region.
    pub fn read_content(&self, offset: usize, count: usize) -> Result<&[u8]> {
        self.check_range(offset, count)?;
        let start = self.store.layout().header_size() + offset;
        Ok(&self.buffer[start..start + count])
    }

    /// Copy `data` into the content region at `offset` and mark dirty.
    ///
    /// # Errors
    /// `Error::OutOfRange` if the data doesn't fit; nothing is written.
    pub fn write_content(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        self.check_range(offset, data.len())?;
        let start = self.store.layout().header_size() + offset;
        self.buffer[start..start + data.len()].copy_from_slice(data);
        self.dirty = true;
        Ok(())
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<()> {
        let capacity = self.content_size();
        match offset.checked_add(len) {
            Some(end) if end <= capacity => Ok(()),
            _ => Err(Error::OutOfRange {
                offset,
                len,
                capacity,
            }),
        }
    }

    // ========================================================================
    // Release
    // ========================================================================

    /// Write the block back if dirty.
    ///
    /// Idempotent: once released (or if never modified), further calls do
    /// nothing. The dirty flag is cleared before the write, so a failed
    /// write is reported once and not retried on drop.
    ///
    /// # Errors
    /// I/O errors from the medium.
    pub fn release(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.dirty = false;
        self.store.layout().seal(&mut self.buffer);
        self.store.write_block(self.id, &self.buffer)
    }
}

impl<M: Medium> Drop for Block<'_, M> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            error!(block = %self.id, error = %e, "write-back on drop failed");
        }
    }
}

impl<M: Medium> std::fmt::Debug for Block<'_, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("id", &self.id)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}
