//! Block Store - fixed-size block allocation over a backing medium.
//!
//! The [`BlockStore`] handles all direct medium operations:
//! - Opening a medium and padding it to a whole number of blocks
//! - Handing out [`Block`] handles for existing blocks
//! - Growing the medium by one zeroed block at a time

use std::cell::{Cell, RefCell};
use std::fs::{File, OpenOptions};
use std::path::Path;

use tracing::{debug, info, trace, warn};

use crate::common::{BlockId, Config, Error, Result};
use crate::storage::block::{Block, BlockLayout};
use crate::storage::medium::Medium;
use crate::storage::stats::BlockStoreStats;

/// Manages fixed-size blocks on a single medium.
///
/// # Layout
/// Blocks are laid out back to back:
/// ```text
/// ┌──────────┬──────────┬──────────┬─────────┬──────────┐
/// │ Block 0  │ Block 1  │ Block 2  │  ...    │ Block N  │
/// │ hdr|data │ hdr|data │ hdr|data │         │ hdr|data │
/// └──────────┴──────────┴──────────┴─────────┴──────────┘
/// Offset:  0     B         2B        ...       N×B
/// ```
///
/// # Thread Safety
/// `BlockStore` is **single-threaded**. The medium sits in a `RefCell`, so
/// the store is `Send` but not `Sync`; callers that share it across threads
/// must wrap it (or the engine owning it) in a lock.
pub struct BlockStore<M: Medium = File> {
    medium: RefCell<M>,
    layout: BlockLayout,
    /// Number of whole blocks in the medium.
    block_count: Cell<u64>,
    sync_writes: bool,
    stats: BlockStoreStats,
}

impl BlockStore<File> {
    /// Create a new store file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created, or
    /// if the config is invalid.
    pub fn create<P: AsRef<Path>>(path: P, config: &Config) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;

        info!(path = %path.as_ref().display(), "created block store");
        Self::with_medium(file, config)
    }

    /// Open an existing store file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, config: &Config) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        info!(path = %path.as_ref().display(), "opened block store");
        Self::with_medium(file, config)
    }

    /// Open an existing store file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P, config: &Config) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path, config)
        } else {
            Self::create(path, config)
        }
    }
}

impl<M: Medium> BlockStore<M> {
    /// Build a store over any medium.
    ///
    /// If the medium's length is not a multiple of the block size it is
    /// zero-padded up to the next multiple.
    ///
    /// # Errors
    /// `Error::InvalidConfig` for a rejected config, I/O errors otherwise.
    pub fn with_medium(mut medium: M, config: &Config) -> Result<Self> {
        let layout = BlockLayout::from_config(config)?;
        let block_size = layout.block_size() as u64;

        let mut len = medium.byte_len()?;
        if len % block_size != 0 {
            let padded = (len / block_size + 1) * block_size;
            warn!(from = len, to = padded, "padding medium to a whole block");
            medium.set_byte_len(padded)?;
            len = padded;
        }

        let block_count = len / block_size;
        debug!(
            block_size = layout.block_size(),
            content_size = layout.content_size(),
            block_count,
            "block store ready"
        );

        Ok(Self {
            medium: RefCell::new(medium),
            layout,
            block_count: Cell::new(block_count),
            sync_writes: config.sync_writes,
            stats: BlockStoreStats::new(),
        })
    }

    /// Get a handle to an existing block.
    ///
    /// # Errors
    /// - `Error::BlockNotFound` if the block lies past the end of the medium
    /// - `Error::ChecksumMismatch` if checksums are on and the block is corrupt
    ///   or was written without a seal
    pub fn find(&self, block_id: BlockId) -> Result<Block<'_, M>> {
        if block_id.0 >= self.block_count.get() {
            return Err(Error::BlockNotFound(block_id));
        }

        let mut buffer = vec![0u8; self.layout.block_size()];
        self.medium_mut()?
            .read_exact_at(block_id.offset(self.layout.block_size()), &mut buffer)?;
        self.stats.record_read();

        if !self.layout.verify(&buffer) {
            return Err(Error::ChecksumMismatch(block_id));
        }

        Ok(Block::new(self, block_id, buffer))
    }

    /// Grow the medium by one zeroed block and return a handle to it.
    ///
    /// The new block's id is `new_length / block_size - 1`.
    pub fn create_new(&self) -> Result<Block<'_, M>> {
        let block_size = self.layout.block_size() as u64;
        let new_len = {
            let mut medium = self.medium_mut()?;
            let new_len = medium.byte_len()? + block_size;
            medium.set_byte_len(new_len)?;
            new_len
        };

        let block_id = BlockId::new(new_len / block_size - 1);
        self.block_count.set(block_id.0 + 1);
        self.stats.record_allocation();
        debug!(block = %block_id, "allocated block");

        Ok(Block::new(
            self,
            block_id,
            vec![0u8; self.layout.block_size()],
        ))
    }

    /// Write a full block buffer. Called by `Block::release()`.
    pub(crate) fn write_block(&self, block_id: BlockId, buffer: &[u8]) -> Result<()> {
        if block_id.0 >= self.block_count.get() {
            return Err(Error::BlockNotFound(block_id));
        }

        let mut medium = self.medium_mut()?;
        medium.write_all_at(block_id.offset(self.layout.block_size()), buffer)?;
        if self.sync_writes {
            medium.sync()?;
        }
        self.stats.record_write();
        trace!(block = %block_id, "wrote back block");
        Ok(())
    }

    /// fsync the medium.
    pub fn flush(&self) -> Result<()> {
        self.medium_mut()?.sync()?;
        Ok(())
    }

    /// Number of blocks in the medium.
    #[inline]
    pub fn block_count(&self) -> u64 {
        self.block_count.get()
    }

    #[inline]
    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.layout.block_size()
    }

    /// Payload bytes per block.
    #[inline]
    pub fn content_size(&self) -> usize {
        self.layout.content_size()
    }

    /// Get I/O statistics.
    pub fn stats(&self) -> &BlockStoreStats {
        &self.stats
    }

    /// Give back the medium, e.g. to reopen it with another config.
    pub fn into_medium(self) -> M {
        self.medium.into_inner()
    }

    fn medium_mut(&self) -> Result<std::cell::RefMut<'_, M>> {
        self.medium
            .try_borrow_mut()
            .map_err(|_| Error::invariant("block store medium is already borrowed"))
    }
}
