//! Record Store - variable-length payloads as chains of blocks.

use std::fs::File;

use tracing::debug;

use crate::common::{BlockId, Error, Result};
use crate::storage::{Block, BlockStore, Medium};

/// Stores arbitrary byte payloads as singly linked chains of blocks.
///
/// A record's id is the id of its first block. Every block but the last is
/// filled to the content size; the last holds the remainder, which may be
/// zero bytes. A record always spans at least one block.
///
/// # Example
/// ```
/// use chainstore::record::RecordStore;
/// use chainstore::storage::{BlockStore, MemoryMedium};
/// use chainstore::Config;
///
/// let config = Config::builder().block_size(64).checksums(false).build();
/// let store = RecordStore::new(BlockStore::with_medium(MemoryMedium::new(), &config).unwrap());
///
/// let id = store.create(&[7u8; 90]).unwrap();
/// assert_eq!(store.chain(id).unwrap().len(), 3);
/// assert_eq!(store.find(id).unwrap(), vec![7u8; 90]);
/// ```
pub struct RecordStore<M: Medium = File> {
    blocks: BlockStore<M>,
}

impl<M: Medium> RecordStore<M> {
    pub fn new(blocks: BlockStore<M>) -> Self {
        Self { blocks }
    }

    /// The underlying block store.
    pub fn block_store(&self) -> &BlockStore<M> {
        &self.blocks
    }

    pub fn into_inner(self) -> BlockStore<M> {
        self.blocks
    }

    // ========================================================================
    // Create
    // ========================================================================

    /// Store `payload` in a fresh chain and return its record id.
    ///
    /// An empty payload still allocates exactly one block.
    ///
    /// # Errors
    /// I/O errors from the medium.
    pub fn create(&self, payload: &[u8]) -> Result<BlockId> {
        let chunks = self.split(payload);
        let blocks = self.allocate(chunks.len())?;
        let Some(id) = blocks.first().map(|block| block.id()) else {
            return Err(Error::invariant("record allocated without blocks"));
        };
        self.write_chain(blocks, &chunks)?;

        debug!(record = %id, bytes = payload.len(), blocks = chunks.len(), "created record");
        Ok(id)
    }

    /// Reserve a record id by allocating a single empty block.
    pub fn create_empty(&self) -> Result<BlockId> {
        self.create(&[])
    }

    /// Reserve an id, build the payload from it, then store the payload
    /// under that same id.
    ///
    /// Lets a payload embed its own record id.
    pub fn create_with<F>(&self, generator: F) -> Result<BlockId>
    where
        F: FnOnce(BlockId) -> Vec<u8>,
    {
        let id = self.create_empty()?;
        let payload = generator(id);
        self.update(id, &payload)
    }

    // ========================================================================
    // Read
    // ========================================================================

    /// Read a record's payload.
    ///
    /// # Errors
    /// - `Error::RecordNotFound` if `id` is past the end of the medium or
    ///   the record was deleted
    /// - `Error::InvariantViolation` if the chain is corrupt
    pub fn find(&self, id: BlockId) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        self.walk(id, |block| {
            let len = block.content_length()?;
            payload.extend_from_slice(block.read_content(0, len)?);
            Ok(())
        })?;
        Ok(payload)
    }

    /// Block ids of a record's chain, head first.
    pub fn chain(&self, id: BlockId) -> Result<Vec<BlockId>> {
        let mut ids = Vec::new();
        self.walk(id, |block| {
            ids.push(block.id());
            Ok(())
        })?;
        Ok(ids)
    }

    /// Head ids of all live records, ascending.
    ///
    /// A live block is a record head when no other live block links to it.
    /// Zero-filled blocks (e.g. padding) read as empty records. This scans
    /// the whole medium.
    pub fn record_ids(&self) -> Result<Vec<BlockId>> {
        let count = self.blocks.block_count();
        let slots = usize::try_from(count)
            .map_err(|_| Error::invariant(format!("{count} blocks cannot be indexed")))?;
        let mut live = vec![false; slots];
        let mut linked = vec![false; slots];

        for slot in 0..slots {
            let block = self.blocks.find(BlockId::new(slot as u64))?;
            if block.is_deleted() {
                continue;
            }
            live[slot] = true;
            if let Some(next) = block.next_block()? {
                if let Some(flag) = usize::try_from(next.0).ok().and_then(|n| linked.get_mut(n)) {
                    *flag = true;
                }
            }
        }

        Ok((0..slots)
            .filter(|&slot| live[slot] && !linked[slot])
            .map(|slot| BlockId::new(slot as u64))
            .collect())
    }

    // ========================================================================
    // Update / Delete
    // ========================================================================

    /// Replace a record's payload, keeping its id.
    ///
    /// The new tail is written first, then the head block is rewritten in
    /// place to point at it, and only then is the old tail marked deleted.
    /// If any step before the head write fails, the old payload is still
    /// intact. Returns the record id, which is always `id`.
    ///
    /// # Errors
    /// Same as [`find`](Self::find), plus I/O errors while writing.
    pub fn update(&self, id: BlockId, payload: &[u8]) -> Result<BlockId> {
        let old_chain = self.chain(id)?;
        let chunks = self.split(payload);
        let Some((first, rest)) = chunks.split_first() else {
            return Err(Error::invariant("payload split into no chunks"));
        };

        let tail = self.allocate(rest.len())?;
        let tail_head = tail.first().map(|block| block.id());
        self.write_chain(tail, rest)?;

        let mut head = self.blocks.find(id)?;
        head.set_next_block(tail_head)?;
        write_chunk(&mut head, first)?;
        head.release()?;

        for &old in &old_chain[1..] {
            let mut block = self.blocks.find(old)?;
            block.mark_deleted();
            block.release()?;
        }

        debug!(
            record = %id,
            bytes = payload.len(),
            freed = old_chain.len() - 1,
            blocks = chunks.len(),
            "updated record"
        );
        Ok(id)
    }

    /// Mark every block of a record deleted. Space is not reclaimed.
    ///
    /// # Errors
    /// Same as [`find`](Self::find); deleting twice fails with
    /// `Error::RecordNotFound`.
    ///
    /// The whole chain is validated before any block is marked, so a
    /// corrupt chain is left as it was.
    pub fn delete(&self, id: BlockId) -> Result<()> {
        let chain = self.chain(id)?;
        for &block_id in &chain {
            let mut block = self.blocks.find(block_id)?;
            block.mark_deleted();
            block.release()?;
        }

        debug!(record = %id, blocks = chain.len(), "deleted record");
        Ok(())
    }

    // ========================================================================
    // Chain helpers
    // ========================================================================

    /// Split a payload into per-block chunks. Always at least one chunk.
    fn split<'p>(&self, payload: &'p [u8]) -> Vec<&'p [u8]> {
        if payload.is_empty() {
            return vec![payload];
        }
        payload.chunks(self.blocks.content_size()).collect()
    }

    /// Grow the medium by `count` blocks.
    ///
    /// If growing fails partway, the blocks already allocated are marked
    /// deleted so they never read as records.
    fn allocate(&self, count: usize) -> Result<Vec<Block<'_, M>>> {
        let mut blocks = Vec::with_capacity(count);
        for _ in 0..count {
            match self.blocks.create_new() {
                Ok(block) => blocks.push(block),
                Err(e) => {
                    for block in &mut blocks {
                        block.mark_deleted();
                    }
                    return Err(e);
                }
            }
        }
        Ok(blocks)
    }

    /// Fill freshly allocated blocks with `chunks` and link them in order.
    fn write_chain(&self, blocks: Vec<Block<'_, M>>, chunks: &[&[u8]]) -> Result<()> {
        let next_ids: Vec<Option<BlockId>> = blocks
            .iter()
            .skip(1)
            .map(|block| Some(block.id()))
            .chain(std::iter::once(None))
            .collect();

        for ((mut block, chunk), next) in blocks.into_iter().zip(chunks).zip(next_ids) {
            block.set_next_block(next)?;
            write_chunk(&mut block, chunk)?;
            block.release()?;
        }
        Ok(())
    }

    /// Visit every block of a live record in chain order.
    ///
    /// Each handle is released before moving on, so writes made by `visit`
    /// are persisted and their errors propagated.
    fn walk<F>(&self, id: BlockId, mut visit: F) -> Result<()>
    where
        F: FnMut(&mut Block<'_, M>) -> Result<()>,
    {
        let mut block = self.blocks.find(id).map_err(|e| match e {
            Error::BlockNotFound(_) => Error::RecordNotFound(id),
            e => e,
        })?;
        if block.is_deleted() {
            return Err(Error::RecordNotFound(id));
        }

        let limit = self.blocks.block_count();
        let mut visited = 1u64;
        loop {
            let next = block.next_block()?;
            if next.is_some() && block.content_length()? != block.content_size() {
                return Err(Error::invariant(format!(
                    "{} in record {} is not full but has a successor",
                    block.id(),
                    id
                )));
            }

            visit(&mut block)?;

            let Some(next) = next else {
                return block.release();
            };
            if visited >= limit {
                return Err(Error::invariant(format!("record {id} has a cyclic chain")));
            }

            let from = block.id();
            let successor = self.blocks.find(next).map_err(|e| match e {
                Error::BlockNotFound(missing) => {
                    Error::invariant(format!("{from} links to missing {missing}"))
                }
                e => e,
            })?;
            if successor.is_deleted() {
                return Err(Error::invariant(format!(
                    "record {id} links to deleted {next}"
                )));
            }

            block.release()?;
            block = successor;
            visited += 1;
        }
    }
}

fn write_chunk<M: Medium>(block: &mut Block<'_, M>, chunk: &[u8]) -> Result<()> {
    block.write_content(0, chunk)?;
    block.set_content_length(chunk.len())
}
