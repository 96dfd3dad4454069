//! Engine - record store and index composed behind one API.
//!
//! The engine is what a domain layer talks to: records go to the block
//! medium, keys go to the in-memory index, and the caller decides which key
//! points at which record.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::common::{BlockId, Config, Result};
use crate::index::{BTreeIndex, RangeDirection};
use crate::record::RecordStore;
use crate::storage::{BlockStore, Medium};

/// A record store paired with a B-tree index over record ids.
///
/// The index lives only in memory. After reopening a medium it starts
/// empty; call [`rebuild_index`](Self::rebuild_index) to repopulate it from
/// the stored records.
///
/// # Example
/// ```
/// use chainstore::{Config, Engine, RangeDirection};
/// use chainstore::storage::MemoryMedium;
///
/// let mut engine: Engine<u32, _> =
///     Engine::with_medium(MemoryMedium::new(), &Config::default()).unwrap();
///
/// let id = engine.create_record(b"Monza").unwrap();
/// engine.index_insert(7, id).unwrap();
///
/// assert_eq!(engine.index_get(&7), Some(id));
/// assert_eq!(engine.read_record(id).unwrap(), b"Monza");
/// assert_eq!(engine.index_range(RangeDirection::GreaterThanOrEqual, &0), vec![(7, id)]);
/// ```
pub struct Engine<K, M: Medium = File> {
    records: RecordStore<M>,
    index: BTreeIndex<K, BlockId>,
}

impl<K: Ord> Engine<K, File> {
    /// Open a store file, creating it if missing. The index starts empty.
    ///
    /// # Errors
    /// I/O errors, or `Error::InvalidConfig`.
    pub fn open<P: AsRef<Path>>(path: P, config: &Config) -> Result<Self> {
        let blocks = BlockStore::open_or_create(&path, config)?;
        info!(
            path = %path.as_ref().display(),
            blocks = blocks.block_count(),
            "opened engine"
        );
        Ok(Self {
            records: RecordStore::new(blocks),
            index: BTreeIndex::from_config(config)?,
        })
    }
}

impl<K: Ord, M: Medium> Engine<K, M> {
    /// Build an engine over any medium. The index starts empty.
    pub fn with_medium(medium: M, config: &Config) -> Result<Self> {
        Ok(Self {
            records: RecordStore::new(BlockStore::with_medium(medium, config)?),
            index: BTreeIndex::from_config(config)?,
        })
    }

    // ========================================================================
    // Records
    // ========================================================================

    pub fn create_record(&mut self, payload: &[u8]) -> Result<BlockId> {
        self.records.create(payload)
    }

    /// Reserve an id and build the payload from it. See
    /// [`RecordStore::create_with`].
    pub fn create_record_with<F>(&mut self, generator: F) -> Result<BlockId>
    where
        F: FnOnce(BlockId) -> Vec<u8>,
    {
        self.records.create_with(generator)
    }

    pub fn read_record(&self, id: BlockId) -> Result<Vec<u8>> {
        self.records.find(id)
    }

    /// Replace a record's payload. The returned id is the one to use from
    /// now on; it currently always equals `id`.
    pub fn update_record(&mut self, id: BlockId, payload: &[u8]) -> Result<BlockId> {
        self.records.update(id, payload)
    }

    /// Delete a record. Index entries pointing at it are left to the caller.
    pub fn delete_record(&mut self, id: BlockId) -> Result<()> {
        self.records.delete(id)
    }

    // ========================================================================
    // Index
    // ========================================================================

    /// Map `key` to `id`, returning the id it previously mapped to.
    pub fn index_insert(&mut self, key: K, id: BlockId) -> Result<Option<BlockId>> {
        self.index.insert(key, id)
    }

    pub fn index_get(&self, key: &K) -> Option<BlockId> {
        self.index.get(key).ok().copied()
    }

    /// Entries on the `direction` side of `bound`, ascending by key.
    pub fn index_range(&self, direction: RangeDirection, bound: &K) -> Vec<(K, BlockId)>
    where
        K: Clone,
    {
        self.index
            .scan(direction, bound)
            .into_iter()
            .map(|(key, id)| (key.clone(), *id))
            .collect()
    }

    pub fn index_delete(&mut self, key: &K) -> Result<bool> {
        self.index.delete(key)
    }

    /// Rebuild the index from every live record on the medium.
    ///
    /// `key_of` maps a record to its key, or `None` to leave it out. This
    /// reads the entire medium, so its cost grows with the store size, not
    /// the index size. Returns the number of records indexed.
    pub fn rebuild_index<F>(&mut self, mut key_of: F) -> Result<usize>
    where
        F: FnMut(BlockId, &[u8]) -> Option<K>,
    {
        let mut index = BTreeIndex::try_new(self.index.min_degree())?;
        for id in self.records.record_ids()? {
            let payload = self.records.find(id)?;
            if let Some(key) = key_of(id, &payload) {
                index.insert(key, id)?;
            }
        }

        debug!(
            indexed = index.len(),
            blocks = self.records.block_store().block_count(),
            "rebuilt index"
        );
        self.index = index;
        Ok(self.index.len())
    }

    /// Sync the medium.
    pub fn flush(&self) -> Result<()> {
        self.records.block_store().flush()
    }

    pub fn records(&self) -> &RecordStore<M> {
        &self.records
    }

    pub fn index(&self) -> &BTreeIndex<K, BlockId> {
        &self.index
    }
}

/// An [`Engine`] behind an exclusive lock, for use from several threads.
///
/// Each call to [`with`](Self::with) runs one logical operation with the
/// engine locked, so operations never interleave.
pub struct SharedEngine<K, M: Medium = File> {
    inner: Arc<Mutex<Engine<K, M>>>,
}

impl<K, M: Medium> SharedEngine<K, M> {
    pub fn new(engine: Engine<K, M>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut Engine<K, M>) -> R) -> R {
        let mut engine = self.inner.lock();
        f(&mut engine)
    }

    /// Take the engine back if this is the last handle.
    pub fn try_into_inner(self) -> std::result::Result<Engine<K, M>, Self> {
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| Self { inner })
    }
}

impl<K, M: Medium> Clone for SharedEngine<K, M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
