//! Block store I/O statistics.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters tracked by a [`BlockStore`](super::BlockStore).
///
/// Relaxed atomics: counters are independent and only need to be exact
/// once the operations that bumped them have returned.
///
/// # Example
/// ```
/// use chainstore::storage::BlockStoreStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = BlockStoreStats::new();
/// stats.blocks_read.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.snapshot().blocks_read, 1);
/// ```
#[derive(Debug, Default)]
pub struct BlockStoreStats {
    /// Blocks loaded from the medium into a handle.
    pub blocks_read: AtomicU64,

    /// Dirty blocks written back to the medium.
    pub blocks_written: AtomicU64,

    /// Blocks appended to the medium.
    pub blocks_allocated: AtomicU64,
}

impl BlockStoreStats {
    /// Create a new stats tracker with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a point-in-time copy of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            blocks_read: self.blocks_read.load(Ordering::Relaxed),
            blocks_written: self.blocks_written.load(Ordering::Relaxed),
            blocks_allocated: self.blocks_allocated.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.blocks_read.store(0, Ordering::Relaxed);
        self.blocks_written.store(0, Ordering::Relaxed);
        self.blocks_allocated.store(0, Ordering::Relaxed);
    }

    pub(crate) fn record_read(&self) {
        self.blocks_read.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self) {
        self.blocks_written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_allocation(&self) {
        self.blocks_allocated.fetch_add(1, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of block store statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub blocks_read: u64,
    pub blocks_written: u64,
    pub blocks_allocated: u64,
}

impl StatsSnapshot {
    /// Counter-wise difference `self - earlier`.
    pub fn since(&self, earlier: &StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            blocks_read: self.blocks_read.saturating_sub(earlier.blocks_read),
            blocks_written: self.blocks_written.saturating_sub(earlier.blocks_written),
            blocks_allocated: self
                .blocks_allocated
                .saturating_sub(earlier.blocks_allocated),
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ read: {}, written: {}, allocated: {} }}",
            self.blocks_read, self.blocks_written, self.blocks_allocated
        )
    }
}
