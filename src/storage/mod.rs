//! Storage layer - block I/O over a backing medium.
//!
//! This module handles persistent storage:
//! - [`Medium`] - Byte-addressable backing resource (file or memory)
//! - [`BlockStore`] - Fixed-size block allocation and lookup
//! - [`Block`] - Scoped handle with dirty tracking and write-back
//! - [`BlockStoreStats`] - I/O counters

pub mod block;
mod block_store;
mod medium;
mod stats;

pub use block::{Block, BlockLayout, HeaderField, NO_NEXT_BLOCK};
pub use block_store::BlockStore;
pub use medium::{Medium, MemoryMedium};
pub use stats::{BlockStoreStats, StatsSnapshot};
