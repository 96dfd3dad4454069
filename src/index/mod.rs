//! Index structures.
//!
//! - [`BTreeIndex`] - In-memory B-tree mapping ordered keys to values

pub mod btree;

pub use btree::{BTreeIndex, RangeDirection};
