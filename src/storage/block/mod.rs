//! Block handle and header layout.
//!
//! This module contains:
//! - [`Block`] - Scoped handle over one block's bytes (write-back on release)
//! - [`HeaderField`] - The public 64-bit header fields
//! - [`BlockLayout`] - Header/content split and checksum sealing

#[allow(clippy::module_inception)]
mod block;
mod header;

pub use block::Block;
pub use header::{decode_next, encode_next, BlockLayout, HeaderField, NO_NEXT_BLOCK};
