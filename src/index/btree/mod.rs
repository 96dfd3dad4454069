//! B-tree index.
//!
//! Nodes are owned values (`Vec` of entries plus `Vec` of children), so the
//! tree is a plain ownership hierarchy with no parent links. Both insert and
//! delete work top-down in a single pass: full children are split and
//! minimal children are topped up before descending.

mod node;
mod range;
mod tree;

pub use range::RangeDirection;
pub use tree::BTreeIndex;
