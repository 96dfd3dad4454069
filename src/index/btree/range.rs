//! Ordered range collection over a B-tree.

use std::ops::{Bound, RangeBounds};

use super::node::Node;

/// Direction of a one-sided range scan relative to its bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeDirection {
    /// Keys strictly below the bound.
    LessThan,
    /// Keys at or below the bound.
    LessThanOrEqual,
    /// Keys strictly above the bound.
    GreaterThan,
    /// Keys at or above the bound.
    GreaterThanOrEqual,
}

impl RangeDirection {
    pub const ALL: [RangeDirection; 4] = [
        RangeDirection::LessThan,
        RangeDirection::LessThanOrEqual,
        RangeDirection::GreaterThan,
        RangeDirection::GreaterThanOrEqual,
    ];

    /// The `(start, end)` bounds this direction selects around `bound`.
    pub fn bounds<K>(self, bound: &K) -> (Bound<&K>, Bound<&K>) {
        match self {
            RangeDirection::LessThan => (Bound::Unbounded, Bound::Excluded(bound)),
            RangeDirection::LessThanOrEqual => (Bound::Unbounded, Bound::Included(bound)),
            RangeDirection::GreaterThan => (Bound::Excluded(bound), Bound::Unbounded),
            RangeDirection::GreaterThanOrEqual => (Bound::Included(bound), Bound::Unbounded),
        }
    }

    /// Whether `key` falls on the selected side of `bound`.
    pub fn matches<K: Ord>(self, key: &K, bound: &K) -> bool {
        match self {
            RangeDirection::LessThan => key < bound,
            RangeDirection::LessThanOrEqual => key <= bound,
            RangeDirection::GreaterThan => key > bound,
            RangeDirection::GreaterThanOrEqual => key >= bound,
        }
    }
}

/// Append every entry of `node`'s subtree inside `range` to `out`, in
/// ascending key order.
///
/// Only children that can overlap the range are visited: in a node whose
/// in-range entries are `lo..hi`, that is children `lo..=hi`.
pub(crate) fn collect<'a, K, V, R>(node: &'a Node<K, V>, range: &R, out: &mut Vec<(&'a K, &'a V)>)
where
    K: Ord,
    R: RangeBounds<K>,
{
    let entries = node.entries();
    let lo = entries.partition_point(|(k, _)| below_start(range, k));
    let hi = entries.partition_point(|(k, _)| !above_end(range, k));
    if lo > hi {
        return;
    }

    match node {
        Node::Leaf(_) => out.extend(entries[lo..hi].iter().map(|(k, v)| (k, v))),
        Node::Internal { children, .. } => {
            for j in lo..=hi {
                if let Some(child) = children.get(j) {
                    collect(child, range, out);
                }
                if j < hi {
                    let (k, v) = &entries[j];
                    out.push((k, v));
                }
            }
        }
    }
}

fn below_start<K: Ord, R: RangeBounds<K>>(range: &R, key: &K) -> bool {
    match range.start_bound() {
        Bound::Included(start) => key < start,
        Bound::Excluded(start) => key <= start,
        Bound::Unbounded => false,
    }
}

fn above_end<K: Ord, R: RangeBounds<K>>(range: &R, key: &K) -> bool {
    match range.end_bound() {
        Bound::Included(end) => key > end,
        Bound::Excluded(end) => key >= end,
        Bound::Unbounded => false,
    }
}
