//! B-tree nodes and the per-node steps of insert and delete.
//!
//! Everything here works on one node and, at most, its direct children.
//! The tree-level entry points live in [`super::tree`].

use std::cmp::Ordering;
use std::mem;

use crate::common::{Error, Result};

/// A B-tree node.
///
/// An internal node always has exactly `entries.len() + 1` children. Leaves
/// have none, which the variant encodes directly.
#[derive(Debug, Clone)]
pub(crate) enum Node<K, V> {
    Leaf(Vec<(K, V)>),
    Internal {
        entries: Vec<(K, V)>,
        children: Vec<Node<K, V>>,
    },
}

impl<K: Ord, V> Node<K, V> {
    pub(crate) fn new_leaf() -> Self {
        Node::Leaf(Vec::new())
    }

    pub(crate) fn entries(&self) -> &[(K, V)] {
        match self {
            Node::Leaf(entries) | Node::Internal { entries, .. } => entries,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries().len()
    }

    pub(crate) fn is_full(&self, t: usize) -> bool {
        self.len() >= 2 * t - 1
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub(crate) fn get(&self, key: &K) -> Option<&V> {
        match self {
            Node::Leaf(entries) => search(entries, key).ok().map(|i| &entries[i].1),
            Node::Internal { entries, children } => match search(entries, key) {
                Ok(i) => Some(&entries[i].1),
                Err(i) => children.get(i)?.get(key),
            },
        }
    }

    pub(crate) fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        match self {
            Node::Leaf(entries) => match search(entries, key) {
                Ok(i) => Some(&mut entries[i].1),
                Err(_) => None,
            },
            Node::Internal { entries, children } => match search(entries, key) {
                Ok(i) => Some(&mut entries[i].1),
                Err(i) => children.get_mut(i)?.get_mut(key),
            },
        }
    }

    // ========================================================================
    // Insert
    // ========================================================================

    /// Insert a key known to be absent into a node that is not full.
    ///
    /// Full children are split before descending into them, so a split
    /// never has to travel back up.
    pub(crate) fn insert_non_full(&mut self, key: K, value: V, t: usize) -> Result<()> {
        match self {
            Node::Leaf(entries) => {
                let i = entries.partition_point(|(k, _)| *k < key);
                entries.insert(i, (key, value));
                Ok(())
            }
            Node::Internal { entries, children } => {
                let mut i = entries.partition_point(|(k, _)| *k < key);
                if child_mut(children, i)?.is_full(t) {
                    split_child(entries, children, i, t)?;
                    if entries[i].0 < key {
                        i += 1;
                    }
                }
                child_mut(children, i)?.insert_non_full(key, value, t)
            }
        }
    }

    /// Split a full node at its median.
    ///
    /// `self` keeps the lower `t - 1` entries (and `t` children); the upper
    /// `t - 1` go to the returned sibling. The median is handed back for the
    /// parent.
    fn split(&mut self, t: usize) -> Result<((K, V), Node<K, V>)> {
        if self.len() != 2 * t - 1 {
            return Err(Error::invariant(format!(
                "split of a node with {} entries, expected {}",
                self.len(),
                2 * t - 1
            )));
        }

        match self {
            Node::Leaf(entries) => {
                let right = entries.split_off(t);
                let median = pop_median(entries)?;
                Ok((median, Node::Leaf(right)))
            }
            Node::Internal { entries, children } => {
                let right_entries = entries.split_off(t);
                let right_children = children.split_off(t);
                let median = pop_median(entries)?;
                Ok((
                    median,
                    Node::Internal {
                        entries: right_entries,
                        children: right_children,
                    },
                ))
            }
        }
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Remove `key` from the subtree rooted here.
    ///
    /// The caller guarantees this node holds at least `t` entries unless it
    /// is the root, so a child can always be topped up before descending.
    pub(crate) fn remove(&mut self, key: &K, t: usize) -> Result<Option<(K, V)>> {
        match self {
            Node::Leaf(entries) => Ok(search(entries, key).ok().map(|i| entries.remove(i))),
            Node::Internal { entries, children } => match search(entries, key) {
                Ok(i) => {
                    if child_mut(children, i)?.len() >= t {
                        let predecessor = children[i].remove_max(t)?;
                        Ok(Some(mem::replace(&mut entries[i], predecessor)))
                    } else if child_mut(children, i + 1)?.len() >= t {
                        let successor = children[i + 1].remove_min(t)?;
                        Ok(Some(mem::replace(&mut entries[i], successor)))
                    } else {
                        merge_children(entries, children, i)?;
                        children[i].remove(key, t)
                    }
                }
                Err(i) => {
                    let i = ensure_child_can_lose(entries, children, i, t)?;
                    children[i].remove(key, t)
                }
            },
        }
    }

    /// Remove and return the largest entry of the subtree.
    fn remove_max(&mut self, t: usize) -> Result<(K, V)> {
        match self {
            Node::Leaf(entries) => entries
                .pop()
                .ok_or_else(|| Error::invariant("remove_max on an empty leaf")),
            Node::Internal { entries, children } => {
                let last = children.len().saturating_sub(1);
                let i = ensure_child_can_lose(entries, children, last, t)?;
                children[i].remove_max(t)
            }
        }
    }

    /// Remove and return the smallest entry of the subtree.
    fn remove_min(&mut self, t: usize) -> Result<(K, V)> {
        match self {
            Node::Leaf(entries) => {
                if entries.is_empty() {
                    return Err(Error::invariant("remove_min on an empty leaf"));
                }
                Ok(entries.remove(0))
            }
            Node::Internal { entries, children } => {
                let i = ensure_child_can_lose(entries, children, 0, t)?;
                children[i].remove_min(t)
            }
        }
    }

    // ========================================================================
    // Sibling transfers
    // ========================================================================

    fn pop_first(&mut self) -> Result<((K, V), Option<Node<K, V>>)> {
        if self.entries().is_empty() {
            return Err(Error::invariant("borrow from an empty sibling"));
        }
        Ok(match self {
            Node::Leaf(entries) => (entries.remove(0), None),
            Node::Internal { entries, children } => (entries.remove(0), Some(children.remove(0))),
        })
    }

    fn pop_last(&mut self) -> Result<((K, V), Option<Node<K, V>>)> {
        let empty = || Error::invariant("borrow from an empty sibling");
        match self {
            Node::Leaf(entries) => Ok((entries.pop().ok_or_else(empty)?, None)),
            Node::Internal { entries, children } => {
                let entry = entries.pop().ok_or_else(empty)?;
                Ok((entry, children.pop()))
            }
        }
    }

    fn push_first(&mut self, entry: (K, V), child: Option<Node<K, V>>) -> Result<()> {
        match (self, child) {
            (Node::Leaf(entries), None) => entries.insert(0, entry),
            (Node::Internal { entries, children }, Some(child)) => {
                entries.insert(0, entry);
                children.insert(0, child);
            }
            _ => return Err(Error::invariant("sibling nodes at different depths")),
        }
        Ok(())
    }

    fn push_last(&mut self, entry: (K, V), child: Option<Node<K, V>>) -> Result<()> {
        match (self, child) {
            (Node::Leaf(entries), None) => entries.push(entry),
            (Node::Internal { entries, children }, Some(child)) => {
                entries.push(entry);
                children.push(child);
            }
            _ => return Err(Error::invariant("sibling nodes at different depths")),
        }
        Ok(())
    }

    /// Append `separator` and all of `right` to this node.
    fn absorb(&mut self, separator: (K, V), right: Node<K, V>) -> Result<()> {
        match (self, right) {
            (Node::Leaf(entries), Node::Leaf(right_entries)) => {
                entries.push(separator);
                entries.extend(right_entries);
            }
            (
                Node::Internal { entries, children },
                Node::Internal {
                    entries: right_entries,
                    children: right_children,
                },
            ) => {
                entries.push(separator);
                entries.extend(right_entries);
                children.extend(right_children);
            }
            _ => return Err(Error::invariant("merge of nodes at different depths")),
        }
        Ok(())
    }
}

// ============================================================================
// Parent-level helpers
// ============================================================================

fn search<K: Ord, V>(entries: &[(K, V)], key: &K) -> std::result::Result<usize, usize> {
    entries.binary_search_by(|(k, _)| k.cmp(key))
}

fn child_mut<K, V>(children: &mut [Node<K, V>], i: usize) -> Result<&mut Node<K, V>> {
    let count = children.len();
    children
        .get_mut(i)
        .ok_or_else(|| Error::invariant(format!("child {i} of {count} requested")))
}

fn pop_median<K, V>(entries: &mut Vec<(K, V)>) -> Result<(K, V)> {
    entries
        .pop()
        .ok_or_else(|| Error::invariant("split of an empty node"))
}

/// Split the full child `i`, promoting its median to `entries[i]`.
pub(crate) fn split_child<K: Ord, V>(
    entries: &mut Vec<(K, V)>,
    children: &mut Vec<Node<K, V>>,
    i: usize,
    t: usize,
) -> Result<()> {
    let (median, right) = child_mut(children, i)?.split(t)?;
    entries.insert(i, median);
    children.insert(i + 1, right);
    Ok(())
}

/// Make sure child `i` holds at least `t` entries before a delete descends
/// into it. Returns the index of the child to descend into, which moves
/// left by one when the child is merged into its left sibling.
///
/// In order of preference:
/// 1. rotate an entry in from the left sibling
/// 2. rotate an entry in from the right sibling
/// 3. merge with the right sibling
/// 4. merge with the left sibling
fn ensure_child_can_lose<K: Ord, V>(
    entries: &mut Vec<(K, V)>,
    children: &mut Vec<Node<K, V>>,
    i: usize,
    t: usize,
) -> Result<usize> {
    if child_mut(children, i)?.len() >= t {
        return Ok(i);
    }

    let has_left = i > 0;
    let has_right = i + 1 < children.len();

    if has_left && children[i - 1].len() >= t {
        rotate_right(entries, children, i - 1)?;
        Ok(i)
    } else if has_right && children[i + 1].len() >= t {
        rotate_left(entries, children, i)?;
        Ok(i)
    } else if has_right {
        merge_children(entries, children, i)?;
        Ok(i)
    } else if has_left {
        merge_children(entries, children, i - 1)?;
        Ok(i - 1)
    } else {
        Err(Error::invariant("internal node with a single child"))
    }
}

/// Move the last entry of child `i` up into `entries[i]`, and the old
/// separator down to the front of child `i + 1`.
fn rotate_right<K: Ord, V>(
    entries: &mut [(K, V)],
    children: &mut [Node<K, V>],
    i: usize,
) -> Result<()> {
    let (left, right) = sibling_pair(children, i)?;
    let (entry, child) = left.pop_last()?;
    let separator = mem::replace(&mut entries[i], entry);
    right.push_first(separator, child)
}

/// Move the first entry of child `i + 1` up into `entries[i]`, and the old
/// separator down to the end of child `i`.
fn rotate_left<K: Ord, V>(
    entries: &mut [(K, V)],
    children: &mut [Node<K, V>],
    i: usize,
) -> Result<()> {
    let (left, right) = sibling_pair(children, i)?;
    let (entry, child) = right.pop_first()?;
    let separator = mem::replace(&mut entries[i], entry);
    left.push_last(separator, child)
}

/// Merge child `i + 1` and separator `entries[i]` into child `i`.
fn merge_children<K: Ord, V>(
    entries: &mut Vec<(K, V)>,
    children: &mut Vec<Node<K, V>>,
    i: usize,
) -> Result<()> {
    if i + 1 >= children.len() || i >= entries.len() {
        return Err(Error::invariant(format!(
            "merge of child {i} with no right sibling"
        )));
    }
    let separator = entries.remove(i);
    let right = children.remove(i + 1);
    children[i].absorb(separator, right)
}

fn sibling_pair<K, V>(
    children: &mut [Node<K, V>],
    i: usize,
) -> Result<(&mut Node<K, V>, &mut Node<K, V>)> {
    if i + 1 >= children.len() {
        return Err(Error::invariant(format!("child {i} has no right sibling")));
    }
    let (head, tail) = children.split_at_mut(i + 1);
    Ok((&mut head[i], &mut tail[0]))
}

// ============================================================================
// Validation
// ============================================================================

/// Check the subtree rooted at `node` and return its height.
pub(crate) fn check<K: Ord, V>(
    node: &Node<K, V>,
    t: usize,
    is_root: bool,
    lower: Option<&K>,
    upper: Option<&K>,
) -> Result<usize> {
    let entries = node.entries();
    let max = 2 * t - 1;

    if entries.len() > max {
        return Err(Error::invariant(format!(
            "node holds {} entries, max is {max}",
            entries.len()
        )));
    }
    if !is_root && entries.len() < t - 1 {
        return Err(Error::invariant(format!(
            "non-root node holds {} entries, min is {}",
            entries.len(),
            t - 1
        )));
    }
    if entries.windows(2).any(|w| w[0].0.cmp(&w[1].0) != Ordering::Less) {
        return Err(Error::invariant("node keys are not strictly ascending"));
    }
    let below = |k: &K| lower.is_some_and(|lo| k <= lo);
    let above = |k: &K| upper.is_some_and(|hi| k >= hi);
    if entries.iter().any(|(k, _)| below(k) || above(k)) {
        return Err(Error::invariant("key outside its subtree bounds"));
    }

    match node {
        Node::Leaf(_) => Ok(1),
        Node::Internal { children, .. } => {
            if entries.is_empty() {
                return Err(Error::invariant("internal node without entries"));
            }
            if children.len() != entries.len() + 1 {
                return Err(Error::invariant(format!(
                    "internal node has {} entries but {} children",
                    entries.len(),
                    children.len()
                )));
            }

            let mut height = None;
            for (j, child) in children.iter().enumerate() {
                let lo = if j == 0 { lower } else { Some(&entries[j - 1].0) };
                let hi = entries.get(j).map(|(k, _)| k).or(upper);
                let h = check(child, t, false, lo, hi)?;
                match height {
                    None => height = Some(h),
                    Some(expected) if expected != h => {
                        return Err(Error::invariant("leaves at different depths"));
                    }
                    Some(_) => {}
                }
            }
            Ok(height.unwrap_or(0) + 1)
        }
    }
}
