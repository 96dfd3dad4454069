//! In-memory B-tree index.

use std::mem;
use std::ops::RangeBounds;

use tracing::trace;

use super::node::{self, Node};
use super::range::{self, RangeDirection};
use crate::common::config::DEFAULT_MIN_DEGREE;
use crate::common::{Config, Error, Result};

/// Balanced ordered map from keys to values, parameterized by its minimum
/// degree `t`.
///
/// Every node holds at most `2t - 1` entries and every node but the root at
/// least `t - 1`. All leaves sit at the same depth. The tree grows in height
/// only when the root splits and shrinks only when the root empties.
///
/// Inserting a key that is already present overwrites its value.
///
/// # Example
/// ```
/// use chainstore::index::BTreeIndex;
///
/// let mut index = BTreeIndex::new(3);
/// for key in [10, 20, 5, 6, 12, 30, 7, 17] {
///     index.insert(key, key * 100).unwrap();
/// }
///
/// assert_eq!(index.get(&6).unwrap(), &600);
/// let below: Vec<i32> = index.less_than(&12).into_iter().map(|(k, _)| *k).collect();
/// assert_eq!(below, vec![5, 6, 7, 10]);
/// ```
#[derive(Debug, Clone)]
pub struct BTreeIndex<K, V> {
    root: Node<K, V>,
    min_degree: usize,
    len: usize,
}

impl<K: Ord, V> BTreeIndex<K, V> {
    /// Create an empty index with minimum degree `t`.
    ///
    /// Use [`try_new`](Self::try_new) or [`from_config`](Self::from_config)
    /// when the degree comes from user input.
    ///
    /// # Panics
    /// If `t < 2`. This is the only panicking constructor.
    pub fn new(min_degree: usize) -> Self {
        assert!(min_degree >= 2, "B-tree minimum degree must be at least 2");
        Self::empty(min_degree)
    }

    /// Create an empty index with minimum degree `t`.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if `t < 2`.
    pub fn try_new(min_degree: usize) -> Result<Self> {
        if min_degree < 2 {
            return Err(Error::InvalidConfig(format!(
                "min_degree must be at least 2, got {min_degree}"
            )));
        }
        Ok(Self::empty(min_degree))
    }

    /// Create an empty index using `config.min_degree`.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if the minimum degree is below 2.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::try_new(config.min_degree)
    }

    fn empty(min_degree: usize) -> Self {
        Self {
            root: Node::new_leaf(),
            min_degree,
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn min_degree(&self) -> usize {
        self.min_degree
    }

    /// Number of levels, 1 for a lone root leaf.
    pub fn height(&self) -> usize {
        let mut height = 1;
        let mut node = &self.root;
        while let Node::Internal { children, .. } = node {
            match children.first() {
                Some(child) => node = child,
                None => break,
            }
            height += 1;
        }
        height
    }

    // ========================================================================
    // Point operations
    // ========================================================================

    /// Insert or overwrite a key. Returns the previous value, if any.
    ///
    /// # Errors
    /// `Error::InvariantViolation` if the tree is found corrupt mid-insert.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        if let Some(slot) = self.root.get_mut(&key) {
            return Ok(Some(mem::replace(slot, value)));
        }

        let t = self.min_degree;
        if self.root.is_full(t) {
            let old_root = mem::replace(&mut self.root, Node::new_leaf());
            let mut entries = Vec::with_capacity(2 * t - 1);
            let mut children = vec![old_root];
            node::split_child(&mut entries, &mut children, 0, t)?;
            self.root = Node::Internal { entries, children };
            trace!(height = self.height(), "split root");
        }

        self.root.insert_non_full(key, value, t)?;
        self.len += 1;
        Ok(None)
    }

    /// Look up a key.
    ///
    /// # Errors
    /// `Error::KeyNotFound` if the key is absent.
    pub fn get(&self, key: &K) -> Result<&V> {
        self.root.get(key).ok_or(Error::KeyNotFound)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.root.get(key).is_some()
    }

    /// Remove a key, returning its value if it was present.
    ///
    /// Children are topped up (by rotation or merge) on the way down, so
    /// the removal itself never underflows a node. If the root is left
    /// without entries its only child becomes the new root.
    ///
    /// # Errors
    /// `Error::InvariantViolation` if the tree is found corrupt.
    pub fn remove(&mut self, key: &K) -> Result<Option<V>> {
        let removed = self.root.remove(key, self.min_degree)?;

        let collapsed = match &mut self.root {
            Node::Internal { entries, children } if entries.is_empty() => children.pop(),
            _ => None,
        };
        if let Some(child) = collapsed {
            self.root = child;
            trace!(height = self.height(), "collapsed root");
        }

        Ok(removed.map(|(_, value)| {
            self.len -= 1;
            value
        }))
    }

    /// Remove a key, reporting whether it was present.
    pub fn delete(&mut self, key: &K) -> Result<bool> {
        Ok(self.remove(key)?.is_some())
    }

    // ========================================================================
    // Range scans
    // ========================================================================

    /// All entries with keys within `bounds`, ascending.
    pub fn range<R: RangeBounds<K>>(&self, bounds: R) -> Vec<(&K, &V)> {
        let mut out = Vec::new();
        range::collect(&self.root, &bounds, &mut out);
        out
    }

    /// Entries on the `direction` side of `bound`, ascending.
    pub fn scan(&self, direction: RangeDirection, bound: &K) -> Vec<(&K, &V)> {
        self.range(direction.bounds(bound))
    }

    pub fn less_than(&self, bound: &K) -> Vec<(&K, &V)> {
        self.scan(RangeDirection::LessThan, bound)
    }

    pub fn less_than_or_equal(&self, bound: &K) -> Vec<(&K, &V)> {
        self.scan(RangeDirection::LessThanOrEqual, bound)
    }

    pub fn greater_than(&self, bound: &K) -> Vec<(&K, &V)> {
        self.scan(RangeDirection::GreaterThan, bound)
    }

    pub fn greater_than_or_equal(&self, bound: &K) -> Vec<(&K, &V)> {
        self.scan(RangeDirection::GreaterThanOrEqual, bound)
    }

    /// Every entry, ascending.
    pub fn iter(&self) -> std::vec::IntoIter<(&K, &V)> {
        self.range(..).into_iter()
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Check ordering, node occupancy, child counts and leaf depth across
    /// the whole tree.
    ///
    /// # Errors
    /// `Error::InvariantViolation` describing the first broken invariant.
    pub fn validate(&self) -> Result<()> {
        node::check(&self.root, self.min_degree, true, None, None)?;

        let counted = self.range(..).len();
        if counted != self.len {
            return Err(Error::invariant(format!(
                "index tracks {} entries but holds {counted}",
                self.len
            )));
        }
        Ok(())
    }
}

impl<K: Ord, V> Default for BTreeIndex<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_DEGREE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys<V>(entries: Vec<(&i32, &V)>) -> Vec<i32> {
        entries.into_iter().map(|(k, _)| *k).collect()
    }

    fn sample_tree() -> BTreeIndex<i32, i32> {
        let mut index = BTreeIndex::new(3);
        for key in [10, 20, 5, 6, 12, 30, 7, 17] {
            index.insert(key, key * 100).unwrap();
        }
        index
    }

    /// Keys 0..n inserted in a scrambled but deterministic order.
    fn scrambled(n: i32) -> Vec<i32> {
        let mut keys: Vec<i32> = (0..n).collect();
        let mut state = 0x2545_f491_u32;
        for i in (1..keys.len()).rev() {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            keys.swap(i, state as usize % (i + 1));
        }
        keys
    }

    // --- insert / get ---

    #[test]
    fn test_new_tree_is_empty() {
        let index: BTreeIndex<i32, i32> = BTreeIndex::default();
        assert!(index.is_empty());
        assert_eq!(index.height(), 1);
        assert_eq!(index.min_degree(), 3);
        assert!(matches!(index.get(&1), Err(Error::KeyNotFound)));
    }

    #[test]
    #[should_panic]
    fn test_min_degree_below_two_panics() {
        let _index: BTreeIndex<i32, i32> = BTreeIndex::new(1);
    }

    #[test]
    fn test_try_new_rejects_small_degree() {
        for degree in [0, 1] {
            assert!(matches!(
                BTreeIndex::<i32, i32>::try_new(degree),
                Err(Error::InvalidConfig(_))
            ));
        }
        let index = BTreeIndex::<i32, i32>::try_new(2).unwrap();
        assert_eq!(index.min_degree(), 2);
        assert!(index.is_empty());
    }

    #[test]
    fn test_from_config_rejects_small_degree() {
        let config = Config::builder().min_degree(1).build();
        assert!(matches!(
            BTreeIndex::<i32, i32>::from_config(&config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_sample_lookup() {
        let index = sample_tree();

        assert_eq!(index.len(), 8);
        assert_eq!(index.get(&6).unwrap(), &600);
        assert_eq!(index.get(&17).unwrap(), &1700);
        assert!(matches!(index.get(&8), Err(Error::KeyNotFound)));
        index.validate().unwrap();
    }

    #[test]
    fn test_root_split_grows_height() {
        let mut index = BTreeIndex::new(3);
        for key in 1..=5 {
            index.insert(key, ()).unwrap();
        }
        assert_eq!(index.height(), 1);

        index.insert(6, ()).unwrap();
        assert_eq!(index.height(), 2);
        index.validate().unwrap();
    }

    #[test]
    fn test_duplicate_insert_overwrites() {
        let mut index = sample_tree();

        let previous = index.insert(12, -1).unwrap();

        assert_eq!(previous, Some(1200));
        assert_eq!(index.get(&12).unwrap(), &-1);
        assert_eq!(index.len(), 8);
    }

    #[test]
    fn test_many_inserts_stay_balanced() {
        for t in [2, 3, 5] {
            let mut index = BTreeIndex::new(t);
            for key in scrambled(500) {
                index.insert(key, key).unwrap();
            }
            index.validate().unwrap();
            assert_eq!(index.len(), 500);
            assert_eq!(keys(index.iter().collect()), (0..500).collect::<Vec<_>>());
        }
    }

    // --- range scans ---

    #[test]
    fn test_less_than_sample() {
        let index = sample_tree();
        assert_eq!(keys(index.less_than(&12)), vec![5, 6, 7, 10]);
    }

    #[test]
    fn test_directional_scans() {
        let index = sample_tree();

        assert_eq!(keys(index.less_than_or_equal(&12)), vec![5, 6, 7, 10, 12]);
        assert_eq!(keys(index.greater_than(&12)), vec![17, 20, 30]);
        assert_eq!(keys(index.greater_than_or_equal(&12)), vec![12, 17, 20, 30]);
        assert_eq!(keys(index.greater_than_or_equal(&5)).len(), 8);
        assert!(index.less_than(&5).is_empty());
        assert!(index.greater_than(&30).is_empty());
    }

    #[test]
    fn test_scan_bound_not_present() {
        let index = sample_tree();

        assert_eq!(keys(index.less_than(&11)), vec![5, 6, 7, 10]);
        assert_eq!(keys(index.greater_than(&11)), vec![12, 17, 20, 30]);
    }

    #[test]
    fn test_scan_matches_filter() {
        let mut index = BTreeIndex::new(2);
        for key in scrambled(200) {
            index.insert(key * 2, ()).unwrap();
        }

        for direction in RangeDirection::ALL {
            for bound in [-1, 0, 57, 100, 199, 398, 400] {
                let expected: Vec<i32> = (0..200)
                    .map(|k| k * 2)
                    .filter(|k| direction.matches(k, &bound))
                    .collect();
                assert_eq!(keys(index.scan(direction, &bound)), expected);
            }
        }
    }

    #[test]
    fn test_general_range() {
        let index = sample_tree();

        assert_eq!(keys(index.range(6..17)), vec![6, 7, 10, 12]);
        assert_eq!(keys(index.range(6..=17)), vec![6, 7, 10, 12, 17]);
        assert_eq!(keys(index.range(..)).len(), 8);
    }

    // --- delete ---

    #[test]
    fn test_delete_from_leaf() {
        let mut index = sample_tree();

        assert_eq!(index.remove(&30).unwrap(), Some(3000));
        assert!(matches!(index.get(&30), Err(Error::KeyNotFound)));
        assert_eq!(index.len(), 7);
        index.validate().unwrap();
    }

    #[test]
    fn test_delete_missing_key() {
        let mut index = sample_tree();

        assert!(!index.delete(&99).unwrap());
        assert_eq!(index.len(), 8);
        index.validate().unwrap();
    }

    #[test]
    fn test_delete_internal_keys() {
        let mut index = BTreeIndex::new(2);
        for key in 0..50 {
            index.insert(key, key).unwrap();
        }
        assert!(index.height() > 2);

        // separators of the root and its children are internal entries
        for key in [25, 12, 37, 6, 18, 31, 43] {
            if index.contains_key(&key) {
                assert_eq!(index.remove(&key).unwrap(), Some(key));
                index.validate().unwrap();
            }
        }
    }

    #[test]
    fn test_delete_everything_collapses_root() {
        let mut index = BTreeIndex::new(3);
        let keys = scrambled(300);
        for &key in &keys {
            index.insert(key, key).unwrap();
        }
        assert!(index.height() > 1);

        for (removed, &key) in keys.iter().rev().enumerate() {
            assert!(index.delete(&key).unwrap());
            index.validate().unwrap();
            assert_eq!(index.len(), keys.len() - removed - 1);
        }

        assert!(index.is_empty());
        assert_eq!(index.height(), 1);
    }

    #[test]
    fn test_delete_checks_every_key_after_each_step() {
        let mut index = BTreeIndex::new(2);
        let keys = scrambled(120);
        for &key in &keys {
            index.insert(key, key).unwrap();
        }

        let mut order = scrambled(120);
        order.rotate_left(37);
        for (i, key) in order.iter().enumerate() {
            index.delete(key).unwrap();
            for gone in &order[..=i] {
                assert!(index.get(gone).is_err());
            }
            for kept in &order[i + 1..] {
                assert_eq!(index.get(kept).unwrap(), kept);
            }
        }
    }

    #[test]
    fn test_reinsert_after_delete() {
        let mut index = sample_tree();
        index.delete(&10).unwrap();
        index.insert(10, 1).unwrap();

        assert_eq!(index.get(&10).unwrap(), &1);
        assert_eq!(keys(index.less_than(&12)), vec![5, 6, 7, 10]);
        index.validate().unwrap();
    }
}
