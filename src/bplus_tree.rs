use alloc::vec::Vec;
use core::fmt;

use crate::error::Result;
use crate::order::Order;
use crate::raw::RawBPlusTree;

mod iter;

pub use iter::{Iter, Range};

/// An ordered index from `i64` keys to `f64` values, stored as a B+ tree.
///
/// Records live only in the leaves, which are chained in key order so range scans walk
/// sideways instead of back up the tree. Internal nodes hold separator keys. The shape
/// of the tree is governed by its [`Order`]: a node splits as soon as it exceeds its
/// capacity, and borrows from or merges with a sibling as soon as it falls below half.
///
/// Keys need not be unique. Records with equal keys are kept in insertion order:
/// [`search`](BPlusTree::search) and [`delete`](BPlusTree::delete) act on the most
/// recently inserted one, while iteration and range scans yield all of them, oldest first.
///
/// # Examples
///
/// ```
/// use bplus_tree::BPlusTree;
///
/// let mut tree = BPlusTree::new(4)?;
/// for key in [5, 10, 15, 20] {
///     tree.insert(key, key as f64);
/// }
///
/// assert_eq!(tree.search(10), Some(10.0));
/// assert_eq!(tree.search(11), None);
/// assert_eq!(tree.search_range(1, 12), [5.0, 10.0]);
/// assert_eq!(tree.height(), 2);
///
/// assert_eq!(tree.delete(5)?, 5.0);
/// assert!(tree.delete(999).is_err());
/// # Ok::<(), bplus_tree::Error>(())
/// ```
pub struct BPlusTree {
    raw: RawBPlusTree,
}

impl BPlusTree {
    /// Makes a new, empty tree of order `order`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOrder`](crate::Error::InvalidOrder) if `order < 3`.
    ///
    /// # Examples
    ///
    /// ```
    /// use bplus_tree::BPlusTree;
    ///
    /// let tree = BPlusTree::new(3)?;
    /// assert!(tree.is_empty());
    /// assert!(BPlusTree::new(2).is_err());
    /// # Ok::<(), bplus_tree::Error>(())
    /// ```
    pub fn new(order: usize) -> Result<Self> {
        Ok(Self::with_order(Order::new(order)?))
    }

    /// Makes a new, empty tree from an already validated order.
    ///
    /// Does not allocate anything on its own.
    #[must_use]
    pub const fn with_order(order: Order) -> Self {
        BPlusTree {
            raw: RawBPlusTree::new(order),
        }
    }

    /// Returns the order the tree was created with.
    #[must_use]
    pub const fn order(&self) -> Order {
        self.raw.order()
    }

    /// Returns the number of records in the tree, counting duplicates.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns `true` if the tree holds no records.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Returns the number of levels, counting the leaf level. An empty tree has height 0.
    ///
    /// # Complexity
    ///
    /// O(log n)
    #[must_use]
    pub fn height(&self) -> usize {
        self.raw.height()
    }

    /// Removes every record. The order is kept.
    ///
    /// # Examples
    ///
    /// ```
    /// use bplus_tree::BPlusTree;
    ///
    /// let mut tree = BPlusTree::new(4)?;
    /// tree.extend([(1, 1.0), (2, 2.0)]);
    /// tree.clear();
    /// assert!(tree.is_empty());
    /// assert_eq!(tree.height(), 0);
    /// # Ok::<(), bplus_tree::Error>(())
    /// ```
    pub fn clear(&mut self) {
        self.raw.clear();
    }

    /// Inserts a record.
    ///
    /// An existing record with the same key is not replaced; the new one shadows it until
    /// it is deleted.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use bplus_tree::BPlusTree;
    ///
    /// let mut tree = BPlusTree::new(4)?;
    /// tree.insert(7, 1.5);
    /// tree.insert(7, 2.5);
    /// assert_eq!(tree.search(7), Some(2.5));
    /// assert_eq!(tree.len(), 2);
    /// # Ok::<(), bplus_tree::Error>(())
    /// ```
    pub fn insert(&mut self, key: i64, value: f64) {
        self.raw.insert(key, value);
    }

    /// Removes the most recently inserted record with `key`, returning its value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyTree`](crate::Error::EmptyTree) if the tree holds no records,
    /// and [`Error::KeyNotFound`](crate::Error::KeyNotFound) if no record has `key`. The
    /// tree is unchanged in both cases.
    ///
    /// # Complexity
    ///
    /// O(log n)
    ///
    /// # Examples
    ///
    /// ```
    /// use bplus_tree::{BPlusTree, Error};
    ///
    /// let mut tree = BPlusTree::new(4)?;
    /// assert!(matches!(tree.delete(1), Err(Error::EmptyTree)));
    ///
    /// tree.insert(7, 1.5);
    /// tree.insert(7, 2.5);
    /// assert_eq!(tree.delete(7)?, 2.5);
    /// assert_eq!(tree.search(7), Some(1.5));
    /// assert!(matches!(tree.delete(8), Err(Error::KeyNotFound { key: 8 })));
    /// # Ok::<(), bplus_tree::Error>(())
    /// ```
    pub fn delete(&mut self, key: i64) -> Result<f64> {
        self.raw.remove(key)
    }

    /// Returns the value of the most recently inserted record with `key`.
    ///
    /// # Complexity
    ///
    /// O(log n)
    #[must_use]
    pub fn search(&self, key: i64) -> Option<f64> {
        self.raw.get(key)
    }

    /// Collects the values of every record with `low <= key <= high`, in key order.
    ///
    /// The result is empty when `low > high`.
    ///
    /// # Complexity
    ///
    /// O(log n + k) for k matching records.
    ///
    /// # Examples
    ///
    /// ```
    /// use bplus_tree::BPlusTree;
    ///
    /// let mut tree = BPlusTree::new(3)?;
    /// tree.extend([(30, 3.0), (10, 1.0), (20, 2.0), (20, 2.5)]);
    /// assert_eq!(tree.search_range(10, 20), [1.0, 2.0, 2.5]);
    /// assert!(tree.search_range(20, 10).is_empty());
    /// # Ok::<(), bplus_tree::Error>(())
    /// ```
    #[must_use]
    pub fn search_range(&self, low: i64, high: i64) -> Vec<f64> {
        self.range(low, high).map(|(_, value)| value).collect()
    }

    /// Returns a lazy iterator over the records with `low <= key <= high`, in key order.
    ///
    /// # Examples
    ///
    /// ```
    /// use bplus_tree::BPlusTree;
    ///
    /// let mut tree = BPlusTree::new(4)?;
    /// tree.extend((0..10).map(|k| (k, k as f64 / 2.0)));
    /// let keys: Vec<i64> = tree.range(3, 6).map(|(key, _)| key).collect();
    /// assert_eq!(keys, [3, 4, 5, 6]);
    /// # Ok::<(), bplus_tree::Error>(())
    /// ```
    pub fn range(&self, low: i64, high: i64) -> Range<'_> {
        Range::new(&self.raw, low, high)
    }

    /// Returns an iterator over every record, in key order.
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(&self.raw)
    }

    /// Returns the record with the smallest key; the oldest one among equal keys.
    #[must_use]
    pub fn first_key_value(&self) -> Option<(i64, f64)> {
        self.iter().next()
    }

    /// Returns the record with the largest key; the newest one among equal keys.
    #[must_use]
    pub fn last_key_value(&self) -> Option<(i64, f64)> {
        self.raw.last_record().map(|record| (record.key, record.value))
    }

    /// Checks the structural invariants of the tree.
    ///
    /// This walks every node, so it is meant for tests and for the script driver's
    /// `--check` mode rather than for normal operation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvariantViolation`](crate::Error::InvariantViolation) listing
    /// every violation found.
    pub fn validate(&self) -> Result<()> {
        self.raw.validate()
    }
}

impl fmt::Debug for BPlusTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl Extend<(i64, f64)> for BPlusTree {
    fn extend<T: IntoIterator<Item = (i64, f64)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<'a> IntoIterator for &'a BPlusTree {
    type Item = (i64, f64);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::Error;
    use alloc::format;
    use alloc::vec;

    #[test]
    fn debug_prints_records_in_key_order() {
        let mut tree = BPlusTree::new(4).unwrap();
        tree.extend([(20, 2.0), (10, 1.0), (10, 1.5)]);
        assert_eq!(format!("{tree:?}"), "{10: 1.0, 10: 1.5, 20: 2.0}");
    }

    #[test]
    fn first_and_last_records() {
        let mut tree = BPlusTree::new(3).unwrap();
        assert_eq!(tree.first_key_value(), None);
        assert_eq!(tree.last_key_value(), None);

        tree.extend([(5, 0.5), (1, 0.1), (9, 0.9), (9, 9.9), (1, 1.1)]);
        assert_eq!(tree.first_key_value(), Some((1, 0.1)));
        assert_eq!(tree.last_key_value(), Some((9, 9.9)));
    }

    #[test]
    fn iter_is_exact_size() {
        let mut tree = BPlusTree::new(3).unwrap();
        tree.extend((0..50).rev().map(|k| (k, 0.0)));
        let mut iter = tree.iter();
        assert_eq!(iter.len(), 50);
        iter.next();
        assert_eq!(iter.len(), 49);
        assert_eq!(iter.count(), 49);

        let keys: Vec<i64> = (&tree).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let mut tree = BPlusTree::new(4).unwrap();
        tree.extend((0..100).step_by(10).map(|k| (k, 0.0)));
        let keys = |low, high| tree.range(low, high).map(|(k, _)| k).collect::<Vec<_>>();
        assert_eq!(keys(10, 30), vec![10, 20, 30]);
        assert_eq!(keys(11, 29), vec![20]);
        assert_eq!(keys(-5, 5), vec![0]);
        assert_eq!(keys(95, 200), Vec::<i64>::new());
        assert_eq!(keys(i64::MIN, i64::MAX).len(), 10);
        assert_eq!(keys(30, 10), Vec::<i64>::new());
    }

    #[test]
    fn failed_delete_leaves_tree_untouched() {
        let mut tree = BPlusTree::new(4).unwrap();
        tree.extend([(5, 5.0), (10, 10.0), (15, 15.0), (20, 20.0)]);
        assert!(matches!(tree.delete(999), Err(Error::KeyNotFound { key: 999 })));
        assert_eq!(tree.len(), 4);
        assert_eq!(tree.search_range(i64::MIN, i64::MAX), [5.0, 10.0, 15.0, 20.0]);
        tree.validate().unwrap();
    }

    #[test]
    fn clear_keeps_order() {
        let mut tree = BPlusTree::new(5).unwrap();
        tree.extend((0..20).map(|k| (k, 0.0)));
        tree.clear();
        assert_eq!(tree.order().get(), 5);
        assert_eq!(tree.iter().next(), None);
        tree.insert(1, 1.0);
        assert_eq!(tree.search(1), Some(1.0));
    }
}
