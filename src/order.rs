use core::fmt;

use crate::error::{Error, Result};

/// The order `m` of a B+ tree: the maximum number of children of an internal node.
///
/// Every capacity bound of the tree is derived from it:
///
/// | bound | value |
/// |---|---|
/// | [`max_children`](Order::max_children) | `m` |
/// | [`min_children`](Order::min_children) | `ceil(m / 2)` |
/// | [`max_records`](Order::max_records) | `m - 1` |
/// | [`min_records`](Order::min_records) | `ceil(m / 2) - 1` |
/// | [`split_index`](Order::split_index) | `ceil((m + 1) / 2) - 1` |
///
/// # Examples
///
/// ```
/// use bplus_tree::Order;
///
/// let order = Order::new(4)?;
/// assert_eq!(order.max_records(), 3);
/// assert_eq!(order.min_records(), 1);
/// assert_eq!(order.min_children(), 2);
/// assert_eq!(order.split_index(), 2);
///
/// assert!(Order::new(2).is_err());
/// # Ok::<(), bplus_tree::Error>(())
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Order(usize);

impl Order {
    /// The smallest order that can hold a separator and two children.
    pub const MIN: usize = 3;

    /// Validates `order` and derives the capacity bounds from it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOrder`] if `order < 3`.
    pub fn new(order: usize) -> Result<Self> {
        if order < Self::MIN {
            return Err(Error::InvalidOrder { order });
        }
        Ok(Self(order))
    }

    /// Returns `m`.
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }

    /// Maximum children of an internal node.
    #[must_use]
    pub const fn max_children(self) -> usize {
        self.0
    }

    /// Minimum children of a non-root internal node.
    #[must_use]
    pub const fn min_children(self) -> usize {
        self.0.div_ceil(2)
    }

    /// Maximum records in a leaf.
    #[must_use]
    pub const fn max_records(self) -> usize {
        self.0 - 1
    }

    /// Minimum records in a leaf that is not the only node of the tree.
    #[must_use]
    pub const fn min_records(self) -> usize {
        self.0.div_ceil(2) - 1
    }

    /// Index at which an overfull node is partitioned into kept and promoted halves.
    #[must_use]
    pub const fn split_index(self) -> usize {
        (self.0 + 1).div_ceil(2) - 1
    }
}

impl TryFrom<usize> for Order {
    type Error = Error;

    fn try_from(order: usize) -> Result<Self> {
        Order::new(order)
    }
}

impl From<Order> for usize {
    fn from(order: Order) -> usize {
        order.0
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn orders_below_three_are_rejected() {
        for order in 0..3 {
            assert!(matches!(Order::new(order), Err(Error::InvalidOrder { order: o }) if o == order));
        }
        assert!(Order::try_from(3).is_ok());
    }

    #[test]
    fn bounds_for_small_orders() {
        // (m, max_children, min_children, max_records, min_records, split_index)
        let expected = [
            (3, 3, 2, 2, 1, 1),
            (4, 4, 2, 3, 1, 2),
            (5, 5, 3, 4, 2, 2),
            (6, 6, 3, 5, 2, 3),
            (7, 7, 4, 6, 3, 3),
        ];
        for (m, max_children, min_children, max_records, min_records, split_index) in expected {
            let order = Order::new(m).unwrap();
            assert_eq!(order.get(), m);
            assert_eq!(order.max_children(), max_children, "max_children for {m}");
            assert_eq!(order.min_children(), min_children, "min_children for {m}");
            assert_eq!(order.max_records(), max_records, "max_records for {m}");
            assert_eq!(order.min_records(), min_records, "min_records for {m}");
            assert_eq!(order.split_index(), split_index, "split_index for {m}");
        }
    }

    proptest! {
        // A split must leave both halves within bounds, and a merge of a deficient node
        // with a minimal sibling must fit in one node.
        #[test]
        fn splits_and_merges_stay_in_bounds(m in 3usize..512) {
            let order = Order::new(m).unwrap();
            let split = order.split_index();

            let overfull_leaf = order.max_records() + 1;
            prop_assert!(split >= order.min_records());
            prop_assert!(overfull_leaf - split <= order.max_records());

            let overfull_internal = order.max_children() + 1;
            prop_assert!(split + 1 >= order.min_children());
            prop_assert!(overfull_internal - (split + 1) >= order.min_children());

            prop_assert!(2 * order.min_records() - 1 <= order.max_records());
            prop_assert!(2 * order.min_children() - 1 <= order.max_children());
        }
    }
}
