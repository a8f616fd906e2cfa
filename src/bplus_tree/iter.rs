use core::fmt;
use core::iter::FusedIterator;

use crate::raw::{Handle, RawBPlusTree};

/// An iterator over the records of a [`BPlusTree`](crate::BPlusTree), in key order.
///
/// Equal keys are yielded oldest first. This `struct` is created by
/// [`BPlusTree::iter`](crate::BPlusTree::iter).
#[must_use = "iterators are lazy and do nothing unless consumed"]
#[derive(Clone)]
pub struct Iter<'a> {
    tree: &'a RawBPlusTree,
    leaf: Option<Handle>,
    index: usize,
    remaining: usize,
}

impl<'a> Iter<'a> {
    pub(crate) fn new(tree: &'a RawBPlusTree) -> Self {
        Iter {
            tree,
            leaf: tree.first_leaf(),
            index: 0,
            remaining: tree.len(),
        }
    }
}

impl Iterator for Iter<'_> {
    type Item = (i64, f64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let leaf = self.tree.leaf(self.leaf?);
        let record = leaf.record(self.index);
        self.remaining -= 1;
        self.index += 1;

        if self.index >= leaf.len() {
            self.leaf = leaf.next();
            self.index = 0;
        }

        Some((record.key, record.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl FusedIterator for Iter<'_> {}

impl fmt::Debug for Iter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter").field("remaining", &self.remaining).finish()
    }
}

/// An iterator over the records whose keys fall in an inclusive range.
///
/// This `struct` is created by [`BPlusTree::range`](crate::BPlusTree::range).
#[must_use = "iterators are lazy and do nothing unless consumed"]
#[derive(Clone)]
pub struct Range<'a> {
    tree: &'a RawBPlusTree,
    leaf: Option<Handle>,
    index: usize,
    high: i64,
}

impl<'a> Range<'a> {
    pub(crate) fn new(tree: &'a RawBPlusTree, low: i64, high: i64) -> Self {
        let (leaf, index) = if low <= high {
            tree.seek(low).map_or((None, 0), |(leaf, index)| (Some(leaf), index))
        } else {
            (None, 0)
        };
        Range { tree, leaf, index, high }
    }
}

impl Iterator for Range<'_> {
    type Item = (i64, f64);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let leaf = self.tree.leaf(self.leaf?);
            if self.index >= leaf.len() {
                // The start position may sit past the end of its leaf.
                self.leaf = leaf.next();
                self.index = 0;
                continue;
            }

            let record = leaf.record(self.index);
            if record.key > self.high {
                self.leaf = None;
                return None;
            }
            self.index += 1;
            return Some((record.key, record.value));
        }
    }
}

impl FusedIterator for Range<'_> {}

impl fmt::Debug for Range<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Range").field("high", &self.high).finish_non_exhaustive()
    }
}
