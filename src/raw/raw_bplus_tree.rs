use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;

use tracing::{debug, trace};

use super::arena::Arena;
use super::handle::Handle;
use super::node::{Child, InternalNode, LeafNode, Record};
use crate::error::{Error, Result};
use crate::order::Order;

/// The B+Tree engine backing `BPlusTree`.
///
/// Leaves and internal nodes live in two arenas. Every node records its parent and its
/// left/right neighbour at the same depth; all of these are non-owning handles. A node is
/// owned by its parent's child slot, or by the tree itself for the root and for a leaf
/// that is the only node.
pub(crate) struct RawBPlusTree {
    order: Order,
    leaves: Arena<LeafNode>,
    internals: Arena<InternalNode>,
    /// Topmost internal node; `None` while the tree is empty or a single leaf.
    root: Option<Handle>,
    /// Head of the leaf chain; the only node when `root` is `None`.
    first_leaf: Option<Handle>,
    /// Number of records in the tree.
    len: usize,
}

impl RawBPlusTree {
    /// Creates a new, empty tree.
    pub(crate) const fn new(order: Order) -> Self {
        Self {
            order,
            leaves: Arena::new(),
            internals: Arena::new(),
            root: None,
            first_leaf: None,
            len: 0,
        }
    }

    pub(crate) const fn order(&self) -> Order {
        self.order
    }

    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    pub(crate) const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn first_leaf(&self) -> Option<Handle> {
        self.first_leaf
    }

    pub(crate) fn leaf(&self, handle: Handle) -> &LeafNode {
        self.leaves.get(handle)
    }

    /// Removes every record, keeping the order.
    pub(crate) fn clear(&mut self) {
        self.leaves.clear();
        self.internals.clear();
        self.root = None;
        self.first_leaf = None;
        self.len = 0;
    }

    /// Number of levels, counting the leaf level; zero for an empty tree.
    pub(crate) fn height(&self) -> usize {
        if self.first_leaf.is_none() {
            return 0;
        }
        let mut height = 1;
        let mut current = self.root.map(Child::Internal);
        while let Some(Child::Internal(handle)) = current {
            height += 1;
            current = Some(self.internals.get(handle).child(0));
        }
        height
    }

    /// Descends from the root to the leaf whose key range covers `key`.
    pub(crate) fn locate_leaf(&self, key: i64) -> Option<Handle> {
        let Some(root) = self.root else {
            return self.first_leaf;
        };

        let mut current = root;
        loop {
            let internal = self.internals.get(current);
            match internal.child(internal.route(key)) {
                Child::Internal(handle) => current = handle,
                Child::Leaf(handle) => return Some(handle),
            }
        }
    }

    /// Finds the most recently inserted record with `key`.
    ///
    /// Equal keys can straddle a leaf boundary after a split, so when the located leaf
    /// holds no match the tail of its left neighbour is checked as well.
    fn find_newest(&self, key: i64) -> Option<(Handle, usize)> {
        let leaf_handle = self.locate_leaf(key)?;
        let leaf = self.leaves.get(leaf_handle);
        if let Some(index) = leaf.newest(key) {
            return Some((leaf_handle, index));
        }

        let prev_handle = leaf.prev()?;
        let prev = self.leaves.get(prev_handle);
        (prev.last_key() == Some(key)).then(|| (prev_handle, prev.len() - 1))
    }

    /// Returns the value of the most recently inserted record with `key`.
    pub(crate) fn get(&self, key: i64) -> Option<f64> {
        let (leaf, index) = self.find_newest(key)?;
        Some(self.leaves.get(leaf).record(index).value)
    }

    /// Position of the first record with a key not less than `low`.
    ///
    /// The returned index may equal the leaf's length, in which case the scan continues
    /// with the next leaf.
    pub(crate) fn seek(&self, low: i64) -> Option<(Handle, usize)> {
        let mut leaf_handle = self.locate_leaf(low)?;
        while let Some(prev_handle) = self.leaves.get(leaf_handle).prev() {
            if self.leaves.get(prev_handle).last_key().is_some_and(|last| last >= low) {
                leaf_handle = prev_handle;
            } else {
                break;
            }
        }
        Some((leaf_handle, self.leaves.get(leaf_handle).lower_bound(low)))
    }

    /// Returns the record with the largest key; the newest one among equal keys.
    pub(crate) fn last_record(&self) -> Option<Record> {
        let mut current = match self.root {
            Some(root) => Child::Internal(root),
            None => Child::Leaf(self.first_leaf?),
        };
        loop {
            match current {
                Child::Internal(handle) => current = self.internals.get(handle).last_child(),
                Child::Leaf(handle) => return self.leaves.get(handle).records().last().copied(),
            }
        }
    }

    /// Inserts a record. Equal keys are allowed and kept in insertion order.
    pub(crate) fn insert(&mut self, key: i64, value: f64) {
        let record = Record::new(key, value);
        self.len += 1;

        let Some(leaf_handle) = self.locate_leaf(key) else {
            let handle = self.leaves.alloc(LeafNode::with_record(record));
            self.first_leaf = Some(handle);
            return;
        };

        let leaf = self.leaves.get_mut(leaf_handle);
        leaf.insert(record);
        if leaf.len() > self.order.max_records() {
            let parent = self.split_leaf(leaf_handle);
            self.propagate_split(parent);
        }
    }

    /// Splits an overfull leaf, returning the parent that received the new separator.
    fn split_leaf(&mut self, leaf_handle: Handle) -> Handle {
        let leaf = self.leaves.get_mut(leaf_handle);
        let promoted = leaf.split_off(self.order.split_index());
        let separator = promoted[0].key;
        let old_next = leaf.next();
        let parent = match leaf.parent() {
            Some(parent) => parent,
            None => self.grow_root(Child::Leaf(leaf_handle)),
        };

        let mut right = LeafNode::from_records(promoted, Some(parent));
        right.set_prev(Some(leaf_handle));
        right.set_next(old_next);
        let right_handle = self.leaves.alloc(right);

        self.leaves.get_mut(leaf_handle).set_next(Some(right_handle));
        if let Some(next) = old_next {
            self.leaves.get_mut(next).set_prev(Some(right_handle));
        }

        let parent_node = self.internals.get_mut(parent);
        let index = parent_node.position_of(Child::Leaf(leaf_handle)).expect("leaf is a child of its parent");
        parent_node.insert_child(index, separator, Child::Leaf(right_handle));

        trace!(
            target: "bplus_tree::split",
            separator,
            left = leaf_handle.to_index(),
            right = right_handle.to_index(),
            "split leaf"
        );
        parent
    }

    /// Splits internal nodes from `node` upward while they hold too many children.
    fn propagate_split(&mut self, mut node: Handle) {
        while self.internals.get(node).child_count() > self.order.max_children() {
            node = self.split_internal(node);
        }
    }

    /// Splits an overfull internal node, returning its (possibly new) parent.
    ///
    /// The key at the split index moves up to the parent; it is not kept in either half.
    fn split_internal(&mut self, node: Handle) -> Handle {
        let internal = self.internals.get_mut(node);
        let (promoted, keys, children) = internal.split_off(self.order.split_index());
        let old_next = internal.next();
        let parent = match internal.parent() {
            Some(parent) => parent,
            None => self.grow_root(Child::Internal(node)),
        };

        let moved = children.clone();
        let mut sibling = InternalNode::from_parts(keys, children, Some(parent));
        sibling.set_prev(Some(node));
        sibling.set_next(old_next);
        let sibling_handle = self.internals.alloc(sibling);

        for child in moved {
            self.set_parent(child, Some(sibling_handle));
        }

        self.internals.get_mut(node).set_next(Some(sibling_handle));
        if let Some(next) = old_next {
            self.internals.get_mut(next).set_prev(Some(sibling_handle));
        }

        let parent_node = self.internals.get_mut(parent);
        let index = parent_node.position_of(Child::Internal(node)).expect("node is a child of its parent");
        parent_node.insert_child(index, promoted, Child::Internal(sibling_handle));

        trace!(
            target: "bplus_tree::split",
            separator = promoted,
            left = node.to_index(),
            right = sibling_handle.to_index(),
            "split internal node"
        );
        parent
    }

    /// Puts a new root above the current top node, which becomes its only child.
    fn grow_root(&mut self, top: Child) -> Handle {
        let root = self.internals.alloc(InternalNode::with_first_child(top));
        self.set_parent(top, Some(root));
        self.root = Some(root);
        trace!(target: "bplus_tree::root", root = root.to_index(), "grew new root");
        root
    }

    fn set_parent(&mut self, child: Child, parent: Option<Handle>) {
        match child {
            Child::Leaf(handle) => self.leaves.get_mut(handle).set_parent(parent),
            Child::Internal(handle) => self.internals.get_mut(handle).set_parent(parent),
        }
    }

    /// Removes the most recently inserted record with `key` and returns its value.
    pub(crate) fn remove(&mut self, key: i64) -> Result<f64> {
        if self.first_leaf.is_none() {
            return Err(Error::EmptyTree);
        }
        let Some((leaf_handle, index)) = self.find_newest(key) else {
            debug!(target: "bplus_tree::delete", key, "element does not exist");
            return Err(Error::KeyNotFound { key });
        };

        let leaf = self.leaves.get_mut(leaf_handle);
        let record = leaf.remove(index);
        self.len -= 1;

        match leaf.parent() {
            // The only node of the tree has no lower bound.
            None => {
                if leaf.is_empty() {
                    self.leaves.free(leaf_handle);
                    self.first_leaf = None;
                }
            }
            Some(parent) => {
                if leaf.len() < self.order.min_records() {
                    self.rebalance_leaf(leaf_handle, parent);
                    self.rebalance_internal(parent);
                }
            }
        }

        Ok(record.value)
    }

    /// Restores the minimum of an underfull leaf by borrowing from or merging with a
    /// sibling under the same parent.
    fn rebalance_leaf(&mut self, leaf_handle: Handle, parent: Handle) {
        let min = self.order.min_records();
        let parent_node = self.internals.get(parent);
        let index = parent_node.position_of(Child::Leaf(leaf_handle)).expect("leaf is a child of its parent");
        let left = (index > 0).then(|| parent_node.child(index - 1).leaf());
        let right = (index + 1 < parent_node.child_count()).then(|| parent_node.child(index + 1).leaf());

        if let Some(left) = left
            && self.leaves.get(left).len() > min
        {
            self.borrow_from_left_leaf(leaf_handle, left, parent, index);
        } else if let Some(right) = right
            && self.leaves.get(right).len() > min
        {
            self.borrow_from_right_leaf(leaf_handle, right, parent, index);
        } else if let Some(left) = left {
            self.merge_into_left_leaf(leaf_handle, left, parent, index);
        } else if let Some(right) = right {
            self.merge_into_right_leaf(leaf_handle, right, parent, index);
        } else {
            unreachable!("parent of an underfull leaf has a single child");
        }
    }

    fn borrow_from_left_leaf(&mut self, leaf_handle: Handle, left: Handle, parent: Handle, index: usize) {
        let record = self.leaves.get_mut(left).pop().expect("lending leaf is above minimum");
        self.leaves.get_mut(leaf_handle).push_front(record);

        let parent_node = self.internals.get_mut(parent);
        if record.key < parent_node.key(index - 1) {
            parent_node.set_key(index - 1, record.key);
        }
        trace!(target: "bplus_tree::borrow", key = record.key, direction = "left", "borrowed leaf record");
    }

    fn borrow_from_right_leaf(&mut self, leaf_handle: Handle, right: Handle, parent: Handle, index: usize) {
        let right_node = self.leaves.get_mut(right);
        let record = right_node.pop_front().expect("lending leaf is above minimum");
        let right_first = right_node.first_key().expect("lending leaf keeps a record");
        self.leaves.get_mut(leaf_handle).push(record);

        let parent_node = self.internals.get_mut(parent);
        if record.key >= parent_node.key(index) {
            parent_node.set_key(index, right_first);
        }
        trace!(target: "bplus_tree::borrow", key = record.key, direction = "right", "borrowed leaf record");
    }

    fn merge_into_left_leaf(&mut self, leaf_handle: Handle, left: Handle, parent: Handle, index: usize) {
        let removed = self.leaves.take(leaf_handle);
        let next = removed.next();

        let left_node = self.leaves.get_mut(left);
        left_node.append(removed.into_records());
        left_node.set_next(next);
        if let Some(next) = next {
            self.leaves.get_mut(next).set_prev(Some(left));
        }

        let parent_node = self.internals.get_mut(parent);
        parent_node.remove_key(index - 1);
        parent_node.remove_child(index);

        trace!(
            target: "bplus_tree::merge",
            survivor = left.to_index(),
            removed = leaf_handle.to_index(),
            direction = "left",
            "merged leaf into left sibling"
        );
    }

    fn merge_into_right_leaf(&mut self, leaf_handle: Handle, right: Handle, parent: Handle, index: usize) {
        let removed = self.leaves.take(leaf_handle);
        let prev = removed.prev();

        let right_node = self.leaves.get_mut(right);
        right_node.prepend(removed.into_records());
        right_node.set_prev(prev);
        match prev {
            Some(prev) => self.leaves.get_mut(prev).set_next(Some(right)),
            None => self.first_leaf = Some(right),
        }

        let parent_node = self.internals.get_mut(parent);
        parent_node.remove_key(index);
        parent_node.remove_child(index);

        trace!(
            target: "bplus_tree::merge",
            survivor = right.to_index(),
            removed = leaf_handle.to_index(),
            direction = "right",
            "merged leaf into right sibling"
        );
    }

    /// Walks from `node` toward the root, fixing internal nodes left with too few children
    /// and collapsing a root that is down to a single child.
    fn rebalance_internal(&mut self, mut node: Handle) {
        let min = self.order.min_children();
        loop {
            let internal = self.internals.get(node);
            let Some(parent) = internal.parent() else {
                if internal.child_count() == 1 {
                    self.collapse_root(node);
                }
                return;
            };
            if internal.child_count() >= min {
                return;
            }

            let parent_node = self.internals.get(parent);
            let index = parent_node.position_of(Child::Internal(node)).expect("node is a child of its parent");
            let left = (index > 0).then(|| parent_node.child(index - 1).internal());
            let right = (index + 1 < parent_node.child_count()).then(|| parent_node.child(index + 1).internal());

            if let Some(left) = left
                && self.internals.get(left).child_count() > min
            {
                self.borrow_from_left_internal(node, left, parent, index);
                return;
            } else if let Some(right) = right
                && self.internals.get(right).child_count() > min
            {
                self.borrow_from_right_internal(node, right, parent, index);
                return;
            } else if let Some(left) = left {
                self.merge_into_left_internal(node, left, parent, index);
            } else if let Some(right) = right {
                self.merge_into_right_internal(node, right, parent, index);
            } else {
                unreachable!("parent of an underfull internal node has a single child");
            }

            node = parent;
        }
    }

    /// Rotates the left sibling's last child through the parent separator.
    fn borrow_from_left_internal(&mut self, node: Handle, left: Handle, parent: Handle, index: usize) {
        let (key, child) = self.internals.get_mut(left).pop().expect("lending node is above minimum");
        let parent_node = self.internals.get_mut(parent);
        let separator = parent_node.key(index - 1);
        parent_node.set_key(index - 1, key);

        self.internals.get_mut(node).push_front(separator, child);
        self.set_parent(child, Some(node));
        trace!(target: "bplus_tree::borrow", key = separator, direction = "left", "rotated internal child");
    }

    /// Rotates the right sibling's first child through the parent separator.
    fn borrow_from_right_internal(&mut self, node: Handle, right: Handle, parent: Handle, index: usize) {
        let (key, child) = self.internals.get_mut(right).pop_front().expect("lending node is above minimum");
        let parent_node = self.internals.get_mut(parent);
        let separator = parent_node.key(index);
        parent_node.set_key(index, key);

        self.internals.get_mut(node).push(separator, child);
        self.set_parent(child, Some(node));
        trace!(target: "bplus_tree::borrow", key = separator, direction = "right", "rotated internal child");
    }

    fn merge_into_left_internal(&mut self, node: Handle, left: Handle, parent: Handle, index: usize) {
        let removed = self.internals.take(node);
        let next = removed.next();
        let (keys, children) = removed.into_parts();

        let parent_node = self.internals.get_mut(parent);
        let separator = parent_node.remove_key(index - 1);
        parent_node.remove_child(index);

        for &child in &children {
            self.set_parent(child, Some(left));
        }
        let left_node = self.internals.get_mut(left);
        left_node.absorb_right(separator, keys, children);
        left_node.set_next(next);
        if let Some(next) = next {
            self.internals.get_mut(next).set_prev(Some(left));
        }

        trace!(
            target: "bplus_tree::merge",
            survivor = left.to_index(),
            removed = node.to_index(),
            direction = "left",
            "merged internal node into left sibling"
        );
    }

    fn merge_into_right_internal(&mut self, node: Handle, right: Handle, parent: Handle, index: usize) {
        let removed = self.internals.take(node);
        let prev = removed.prev();
        let (keys, children) = removed.into_parts();

        let parent_node = self.internals.get_mut(parent);
        let separator = parent_node.remove_key(index);
        parent_node.remove_child(index);

        for &child in &children {
            self.set_parent(child, Some(right));
        }
        let right_node = self.internals.get_mut(right);
        right_node.absorb_left(keys, separator, children);
        right_node.set_prev(prev);
        if let Some(prev) = prev {
            self.internals.get_mut(prev).set_next(Some(right));
        }

        trace!(
            target: "bplus_tree::merge",
            survivor = right.to_index(),
            removed = node.to_index(),
            direction = "right",
            "merged internal node into right sibling"
        );
    }

    /// Replaces a root that has a single child with that child.
    fn collapse_root(&mut self, root: Handle) {
        let old_root = self.internals.take(root);
        let child = old_root.child(0);
        self.set_parent(child, None);
        self.root = match child {
            Child::Internal(handle) => Some(handle),
            Child::Leaf(_) => None,
        };
        trace!(target: "bplus_tree::root", old = root.to_index(), "collapsed root");
    }

    /// Checks every structural invariant, collecting all violations into one report.
    pub(crate) fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();
        let mut walk = Walk::default();

        match (self.root, self.first_leaf) {
            (None, None) => {
                if self.len != 0 {
                    errors.push(format!("empty tree has len {}", self.len));
                }
            }
            (None, Some(leaf_handle)) => {
                let leaf = self.leaves.get(leaf_handle);
                if leaf.parent().is_some() || leaf.prev().is_some() || leaf.next().is_some() {
                    errors.push(format!("sole leaf {leaf_handle:?} has links"));
                }
                if leaf.is_empty() {
                    errors.push(format!("sole leaf {leaf_handle:?} is empty"));
                }
                self.check_leaf(leaf_handle, None, None, &mut errors);
                walk.leaves.push(leaf_handle);
            }
            (Some(root), _) => {
                let node = self.internals.get(root);
                if node.parent().is_some() {
                    errors.push(format!("root {root:?} has a parent"));
                }
                if node.child_count() < 2 {
                    errors.push(format!("root {root:?} has {} children", node.child_count()));
                }
                self.check_internal(root, 0, None, None, &mut walk, &mut errors);
            }
        }

        self.check_leaf_chain(&walk.leaves, &mut errors);
        for (depth, level) in walk.levels.iter().enumerate() {
            self.check_internal_chain(depth, level, &mut errors);
        }

        let records: usize = walk.leaves.iter().map(|&h| self.leaves.get(h).len()).sum();
        if records != self.len {
            errors.push(format!("len mismatch: len={}, counted={records}", self.len));
        }
        if self.leaves.len() != walk.leaves.len() {
            errors.push(format!(
                "leaf arena holds {} leaves but {} are reachable",
                self.leaves.len(),
                walk.leaves.len()
            ));
        }
        let reachable_internals: usize = walk.levels.iter().map(Vec::len).sum();
        if self.internals.len() != reachable_internals {
            errors.push(format!(
                "internal arena holds {} nodes but {reachable_internals} are reachable",
                self.internals.len()
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::InvariantViolation(errors.join("\n")))
        }
    }

    /// Checks a leaf's capacity, ordering and key bounds; `low <= key <= high`.
    fn check_leaf(&self, handle: Handle, low: Option<i64>, high: Option<i64>, errors: &mut Vec<String>) {
        let leaf = self.leaves.get(handle);
        if leaf.len() > self.order.max_records() {
            errors.push(format!("leaf {handle:?} overfull: {} records", leaf.len()));
        }
        if leaf.parent().is_some() && leaf.len() < self.order.min_records() {
            errors.push(format!("leaf {handle:?} underfull: {} records", leaf.len()));
        }
        if leaf.records().windows(2).any(|pair| pair[0].key > pair[1].key) {
            errors.push(format!("leaf {handle:?} records out of order"));
        }
        for record in leaf.records() {
            if low.is_some_and(|low| record.key < low) || high.is_some_and(|high| record.key > high) {
                errors.push(format!("leaf {handle:?} key {} outside separator bounds", record.key));
            }
        }
    }

    fn check_internal(
        &self,
        handle: Handle,
        depth: usize,
        low: Option<i64>,
        high: Option<i64>,
        walk: &mut Walk,
        errors: &mut Vec<String>,
    ) {
        let node = self.internals.get(handle);
        if walk.levels.len() == depth {
            walk.levels.push(Vec::new());
        }
        walk.levels[depth].push(handle);

        if node.key_count() + 1 != node.child_count() {
            errors.push(format!(
                "internal {handle:?} has {} keys and {} children",
                node.key_count(),
                node.child_count()
            ));
            return;
        }
        if node.child_count() > self.order.max_children() {
            errors.push(format!("internal {handle:?} overfull: {} children", node.child_count()));
        }
        if node.parent().is_some() && node.child_count() < self.order.min_children() {
            errors.push(format!("internal {handle:?} underfull: {} children", node.child_count()));
        }
        if node.keys().windows(2).any(|pair| pair[0] > pair[1]) {
            errors.push(format!("internal {handle:?} keys out of order"));
        }
        for &key in node.keys() {
            if low.is_some_and(|low| key < low) || high.is_some_and(|high| key > high) {
                errors.push(format!("internal {handle:?} key {key} outside separator bounds"));
            }
        }

        for (index, &child) in node.children().iter().enumerate() {
            let child_low = if index == 0 { low } else { Some(node.key(index - 1)) };
            let child_high = if index == node.key_count() { high } else { Some(node.key(index)) };
            match child {
                Child::Leaf(leaf_handle) => {
                    if self.leaves.get(leaf_handle).parent() != Some(handle) {
                        errors.push(format!("leaf {leaf_handle:?} does not point back to parent {handle:?}"));
                    }
                    match walk.leaf_depth {
                        None => walk.leaf_depth = Some(depth + 1),
                        Some(expected) if expected != depth + 1 => {
                            errors.push(format!("leaf {leaf_handle:?} at depth {} instead of {expected}", depth + 1));
                        }
                        Some(_) => {}
                    }
                    self.check_leaf(leaf_handle, child_low, child_high, errors);
                    walk.leaves.push(leaf_handle);
                }
                Child::Internal(internal_handle) => {
                    if self.internals.get(internal_handle).parent() != Some(handle) {
                        errors.push(format!("internal {internal_handle:?} does not point back to parent {handle:?}"));
                    }
                    self.check_internal(internal_handle, depth + 1, child_low, child_high, walk, errors);
                }
            }
        }
    }

    fn check_leaf_chain(&self, leaves: &[Handle], errors: &mut Vec<String>) {
        if self.first_leaf != leaves.first().copied() {
            errors.push(format!("first_leaf is {:?}, leftmost leaf is {:?}", self.first_leaf, leaves.first()));
        }
        for (index, &handle) in leaves.iter().enumerate() {
            let leaf = self.leaves.get(handle);
            let expected_prev = index.checked_sub(1).map(|i| leaves[i]);
            let expected_next = leaves.get(index + 1).copied();
            if leaf.prev() != expected_prev || leaf.next() != expected_next {
                errors.push(format!(
                    "leaf {handle:?} links ({:?}, {:?}), expected ({expected_prev:?}, {expected_next:?})",
                    leaf.prev(),
                    leaf.next()
                ));
            }
        }
    }

    fn check_internal_chain(&self, depth: usize, level: &[Handle], errors: &mut Vec<String>) {
        for (index, &handle) in level.iter().enumerate() {
            let node = self.internals.get(handle);
            let expected_prev = index.checked_sub(1).map(|i| level[i]);
            let expected_next = level.get(index + 1).copied();
            if node.prev() != expected_prev || node.next() != expected_next {
                errors.push(format!(
                    "internal {handle:?} at depth {depth} links ({:?}, {:?}), expected ({expected_prev:?}, {expected_next:?})",
                    node.prev(),
                    node.next()
                ));
            }
        }
    }
}

/// Nodes collected by `validate`, in left-to-right order.
#[derive(Default)]
struct Walk {
    leaves: Vec<Handle>,
    /// Internal nodes per depth, root first.
    levels: Vec<Vec<Handle>>,
    leaf_depth: Option<usize>,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
#[allow(clippy::cast_precision_loss, clippy::float_cmp)]
mod tests {
    use super::*;
    use alloc::collections::BTreeMap;
    use alloc::vec;
    use proptest::prelude::*;

    fn tree(order: usize) -> RawBPlusTree {
        RawBPlusTree::new(Order::new(order).unwrap())
    }

    fn assert_valid(tree: &RawBPlusTree) {
        if let Err(err) = tree.validate() {
            panic!("{err}");
        }
    }

    fn leaf_keys(tree: &RawBPlusTree) -> Vec<Vec<i64>> {
        let mut leaves = Vec::new();
        let mut current = tree.first_leaf();
        while let Some(handle) = current {
            let leaf = tree.leaf(handle);
            leaves.push(leaf.records().iter().map(|r| r.key).collect());
            current = leaf.next();
        }
        leaves
    }

    fn root_keys(tree: &RawBPlusTree) -> Option<Vec<i64>> {
        tree.root.map(|root| tree.internals.get(root).keys().to_vec())
    }

    fn collect_range(tree: &RawBPlusTree, low: i64, high: i64) -> Vec<(i64, f64)> {
        let mut out = Vec::new();
        let Some((mut leaf_handle, mut index)) = tree.seek(low) else {
            return out;
        };
        loop {
            let leaf = tree.leaf(leaf_handle);
            if index >= leaf.len() {
                match leaf.next() {
                    Some(next) => {
                        leaf_handle = next;
                        index = 0;
                        continue;
                    }
                    None => return out,
                }
            }
            let record = leaf.record(index);
            if record.key > high {
                return out;
            }
            out.push((record.key, record.value));
            index += 1;
        }
    }

    #[test]
    fn fourth_insert_splits_into_two_leaves() {
        let mut tree = tree(4);
        for key in [5, 10, 15, 20] {
            tree.insert(key, key as f64);
            assert_valid(&tree);
        }
        assert_eq!(leaf_keys(&tree), vec![vec![5, 10], vec![15, 20]]);
        assert_eq!(root_keys(&tree), Some(vec![15]));
        assert_eq!(tree.height(), 2);
        assert_eq!(tree.get(10), Some(10.0));
        assert_eq!(collect_range(&tree, 1, 12), vec![(5, 5.0), (10, 10.0)]);
    }

    #[test]
    fn underflow_borrows_then_merges_and_collapses_root() {
        let mut tree = tree(4);
        for key in [5, 10, 15, 20] {
            tree.insert(key, key as f64);
        }

        assert_eq!(tree.remove(5).unwrap(), 5.0);
        assert_valid(&tree);
        assert_eq!(leaf_keys(&tree), vec![vec![10], vec![15, 20]]);

        // Left leaf empties; the right sibling can spare a record.
        assert_eq!(tree.remove(10).unwrap(), 10.0);
        assert_valid(&tree);
        assert_eq!(leaf_keys(&tree), vec![vec![15], vec![20]]);
        assert_eq!(root_keys(&tree), Some(vec![20]));

        // Now the right sibling is at minimum: merge, and the root is left with one child.
        assert_eq!(tree.remove(15).unwrap(), 15.0);
        assert_valid(&tree);
        assert_eq!(leaf_keys(&tree), vec![vec![20]]);
        assert_eq!(root_keys(&tree), None);
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.get(20), Some(20.0));
    }

    #[test]
    fn missing_and_empty_deletes_leave_tree_unchanged() {
        let mut tree = tree(4);
        assert!(matches!(tree.remove(1), Err(Error::EmptyTree)));
        assert_eq!(tree.get(42), None);

        for key in [5, 10, 15, 20] {
            tree.insert(key, key as f64);
        }
        assert!(matches!(tree.remove(999), Err(Error::KeyNotFound { key: 999 })));
        assert_eq!(leaf_keys(&tree), vec![vec![5, 10], vec![15, 20]]);
        assert_eq!(tree.len(), 4);
        assert_valid(&tree);
    }

    #[test]
    fn removing_last_record_empties_tree() {
        let mut tree = tree(3);
        tree.insert(1, 1.5);
        assert_eq!(tree.remove(1).unwrap(), 1.5);
        assert!(tree.is_empty());
        assert_eq!(tree.first_leaf(), None);
        assert_eq!(tree.height(), 0);
        assert_valid(&tree);

        tree.insert(2, 2.5);
        assert_eq!(tree.get(2), Some(2.5));
        assert_valid(&tree);
    }

    #[test]
    fn leaf_merge_keeps_surviving_records() {
        // Order 5 leaves hold 2..=4 records, so a deficient leaf still has one record to hand over.
        let mut tree = tree(5);
        for key in 1..=6 {
            tree.insert(key, key as f64);
        }
        assert_eq!(leaf_keys(&tree), vec![vec![1, 2], vec![3, 4, 5, 6]]);
        tree.remove(6).unwrap();
        tree.remove(5).unwrap();
        assert_eq!(leaf_keys(&tree), vec![vec![1, 2], vec![3, 4]]);

        tree.remove(1).unwrap();
        assert_valid(&tree);
        assert_eq!(leaf_keys(&tree), vec![vec![2, 3, 4]]);
        for key in 2..=4 {
            assert_eq!(tree.get(key), Some(key as f64));
        }
    }

    #[test]
    fn ascending_inserts_grow_and_descending_deletes_shrink() {
        let mut tree = tree(3);
        for key in 0..200 {
            tree.insert(key, key as f64);
            assert_valid(&tree);
        }
        assert!(tree.height() > 4);
        for key in (0..200).rev() {
            assert_eq!(tree.remove(key).unwrap(), key as f64);
            assert_valid(&tree);
        }
        assert!(tree.is_empty());
        assert!(tree.leaves.is_empty());
        assert!(tree.internals.is_empty());
    }

    #[test]
    fn duplicates_shadow_in_insertion_order() {
        let mut tree = tree(3);
        for value in 0..7 {
            tree.insert(15, f64::from(value));
            assert_valid(&tree);
        }
        tree.insert(10, 10.0);
        tree.insert(20, 20.0);
        assert_valid(&tree);

        let dupes: Vec<f64> = collect_range(&tree, 15, 15).into_iter().map(|(_, v)| v).collect();
        assert_eq!(dupes, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        for value in (0..7).rev() {
            assert_eq!(tree.get(15), Some(f64::from(value)));
            assert_eq!(tree.remove(15).unwrap(), f64::from(value));
            assert_valid(&tree);
        }
        assert_eq!(tree.get(15), None);
        assert!(matches!(tree.remove(15), Err(Error::KeyNotFound { key: 15 })));
        assert_eq!(collect_range(&tree, i64::MIN, i64::MAX), vec![(10, 10.0), (20, 20.0)]);
    }

    #[test]
    fn last_record_follows_rightmost_path() {
        let mut tree = tree(4);
        assert_eq!(tree.last_record(), None);
        for key in [40, 10, 30, 20, 50, 60, 5] {
            tree.insert(key, key as f64);
        }
        assert_eq!(tree.last_record(), Some(Record::new(60, 60.0)));
    }

    #[test]
    fn validate_reports_corruption() {
        let mut tree = tree(4);
        for key in 0..20 {
            tree.insert(key, key as f64);
        }
        let first = tree.first_leaf().unwrap();
        let next = tree.leaf(first).next();
        tree.leaves.get_mut(first).set_next(None);
        let report = match tree.validate() {
            Err(Error::InvariantViolation(report)) => report,
            other => panic!("expected invariant violation, got {other:?}"),
        };
        assert!(report.contains("links"), "{report}");

        tree.leaves.get_mut(first).set_next(next);
        assert_valid(&tree);
    }

    #[derive(Clone, Debug)]
    enum Op {
        Insert(i64),
        Remove(i64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (0i64..300).prop_map(Op::Insert),
            2 => (0i64..300).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn invariants_hold_after_every_operation(
            order in 3usize..9,
            ops in prop::collection::vec(op_strategy(), 0..400),
        ) {
            let mut tree = tree(order);
            // Model: every key's values in insertion order.
            let mut model: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
            let mut stamp = 0.0;

            for op in ops {
                match op {
                    Op::Insert(key) => {
                        stamp += 1.0;
                        tree.insert(key, stamp);
                        model.entry(key).or_default().push(stamp);
                    }
                    Op::Remove(key) => {
                        let expected = model.get_mut(&key).and_then(Vec::pop);
                        if model.get(&key).is_some_and(Vec::is_empty) {
                            model.remove(&key);
                        }
                        prop_assert_eq!(tree.remove(key).ok(), expected);
                    }
                }
                if let Err(err) = tree.validate() {
                    prop_assert!(false, "{}", err);
                }
                prop_assert_eq!(tree.len(), model.values().map(Vec::len).sum::<usize>());
            }

            for (&key, values) in &model {
                prop_assert_eq!(tree.get(key), values.last().copied());
            }
            let expected: Vec<(i64, f64)> = model
                .iter()
                .flat_map(|(&key, values)| values.iter().map(move |&v| (key, v)))
                .collect();
            prop_assert_eq!(collect_range(&tree, i64::MIN, i64::MAX), expected);
        }
    }
}
