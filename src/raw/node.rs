use smallvec::SmallVec;

use super::handle::Handle;

/// Inline capacity of node sequences; orders above this spill to the heap.
const INLINE: usize = 8;

pub(crate) type Records = SmallVec<[Record; INLINE]>;
pub(crate) type Keys = SmallVec<[i64; INLINE]>;
pub(crate) type Children = SmallVec<[Child; INLINE]>;

/// A key/value pair stored in a leaf.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Record {
    pub(crate) key: i64,
    pub(crate) value: f64,
}

impl Record {
    pub(crate) const fn new(key: i64, value: f64) -> Self {
        Self { key, value }
    }
}

/// A child slot of an internal node.
///
/// Leaves and internal nodes live in separate arenas, so the tag says which arena the
/// handle points into.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Child {
    Leaf(Handle),
    Internal(Handle),
}

impl Child {
    /// Returns the leaf handle, panicking if this is an internal child.
    pub(crate) fn leaf(self) -> Handle {
        match self {
            Child::Leaf(handle) => handle,
            Child::Internal(_) => panic!("expected leaf child"),
        }
    }

    /// Returns the internal handle, panicking if this is a leaf child.
    pub(crate) fn internal(self) -> Handle {
        match self {
            Child::Internal(handle) => handle,
            Child::Leaf(_) => panic!("expected internal child"),
        }
    }
}

// B+Tree: leaves hold the records and form a doubly linked chain in key order.
pub(crate) struct LeafNode {
    records: Records,
    parent: Option<Handle>,
    prev: Option<Handle>,
    next: Option<Handle>,
}

// B+Tree: internal nodes hold separator keys and one more child than keys.
// A key routes to children[i + 1] when it is >= keys[i].
pub(crate) struct InternalNode {
    keys: Keys,
    children: Children,
    parent: Option<Handle>,
    prev: Option<Handle>,
    next: Option<Handle>,
}

impl LeafNode {
    /// Creates a parentless leaf holding a single record.
    pub(crate) fn with_record(record: Record) -> Self {
        let mut records = Records::new();
        records.push(record);
        Self::from_records(records, None)
    }

    /// Creates a leaf from records that are already sorted.
    pub(crate) fn from_records(records: Records, parent: Option<Handle>) -> Self {
        Self {
            records,
            parent,
            prev: None,
            next: None,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn parent(&self) -> Option<Handle> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<Handle>) {
        self.parent = parent;
    }

    pub(crate) fn prev(&self) -> Option<Handle> {
        self.prev
    }

    pub(crate) fn set_prev(&mut self, prev: Option<Handle>) {
        self.prev = prev;
    }

    pub(crate) fn next(&self) -> Option<Handle> {
        self.next
    }

    pub(crate) fn set_next(&mut self, next: Option<Handle>) {
        self.next = next;
    }

    #[inline]
    pub(crate) fn record(&self, index: usize) -> Record {
        self.records[index]
    }

    pub(crate) fn records(&self) -> &[Record] {
        &self.records
    }

    pub(crate) fn first_key(&self) -> Option<i64> {
        self.records.first().map(|record| record.key)
    }

    pub(crate) fn last_key(&self) -> Option<i64> {
        self.records.last().map(|record| record.key)
    }

    /// Index of the first record with a key not less than `key`.
    pub(crate) fn lower_bound(&self, key: i64) -> usize {
        self.records.partition_point(|record| record.key < key)
    }

    /// Index of the most recently inserted record with this key.
    ///
    /// Equal keys are kept in insertion order, so that is the last match.
    pub(crate) fn newest(&self, key: i64) -> Option<usize> {
        let end = self.records.partition_point(|record| record.key <= key);
        (end > 0 && self.records[end - 1].key == key).then(|| end - 1)
    }

    /// Inserts a record in key order, after any records with an equal key.
    pub(crate) fn insert(&mut self, record: Record) {
        let index = self.records.partition_point(|r| r.key <= record.key);
        self.records.insert(index, record);
    }

    pub(crate) fn remove(&mut self, index: usize) -> Record {
        self.records.remove(index)
    }

    pub(crate) fn push(&mut self, record: Record) {
        debug_assert!(self.last_key().is_none_or(|last| last <= record.key));
        self.records.push(record);
    }

    pub(crate) fn push_front(&mut self, record: Record) {
        debug_assert!(self.first_key().is_none_or(|first| record.key <= first));
        self.records.insert(0, record);
    }

    pub(crate) fn pop(&mut self) -> Option<Record> {
        self.records.pop()
    }

    pub(crate) fn pop_front(&mut self) -> Option<Record> {
        if self.records.is_empty() {
            None
        } else {
            Some(self.records.remove(0))
        }
    }

    /// Keeps `records[..at]` and returns the promoted half `records[at..]`.
    pub(crate) fn split_off(&mut self, at: usize) -> Records {
        self.records.drain(at..).collect()
    }

    /// Appends records that sort after everything in this leaf.
    pub(crate) fn append(&mut self, records: Records) {
        self.records.extend(records);
    }

    /// Prepends records that sort before everything in this leaf.
    pub(crate) fn prepend(&mut self, records: Records) {
        self.records.insert_many(0, records);
    }

    /// Consumes the leaf, returning its records.
    pub(crate) fn into_records(self) -> Records {
        self.records
    }
}

impl InternalNode {
    /// Creates a node with a single child and no keys, used as a fresh root.
    pub(crate) fn with_first_child(child: Child) -> Self {
        let mut children = Children::new();
        children.push(child);
        Self::from_parts(Keys::new(), children, None)
    }

    pub(crate) fn from_parts(keys: Keys, children: Children, parent: Option<Handle>) -> Self {
        debug_assert_eq!(keys.len() + 1, children.len());
        Self {
            keys,
            children,
            parent,
            prev: None,
            next: None,
        }
    }

    pub(crate) fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn child_count(&self) -> usize {
        self.children.len()
    }

    pub(crate) fn parent(&self) -> Option<Handle> {
        self.parent
    }

    pub(crate) fn set_parent(&mut self, parent: Option<Handle>) {
        self.parent = parent;
    }

    pub(crate) fn prev(&self) -> Option<Handle> {
        self.prev
    }

    pub(crate) fn set_prev(&mut self, prev: Option<Handle>) {
        self.prev = prev;
    }

    pub(crate) fn next(&self) -> Option<Handle> {
        self.next
    }

    pub(crate) fn set_next(&mut self, next: Option<Handle>) {
        self.next = next;
    }

    #[inline]
    pub(crate) fn key(&self, index: usize) -> i64 {
        self.keys[index]
    }

    pub(crate) fn keys(&self) -> &[i64] {
        &self.keys
    }

    pub(crate) fn set_key(&mut self, index: usize, key: i64) {
        self.keys[index] = key;
    }

    #[inline]
    pub(crate) fn child(&self, index: usize) -> Child {
        self.children[index]
    }

    pub(crate) fn children(&self) -> &[Child] {
        &self.children
    }

    pub(crate) fn last_child(&self) -> Child {
        self.children[self.children.len() - 1]
    }

    /// Index of the child a search for `key` descends into: the first key strictly
    /// greater than `key` selects its child, otherwise the last child.
    #[inline]
    pub(crate) fn route(&self, key: i64) -> usize {
        self.keys.partition_point(|&separator| separator <= key)
    }

    /// Position of `child` in this node's children.
    pub(crate) fn position_of(&self, child: Child) -> Option<usize> {
        self.children.iter().position(|&c| c == child)
    }

    /// Inserts `key` at `index` and `child` immediately after the child at `index`.
    pub(crate) fn insert_child(&mut self, index: usize, key: i64, child: Child) {
        self.keys.insert(index, key);
        self.children.insert(index + 1, child);
    }

    pub(crate) fn remove_key(&mut self, index: usize) -> i64 {
        self.keys.remove(index)
    }

    pub(crate) fn remove_child(&mut self, index: usize) -> Child {
        self.children.remove(index)
    }

    /// Pushes a key and child to the end.
    pub(crate) fn push(&mut self, key: i64, child: Child) {
        self.keys.push(key);
        self.children.push(child);
    }

    /// Pushes a child to the front, with `key` separating it from the old first child.
    pub(crate) fn push_front(&mut self, key: i64, child: Child) {
        self.keys.insert(0, key);
        self.children.insert(0, child);
    }

    /// Pops the last key and child.
    pub(crate) fn pop(&mut self) -> Option<(i64, Child)> {
        let key = self.keys.pop()?;
        let child = self.children.pop()?;
        Some((key, child))
    }

    /// Pops the first child and the key that separated it from the second.
    pub(crate) fn pop_front(&mut self) -> Option<(i64, Child)> {
        if self.keys.is_empty() {
            return None;
        }
        Some((self.keys.remove(0), self.children.remove(0)))
    }

    /// Splits an overfull node at `at`.
    ///
    /// The key at `at` is removed and returned for promotion; this node keeps
    /// `keys[..at]` and `children[..=at]`, the rest is returned for the new sibling.
    pub(crate) fn split_off(&mut self, at: usize) -> (i64, Keys, Children) {
        let keys: Keys = self.keys.drain(at + 1..).collect();
        let children: Children = self.children.drain(at + 1..).collect();
        let promoted = self.keys.pop().expect("split point is inside the key sequence");
        (promoted, keys, children)
    }

    /// Absorbs a right neighbour's contents, `separator` being the parent key between them.
    pub(crate) fn absorb_right(&mut self, separator: i64, keys: Keys, children: Children) {
        self.keys.push(separator);
        self.keys.extend(keys);
        self.children.extend(children);
    }

    /// Absorbs a left neighbour's contents, `separator` being the parent key between them.
    pub(crate) fn absorb_left(&mut self, mut keys: Keys, separator: i64, mut children: Children) {
        keys.push(separator);
        self.keys.insert_many(0, keys);
        children.extend(self.children.drain(..));
        self.children = children;
    }

    /// Consumes the node, returning its keys and children.
    pub(crate) fn into_parts(self) -> (Keys, Children) {
        (self.keys, self.children)
    }
}
