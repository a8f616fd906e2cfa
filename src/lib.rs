//! An in-memory B+ tree index mapping `i64` keys to `f64` values.
//!
//! [`BPlusTree`] keeps its records in leaves chained in key order and routes lookups
//! through internal nodes holding separator keys. The tree is parameterized by its
//! [`Order`] `m`: internal nodes hold at most `m` children and leaves at most `m - 1`
//! records, and every node except the root stays at least half full.
//!
//! # Example
//!
//! ```
//! use bplus_tree::BPlusTree;
//!
//! let mut tree = BPlusTree::new(4)?;
//! tree.insert(21, 0.3534);
//! tree.insert(108, 31.907);
//! tree.insert(56089, 3.26);
//! tree.insert(234, 121.56);
//! tree.insert(4325, -109.23);
//!
//! assert_eq!(tree.search(234), Some(121.56));
//! assert_eq!(tree.search_range(23, 99), Vec::<f64>::new());
//! assert_eq!(tree.search_range(100, 5000), [31.907, 121.56, -109.23]);
//!
//! tree.delete(108)?;
//! assert_eq!(tree.search(108), None);
//! tree.validate()?;
//! # Ok::<(), bplus_tree::Error>(())
//! ```
//!
//! # Scripts
//!
//! The [`script`] module runs the line-oriented command language used by the
//! `bplustree` binary (`Initialize(3)`, `Insert(21,0.3534)`, `Search(100,5000)`, ...).
//!
//! # Implementation
//!
//! Leaves and internal nodes live in two arenas and refer to each other by index, so the
//! parent pointers and sibling chains need no unsafe code and no reference counting.
//! Splits, borrows, merges and root changes are reported as `tracing` events at the
//! `trace` level.

#![no_std]
// These forbid rules and lint groups are meant to be very restrictive.
#![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]
// Enable coverage attributes for nightly builds.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

mod error;
mod order;
mod raw;

pub mod bplus_tree;
pub mod script;

pub use bplus_tree::{BPlusTree, Iter, Range};
pub use error::{Error, Result};
pub use order::Order;
