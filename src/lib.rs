//! # probemap
//!
//! Probe-instrumented open-addressed hash tables over byte-string keys and
//! values. Two probe-sequence schemes with bounded behavior near the fill
//! ceiling, elastic hashing and funnel hashing, sit alongside two
//! classical baselines, linear probing and uniform (double) hashing, so
//! the four can be compared operation-for-operation.
//!
//! Every table counts the slots each operation visits and keeps a running
//! [`ProbeStats`] record: totals, per-operation-kind counters, a monotone
//! maximum, and a bucketed probe-length histogram. Capacity is fixed at
//! creation; once a table's fill ceiling is reached further insertions
//! fail cleanly rather than resizing.
//!
//! ## Usage
//!
//! ```rust
//! use probemap::{HashTable, TableKind};
//!
//! let mut table = HashTable::new(TableKind::Elastic, 1024, 0.1).unwrap();
//! assert!(table.insert(b"apple", b"red"));
//! assert_eq!(table.lookup(b"apple"), Some(&b"red"[..]));
//! assert!(table.remove(b"apple"));
//! assert!(table.stats().num_operations >= 3);
//! ```
//!
//! The concrete variants are exported too for statically dispatched use;
//! see [`ElasticTable`], [`FunnelTable`], [`LinearTable`], and
//! [`UniformTable`].

mod common;
mod elastic;
mod funnel;
mod linear;
mod table;
mod uniform;

pub use common::{HashFn, OpKind, ProbeStats, default_hash};
pub use elastic::ElasticTable;
pub use funnel::FunnelTable;
pub use linear::LinearTable;
pub use table::{HashTable, TableKind};
pub use uniform::UniformTable;
