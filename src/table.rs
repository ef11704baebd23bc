//! Dispatch layer: one handle type over the four table variants.
//!
//! `HashTable` pairs a kind tag with a boxed capability object, so callers
//! pick a variant at creation time and use one surface for the rest of the
//! table's life. The capability trait stays crate-private; the concrete
//! tables are still exported for callers that want a statically dispatched
//! variant.

use std::fmt;

use crate::common::{HashFn, ProbeStats, default_hash};
use crate::elastic::ElasticTable;
use crate::funnel::FunnelTable;
use crate::linear::LinearTable;
use crate::uniform::UniformTable;

/// Table variant selector.
///
/// `param` in [`HashTable::new`] is the reserve fraction `delta` for
/// `Elastic` and `Funnel`, and the maximum load factor for `Linear` and
/// `Uniform`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    Elastic,
    Funnel,
    Linear,
    Uniform,
}

impl TableKind {
    pub const ALL: [TableKind; 4] = [
        TableKind::Elastic,
        TableKind::Funnel,
        TableKind::Linear,
        TableKind::Uniform,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TableKind::Elastic => "elastic",
            TableKind::Funnel => "funnel",
            TableKind::Linear => "linear",
            TableKind::Uniform => "uniform",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Capability surface every variant implements; the dispatch wrapper only
/// ever talks through this.
pub(crate) trait ProbeTable: fmt::Debug {
    fn insert(&mut self, key: &[u8], value: &[u8]) -> bool;
    fn lookup(&mut self, key: &[u8]) -> Option<&[u8]>;
    fn remove(&mut self, key: &[u8]) -> bool;
    fn len(&self) -> usize;
    fn capacity(&self) -> usize;
    fn stats(&self) -> &ProbeStats;
}

macro_rules! impl_probe_table {
    ($table:ty) => {
        impl ProbeTable for $table {
            fn insert(&mut self, key: &[u8], value: &[u8]) -> bool {
                <$table>::insert(self, key, value)
            }
            fn lookup(&mut self, key: &[u8]) -> Option<&[u8]> {
                <$table>::lookup(self, key)
            }
            fn remove(&mut self, key: &[u8]) -> bool {
                <$table>::remove(self, key)
            }
            fn len(&self) -> usize {
                <$table>::len(self)
            }
            fn capacity(&self) -> usize {
                <$table>::capacity(self)
            }
            fn stats(&self) -> &ProbeStats {
                <$table>::stats(self)
            }
        }
    };
}

impl_probe_table!(ElasticTable);
impl_probe_table!(FunnelTable);
impl_probe_table!(LinearTable);
impl_probe_table!(UniformTable);

/// A probe-instrumented open-addressed table of a caller-chosen kind.
///
/// Capacity is fixed at creation; insertion fails once the variant's fill
/// ceiling is reached. All operations update the table's [`ProbeStats`].
#[derive(Debug)]
pub struct HashTable {
    kind: TableKind,
    inner: Box<dyn ProbeTable>,
}

impl HashTable {
    /// Create a table of `kind` with `capacity` slots and the default
    /// byte-string hash. Returns `None` when `capacity` is zero or `param`
    /// is outside (0, 1).
    pub fn new(kind: TableKind, capacity: usize, param: f64) -> Option<Self> {
        Self::with_hasher(kind, capacity, param, default_hash)
    }

    /// Same as [`HashTable::new`] with a caller-supplied hash function.
    pub fn with_hasher(
        kind: TableKind,
        capacity: usize,
        param: f64,
        hash: HashFn,
    ) -> Option<Self> {
        let inner: Box<dyn ProbeTable> = match kind {
            TableKind::Elastic => Box::new(ElasticTable::with_hasher(capacity, param, hash)?),
            TableKind::Funnel => Box::new(FunnelTable::with_hasher(capacity, param, hash)?),
            TableKind::Linear => Box::new(LinearTable::with_hasher(capacity, param, hash)?),
            TableKind::Uniform => Box::new(UniformTable::with_hasher(capacity, param, hash)?),
        };
        Some(Self { kind, inner })
    }

    pub fn kind(&self) -> TableKind {
        self.kind
    }

    /// Insert or overwrite `key`. Returns `false` on capacity or probe
    /// budget exhaustion; the table stays consistent either way.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> bool {
        self.inner.insert(key, value)
    }

    /// Borrow the value stored under `key`. The borrow is valid until the
    /// next call that takes `&mut self`; copy the bytes out for longer
    /// retention.
    pub fn lookup(&mut self, key: &[u8]) -> Option<&[u8]> {
        self.inner.lookup(key)
    }

    /// Remove `key`, returning whether it was present.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        self.inner.remove(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    pub fn stats(&self) -> &ProbeStats {
        self.inner.stats()
    }

    pub fn load_factor(&self) -> f64 {
        let capacity = self.inner.capacity();
        if capacity == 0 {
            0.0
        } else {
            self.inner.len() as f64 / capacity as f64
        }
    }

    pub fn avg_insert_probes(&self) -> f64 {
        self.inner.stats().avg_insert_probes()
    }

    pub fn avg_lookup_probes(&self) -> f64 {
        self.inner.stats().avg_lookup_probes()
    }

    pub fn avg_delete_probes(&self) -> f64 {
        self.inner.stats().avg_delete_probes()
    }
}
