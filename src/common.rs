use std::fmt;

/// Hash of a byte-string key, parameterized by an attempt counter.
///
/// Attempt 0 is the plain hash; higher attempts fold the counter back in
/// double-hashing style, so a single primitive can drive every probe
/// sequence in the crate.
pub type HashFn = fn(&[u8], u32) -> u32;

/// djb2 over the key bytes, reseeded per attempt.
///
/// For `attempt > 0` the base hash is advanced by
/// `attempt * (1 + (h mod (2^32 - 1)))`, which keeps successive attempts
/// well separated without rescanning the key.
pub fn default_hash(key: &[u8], attempt: u32) -> u32 {
    let mut hash: u32 = 5381;
    for &byte in key {
        // hash * 33 + byte
        hash = hash.wrapping_shl(5).wrapping_add(hash).wrapping_add(u32::from(byte));
    }

    if attempt > 0 {
        let step = 1u32.wrapping_add(hash % (u32::MAX - 1));
        hash = hash.wrapping_add(attempt.wrapping_mul(step));
    }

    hash
}

/// An occupied slot: the key and value bytes it owns.
#[derive(Debug)]
pub(crate) struct Entry {
    pub(crate) key: Box<[u8]>,
    pub(crate) value: Box<[u8]>,
}

impl Entry {
    pub(crate) fn new(key: &[u8], value: &[u8]) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

pub(crate) fn empty_slots(capacity: usize) -> Vec<Option<Entry>> {
    let mut slots = Vec::with_capacity(capacity);
    slots.resize_with(capacity, || None);
    slots
}

/// Largest element count an insert will admit for a table of `capacity`
/// slots keeping `fraction` of them usable. Always admits at least one
/// element so single-slot tables stay usable.
pub(crate) fn fill_ceiling(capacity: usize, fraction: f64) -> usize {
    let ceiling = (capacity as f64 * fraction).floor() as usize;
    ceiling.max(1)
}

pub(crate) fn valid_unit_interval(value: f64) -> bool {
    value.is_finite() && value > 0.0 && value < 1.0
}

/// Which operation a probe count is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Insert,
    Lookup,
    Delete,
}

/// Cumulative probe accounting for one table.
///
/// Every operation, successful or not, adds its probe count here. The
/// histogram buckets probe lengths as
/// {0, 1, 2, 3, 4, 5-8, 9-16, 17-32, 33-64, >64}.
#[derive(Debug, Clone, Default)]
pub struct ProbeStats {
    pub total_probes: u64,
    pub num_operations: u64,
    pub avg_probes: f64,
    pub num_entries: usize,
    pub table_size: usize,
    pub max_probes: u32,
    pub probe_dist: [u64; 10],

    pub insert_probes: u64,
    pub lookup_probes: u64,
    pub delete_probes: u64,

    pub insert_ops: u64,
    pub lookup_ops: u64,
    pub delete_ops: u64,
}

impl ProbeStats {
    pub(crate) fn new(table_size: usize) -> Self {
        Self {
            table_size,
            ..Self::default()
        }
    }

    pub(crate) fn record(&mut self, kind: OpKind, probes: u32) {
        self.total_probes += u64::from(probes);
        self.num_operations += 1;
        self.avg_probes = self.total_probes as f64 / self.num_operations as f64;

        if probes > self.max_probes {
            self.max_probes = probes;
        }
        self.probe_dist[histogram_bin(probes)] += 1;

        match kind {
            OpKind::Insert => {
                self.insert_ops += 1;
                self.insert_probes += u64::from(probes);
            }
            OpKind::Lookup => {
                self.lookup_ops += 1;
                self.lookup_probes += u64::from(probes);
            }
            OpKind::Delete => {
                self.delete_ops += 1;
                self.delete_probes += u64::from(probes);
            }
        }
    }

    pub fn avg_insert_probes(&self) -> f64 {
        ratio(self.insert_probes, self.insert_ops)
    }

    pub fn avg_lookup_probes(&self) -> f64 {
        ratio(self.lookup_probes, self.lookup_ops)
    }

    pub fn avg_delete_probes(&self) -> f64 {
        ratio(self.delete_probes, self.delete_ops)
    }
}

impl fmt::Display for ProbeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total entries: {}", self.num_entries)?;
        writeln!(f, "Table size: {}", self.table_size)?;
        writeln!(f, "Total probes: {}", self.total_probes)?;
        writeln!(f, "Average probe count: {:.2}", self.avg_probes)?;
        writeln!(f, "Max probes: {}", self.max_probes)?;
        writeln!(f, "Operation count: {}", self.num_operations)?;
        writeln!(
            f,
            "Insert operations: {} (avg probes: {:.2})",
            self.insert_ops,
            self.avg_insert_probes()
        )?;
        writeln!(
            f,
            "Lookup operations: {} (avg probes: {:.2})",
            self.lookup_ops,
            self.avg_lookup_probes()
        )?;
        writeln!(
            f,
            "Delete operations: {} (avg probes: {:.2})",
            self.delete_ops,
            self.avg_delete_probes()
        )?;
        writeln!(f, "Probe distribution:")?;
        for (label, count) in HISTOGRAM_LABELS.iter().zip(self.probe_dist.iter()) {
            writeln!(f, "  {label:>6}: {count}")?;
        }
        Ok(())
    }
}

const HISTOGRAM_LABELS: [&str; 10] =
    ["0", "1", "2", "3", "4", "5-8", "9-16", "17-32", "33-64", ">64"];

fn histogram_bin(probes: u32) -> usize {
    match probes {
        0..=4 => probes as usize,
        5..=8 => 5,
        9..=16 => 6,
        17..=32 => 7,
        33..=64 => 8,
        _ => 9,
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
