//! Funnel hashing: a cascade of geometrically shrinking levels, each gated
//! by an occupancy threshold.
//!
//! An insertion walks the levels in order and settles in the first one
//! still below its threshold; as early levels saturate, traffic funnels
//! down to later, emptier ones. Each level derives its probe sequence
//! from the shared hash through a cheap level-dependent mix so the
//! cascades stay decorrelated.

use crate::common::{
    Entry, HashFn, OpKind, ProbeStats, default_hash, empty_slots, fill_ceiling,
    valid_unit_interval,
};

const MAX_LEVELS: usize = 8;
const MIN_LEVEL_SIZE: usize = 4;

#[derive(Debug)]
struct Level {
    slots: Vec<Option<Entry>>,
    len: usize,
    threshold: f64,
}

impl Level {
    fn with_capacity(capacity: usize, threshold: f64) -> Self {
        Self {
            slots: empty_slots(capacity),
            len: 0,
            threshold,
        }
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn load_factor(&self) -> f64 {
        self.len as f64 / self.capacity() as f64
    }

    fn accepts_insertions(&self) -> bool {
        self.load_factor() < self.threshold
    }
}

/// Open-addressed table with threshold-gated level cascade.
#[derive(Debug)]
pub struct FunnelTable {
    levels: Vec<Level>,
    len: usize,
    capacity: usize,
    max_entries: usize,
    hash: HashFn,
    stats: ProbeStats,
}

impl FunnelTable {
    /// Create a table with `capacity` total slots filling to `1 - delta`.
    ///
    /// Returns `None` when `capacity` is zero or `delta` is outside (0, 1).
    pub fn new(capacity: usize, delta: f64) -> Option<Self> {
        Self::with_hasher(capacity, delta, default_hash)
    }

    pub fn with_hasher(capacity: usize, delta: f64, hash: HashFn) -> Option<Self> {
        if capacity == 0 || !valid_unit_interval(delta) {
            return None;
        }

        let level_sizes = partition_levels(capacity, level_count(delta));
        let levels = level_sizes
            .into_iter()
            .enumerate()
            .map(|(idx, size)| Level::with_capacity(size, level_threshold(idx, delta)))
            .collect::<Vec<_>>();

        Some(Self {
            levels,
            len: 0,
            capacity,
            max_entries: fill_ceiling(capacity, 1.0 - delta),
            hash,
            stats: ProbeStats::new(capacity),
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> &ProbeStats {
        &self.stats
    }

    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.capacity as f64
    }

    /// Insert or overwrite. Returns `false` when the fill ceiling has been
    /// reached or every admissible level's probe sequence is exhausted.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> bool {
        let (found, probes) = self.find_slot(key);
        if let Some((level_idx, slot_idx)) = found {
            if let Some(entry) = self.levels[level_idx].slots[slot_idx].as_mut() {
                entry.value = value.into();
            }
            self.stats.record(OpKind::Insert, probes);
            return true;
        }

        if self.len >= self.max_entries {
            self.stats.record(OpKind::Insert, 0);
            return false;
        }

        let mut probes = 0;
        match self.place_new_key(key, &mut probes) {
            Some((level_idx, slot_idx)) => {
                self.levels[level_idx].slots[slot_idx] = Some(Entry::new(key, value));
                self.levels[level_idx].len += 1;
                self.len += 1;
                self.stats.num_entries = self.len;
                self.stats.record(OpKind::Insert, probes);
                true
            }
            None => {
                self.stats.record(OpKind::Insert, probes);
                false
            }
        }
    }

    /// The returned borrow is valid until the next call that takes
    /// `&mut self`.
    pub fn lookup(&mut self, key: &[u8]) -> Option<&[u8]> {
        let (found, probes) = self.find_slot(key);
        self.stats.record(OpKind::Lookup, probes);
        found.and_then(|(level_idx, slot_idx)| {
            self.levels[level_idx].slots[slot_idx]
                .as_ref()
                .map(|entry| &*entry.value)
        })
    }

    /// Remove a key, freeing its slot. As with the other variants no slot
    /// repair is performed; sequences passing through the hole terminate
    /// early afterwards.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        let (found, probes) = self.find_slot(key);
        match found {
            Some((level_idx, slot_idx)) => {
                self.levels[level_idx].slots[slot_idx] = None;
                self.levels[level_idx].len -= 1;
                self.len -= 1;
                self.stats.num_entries = self.len;
                self.stats.record(OpKind::Delete, probes);
                true
            }
            None => {
                self.stats.record(OpKind::Delete, probes);
                false
            }
        }
    }

    /// First-fit over admissible levels.
    fn place_new_key(&self, key: &[u8], probes: &mut u32) -> Option<(usize, usize)> {
        for (level_idx, level) in self.levels.iter().enumerate() {
            if !level.accepts_insertions() {
                continue;
            }
            for attempt in 0..level.capacity() as u32 {
                let pos = self.probe_position(key, level_idx, attempt);
                *probes += 1;
                if level.slots[pos].is_none() {
                    return Some((level_idx, pos));
                }
            }
        }
        None
    }

    /// Walk every level's sequence until a match or an empty slot.
    fn find_slot(&self, key: &[u8]) -> (Option<(usize, usize)>, u32) {
        let mut probes = 0;
        for (level_idx, level) in self.levels.iter().enumerate() {
            for attempt in 0..level.capacity() as u32 {
                let pos = self.probe_position(key, level_idx, attempt);
                probes += 1;
                match &level.slots[pos] {
                    Some(entry) if entry.key.as_ref() == key => {
                        return (Some((level_idx, pos)), probes);
                    }
                    Some(_) => {}
                    None => break,
                }
            }
        }
        (None, probes)
    }

    fn probe_position(&self, key: &[u8], level_idx: usize, attempt: u32) -> usize {
        let mixed = level_mix((self.hash)(key, attempt), level_idx);
        mixed as usize % self.levels[level_idx].capacity()
    }

    #[cfg(test)]
    fn level_occupancy(&self) -> Vec<usize> {
        self.levels.iter().map(|level| level.len).collect()
    }
}

/// Cheap per-level decorrelation of the shared hash.
fn level_mix(hash: u32, level: usize) -> u32 {
    match level {
        0 => hash,
        1 => hash ^ (hash >> 16),
        2 => hash ^ (hash >> 8) ^ (hash >> 16) ^ (hash >> 24),
        _ => hash ^ (level as u32).wrapping_mul(0x9E37_79B9),
    }
}

/// Number of levels grows with how tightly the table is allowed to fill.
fn level_count(delta: f64) -> usize {
    let count = ((1.0 / delta).log2() / 4.0).ceil() as usize + 1;
    count.min(MAX_LEVELS)
}

/// Occupancy gate for insertion routing. Level 0 would have a literal
/// threshold of zero under the `1 - 2^(-2*level)` progression, which would
/// keep it permanently skipped, so it instead admits until only the
/// reserve headroom is left.
fn level_threshold(level: usize, delta: f64) -> f64 {
    if level == 0 {
        1.0 - delta / 2.0
    } else {
        1.0 - 1.0 / f64::from(1u32 << (2 * level))
    }
}

/// Level sizes follow the same geometric plan as the elastic partition,
/// with a minimum of `MIN_LEVEL_SIZE` slots per level.
fn partition_levels(capacity: usize, count: usize) -> Vec<usize> {
    let mut sizes = Vec::with_capacity(count);
    let mut allocated = 0usize;

    for idx in 0..count {
        let size = if idx == 0 {
            capacity / 2
        } else if idx == count - 1 {
            capacity.saturating_sub(allocated)
        } else {
            capacity >> (idx + 1)
        };
        let size = size.max(MIN_LEVEL_SIZE);
        sizes.push(size);
        allocated += size;
    }

    sizes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_count_tracks_delta_and_caps_at_eight() {
        assert_eq!(level_count(0.5), 2);
        assert_eq!(level_count(0.1), 2);
        assert_eq!(level_count(0.05), 3);
        assert_eq!(level_count(1e-12), 8);
    }

    #[test]
    fn thresholds_increase_and_level_zero_keeps_reserve() {
        let delta = 0.1;
        assert!((level_threshold(0, delta) - 0.95).abs() < 1e-12);
        assert!((level_threshold(1, delta) - 0.75).abs() < 1e-12);
        assert!((level_threshold(2, delta) - 0.9375).abs() < 1e-12);
        assert!(level_threshold(2, delta) < level_threshold(3, delta));
    }

    #[test]
    fn partition_halves_with_minimum_level_size() {
        let sizes = partition_levels(64, 2);
        assert_eq!(sizes, vec![32, 32]);

        let sizes = partition_levels(1024, 3);
        assert_eq!(sizes, vec![512, 256, 256]);
        assert_eq!(sizes.iter().sum::<usize>(), 1024);

        // Tiny tables still get workable levels.
        let sizes = partition_levels(1, 2);
        assert!(sizes.iter().all(|&size| size >= MIN_LEVEL_SIZE));
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(FunnelTable::new(0, 0.1).is_none());
        assert!(FunnelTable::new(64, 0.0).is_none());
        assert!(FunnelTable::new(64, 1.0).is_none());
        assert!(FunnelTable::new(64, f64::INFINITY).is_none());
    }

    #[test]
    fn insert_lookup_overwrite_and_remove() {
        let mut table = FunnelTable::new(128, 0.1).unwrap();

        assert!(table.insert(b"alpha", b"1"));
        assert!(table.insert(b"beta", b"2"));
        assert_eq!(table.lookup(b"alpha"), Some(&b"1"[..]));
        assert_eq!(table.len(), 2);

        assert!(table.insert(b"alpha", b"9"));
        assert_eq!(table.lookup(b"alpha"), Some(&b"9"[..]));
        assert_eq!(table.len(), 2);

        assert!(table.remove(b"beta"));
        assert_eq!(table.lookup(b"beta"), None);
        assert!(!table.remove(b"beta"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn saturated_level_routes_insertions_downward() {
        // delta of 0.5 gives level 0 a routing threshold of 0.75, so with
        // 32 first-level slots the 25th resident must land deeper.
        let mut table = FunnelTable::new(64, 0.5).unwrap();
        let level_zero_cap = table.levels[0].capacity();
        assert_eq!(level_zero_cap, 32);
        let gate = (0.75 * level_zero_cap as f64).ceil() as usize;

        let mut serial = 0u32;
        while table.levels[0].len < gate {
            let key = format!("key-{serial:04}");
            serial += 1;
            assert!(table.insert(key.as_bytes(), b"v"));
            assert!(serial < 10_000, "level 0 never reached its gate");
        }

        let before = table.level_occupancy();
        let key = format!("key-{serial:04}");
        assert!(table.insert(key.as_bytes(), b"v"));
        let after = table.level_occupancy();

        assert_eq!(after[0], before[0], "level 0 accepted past its threshold");
        assert_eq!(
            after.iter().sum::<usize>(),
            before.iter().sum::<usize>() + 1
        );
    }

    #[test]
    fn deeper_level_receives_after_level_zero_threshold() {
        let mut table = FunnelTable::new(64, 0.1).unwrap();
        // Level 0 has 32 slots and a routing threshold of 0.95: it stops
        // accepting at 31 residents.
        let gate = 31;

        let mut serial = 0u32;
        while table.levels[0].len < gate {
            let key = format!("id-{serial:08}");
            serial += 1;
            table.insert(key.as_bytes(), b"v");
            assert!(serial < 10_000, "level 0 never saturated");
        }

        let before = table.level_occupancy();
        loop {
            let key = format!("id-{serial:08}");
            serial += 1;
            if table.insert(key.as_bytes(), b"v") {
                break;
            }
            assert!(serial < 10_000, "no insert succeeded past the gate");
        }
        let after = table.level_occupancy();

        assert_eq!(after[0], before[0]);
        assert_eq!(after[1], before[1] + 1);
    }

    #[test]
    fn capacity_ceiling_refuses_further_insertions() {
        let mut table = FunnelTable::new(64, 0.5).unwrap();
        assert_eq!(table.max_entries, 32);

        let mut serial = 0u32;
        while table.len() < 32 {
            let key = format!("fill-{serial:04}");
            serial += 1;
            table.insert(key.as_bytes(), b"v");
            assert!(serial < 10_000, "table never reached its ceiling");
        }

        assert!(!table.insert(b"one-too-many", b"v"));
        assert_eq!(table.len(), 32);
    }

    #[test]
    fn failed_operations_still_advance_statistics() {
        let mut table = FunnelTable::new(64, 0.1).unwrap();
        assert_eq!(table.lookup(b"missing"), None);
        assert!(!table.remove(b"missing"));
        assert_eq!(table.stats().lookup_ops, 1);
        assert_eq!(table.stats().delete_ops, 1);
    }
}
