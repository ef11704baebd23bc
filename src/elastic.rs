//! Elastic hashing: a fixed-capacity open-addressed table whose slots are
//! partitioned into geometrically shrinking sub-arrays.
//!
//! Insertions are steered by a batch pointer that walks the sub-arrays in
//! order, only advancing once the current sub-array reaches its target
//! fill. Within a batch the insertion rule weighs the free fractions of
//! the current and next sub-arrays and either spends a small bounded probe
//! budget up front or commits to one of the two arrays outright. The
//! payoff is that probe counts stay bounded even close to the fill
//! ceiling, where classical open addressing degrades.

use crate::common::{
    Entry, HashFn, OpKind, ProbeStats, default_hash, empty_slots, fill_ceiling,
    valid_unit_interval,
};

/// Hard bound on probes spent by a single lookup across all sub-arrays.
const LOOKUP_TOTAL_CAP: u32 = 200;
/// Per-sub-array lookup budget floor.
const LOOKUP_PER_SUBARRAY_FLOOR: u32 = 20;

#[derive(Debug)]
struct SubArray {
    slots: Vec<Option<Entry>>,
    len: usize,
}

impl SubArray {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: empty_slots(capacity),
            len: 0,
        }
    }

    #[inline]
    fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn free_fraction(&self) -> f64 {
        if self.capacity() == 0 {
            0.0
        } else {
            1.0 - (self.len as f64 / self.capacity() as f64)
        }
    }

    /// Occupancy the batch pointer fills this sub-array to before moving on.
    fn target_fill(&self, delta: f64) -> usize {
        self.capacity() - (delta * self.capacity() as f64 / 2.0) as usize
    }
}

/// Open-addressed table with geometrically partitioned capacity and
/// batch-steered insertion.
#[derive(Debug)]
pub struct ElasticTable {
    subarrays: Vec<SubArray>,
    len: usize,
    capacity: usize,
    max_entries: usize,
    delta: f64,
    hash: HashFn,
    stats: ProbeStats,
}

impl ElasticTable {
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

        let subarrays = partition_subarrays(capacity)
            .into_iter()
            .map(SubArray::with_capacity)
            .collect::<Vec<_>>();

        Some(Self {
            subarrays,
            len: 0,
            capacity,
            max_entries: fill_ceiling(capacity, 1.0 - delta),
            delta,
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
    /// reached or no empty slot falls inside the insertion rule's probe
    /// budget.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> bool {
        let (found, probes) = self.find_slot(key);
        if let Some((sub_idx, slot_idx)) = found {
            if let Some(entry) = self.subarrays[sub_idx].slots[slot_idx].as_mut() {
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
            Some((sub_idx, slot_idx)) => {
                self.subarrays[sub_idx].slots[slot_idx] = Some(Entry::new(key, value));
                self.subarrays[sub_idx].len += 1;
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

    /// Bounded-probe lookup. The returned borrow is valid until the next
    /// call that takes `&mut self`.
    pub fn lookup(&mut self, key: &[u8]) -> Option<&[u8]> {
        let (found, probes) = self.lookup_slot(key);
        self.stats.record(OpKind::Lookup, probes);
        found.and_then(|(sub_idx, slot_idx)| {
            self.subarrays[sub_idx].slots[slot_idx]
                .as_ref()
                .map(|entry| &*entry.value)
        })
    }

    /// Remove a key, freeing its slot. No backward repair is performed, so
    /// probe sequences that passed through the freed slot now terminate
    /// early; later lookups of keys stored past it may miss.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        let (found, probes) = self.find_slot(key);
        match found {
            Some((sub_idx, slot_idx)) => {
                self.subarrays[sub_idx].slots[slot_idx] = None;
                self.subarrays[sub_idx].len -= 1;
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

    /// Probe index for `key` inside sub-array `sub_idx` at `attempt`.
    ///
    /// The pairing of (sub-array, attempt) feeds the hash's attempt slot so
    /// each sub-array sees an independent sequence; the result is then
    /// spread across the sub-array double-hashing style.
    fn probe_position(&self, key: &[u8], sub_idx: usize, attempt: u32) -> usize {
        let hash = (self.hash)(key, pair_seed(sub_idx as u32 + 1, attempt + 1));
        probe_map(hash, attempt, self.subarrays[sub_idx].capacity())
    }

    /// First sub-array still below its target fill.
    fn current_batch(&self) -> usize {
        let mut batch = 0;
        while batch < self.subarrays.len() - 1 {
            let sub = &self.subarrays[batch];
            if sub.len < sub.target_fill(self.delta) {
                break;
            }
            batch += 1;
        }
        batch
    }

    /// Choose the slot for a key not already present, accruing probes.
    fn place_new_key(&self, key: &[u8], probes: &mut u32) -> Option<(usize, usize)> {
        let batch = self.current_batch();

        // The first batch just fills the first sub-array.
        if batch == 0 {
            let budget = self.subarrays[0].capacity() as u32;
            return self
                .first_empty(key, 0, budget, probes)
                .map(|slot_idx| (0, slot_idx));
        }

        let next = batch + 1;
        let free_here = self.subarrays[batch].free_fraction();
        let free_next = if next < self.subarrays.len() {
            self.subarrays[next].free_fraction()
        } else {
            0.0
        };

        if free_here > self.delta / 2.0 && free_next > 0.25 {
            // Both arrays have room: spend a small bounded budget on the
            // current one, then fall back to the next unconditionally.
            let budget = probe_budget(free_here, self.delta);
            if let Some(slot_idx) = self.first_empty(key, batch, budget, probes) {
                return Some((batch, slot_idx));
            }
            let next_budget = self.subarrays[next].capacity() as u32;
            return self
                .first_empty(key, next, next_budget, probes)
                .map(|slot_idx| (next, slot_idx));
        }

        if free_here <= self.delta / 2.0 && next < self.subarrays.len() {
            // Current array is effectively full for this batch.
            let budget = self.subarrays[next].capacity() as u32;
            return self
                .first_empty(key, next, budget, probes)
                .map(|slot_idx| (next, slot_idx));
        }

        if free_next <= 0.25 {
            // Next array is too full to lean on: commit to the current one.
            let budget = self.subarrays[batch].capacity() as u32;
            return self
                .first_empty(key, batch, budget, probes)
                .map(|slot_idx| (batch, slot_idx));
        }

        None
    }

    fn first_empty(
        &self,
        key: &[u8],
        sub_idx: usize,
        budget: u32,
        probes: &mut u32,
    ) -> Option<usize> {
        let sub = &self.subarrays[sub_idx];
        for attempt in 0..budget {
            let pos = self.probe_position(key, sub_idx, attempt);
            *probes += 1;
            if sub.slots[pos].is_none() {
                return Some(pos);
            }
        }
        None
    }

    /// Full-budget search used by delete and by insert's overwrite check.
    /// Walks each sub-array's sequence until a match or an empty slot.
    fn find_slot(&self, key: &[u8]) -> (Option<(usize, usize)>, u32) {
        let mut probes = 0;
        for (sub_idx, sub) in self.subarrays.iter().enumerate() {
            for attempt in 0..sub.capacity() as u32 {
                let pos = self.probe_position(key, sub_idx, attempt);
                probes += 1;
                match &sub.slots[pos] {
                    Some(entry) if entry.key.as_ref() == key => {
                        return (Some((sub_idx, pos)), probes);
                    }
                    Some(_) => {}
                    None => break,
                }
            }
        }
        (None, probes)
    }

    /// Capped search: absent keys must stay cheap, so each sub-array gets
    /// a logarithmic budget and the whole walk is bounded.
    fn lookup_slot(&self, key: &[u8]) -> (Option<(usize, usize)>, u32) {
        let mut probes = 0;
        'subarrays: for (sub_idx, sub) in self.subarrays.iter().enumerate() {
            let budget = lookup_budget(sub.capacity());
            for attempt in 0..budget {
                if probes >= LOOKUP_TOTAL_CAP {
                    break 'subarrays;
                }
                let pos = self.probe_position(key, sub_idx, attempt);
                probes += 1;
                match &sub.slots[pos] {
                    Some(entry) if entry.key.as_ref() == key => {
                        return (Some((sub_idx, pos)), probes);
                    }
                    Some(_) => {}
                    None => continue 'subarrays,
                }
            }
        }
        (None, probes)
    }

    #[cfg(test)]
    fn subarray_occupancy(&self) -> Vec<usize> {
        self.subarrays.iter().map(|sub| sub.len).collect()
    }
}

/// Prefix-free pairing of (sub-array, attempt) into one seed: the attempt's
/// bits interleaved with 1-bits, a separating 0-bit, then the sub-array's
/// bits. Injective until the seed width overflows, which the probe math
/// tolerates.
fn pair_seed(i: u32, j: u32) -> u32 {
    let mut result: u32 = 1;

    let mut j_bits = j;
    while j_bits > 0 {
        result = result.wrapping_shl(2) | ((j_bits & 1) << 1) | 1;
        j_bits >>= 1;
    }

    result = result.wrapping_shl(1);
    let mut i_bits = i;
    while i_bits > 0 {
        result = result.wrapping_shl(1) | (i_bits & 1);
        i_bits >>= 1;
    }

    result
}

/// Double-hashing placement of a seeded hash within a sub-array.
fn probe_map(hash: u32, attempt: u32, size: usize) -> usize {
    if size <= 1 {
        return 0;
    }
    let step = 1u32.wrapping_add(hash % (size as u32 - 1));
    hash.wrapping_add(attempt.wrapping_mul(step)) as usize % size
}

/// Probe budget for the bounded arm of the insertion rule.
fn probe_budget(free_fraction: f64, delta: f64) -> u32 {
    if free_fraction <= 0.0 || delta <= 0.0 {
        return 1;
    }
    (4.0 * (2.0 / delta).ln() / free_fraction).ceil() as u32
}

fn lookup_budget(capacity: usize) -> u32 {
    let log_bound = 3 * ((capacity as f64 + 1.0).log2().ceil() as u32);
    log_bound.max(LOOKUP_PER_SUBARRAY_FLOOR)
}

/// Sub-array sizes: half the capacity, then geometrically shrinking with a
/// floor of one slot, the last absorbing the remainder.
fn partition_subarrays(capacity: usize) -> Vec<usize> {
    let count = (capacity as f64).log2().ceil() as usize + 1;
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
        let size = size.max(1);
        sizes.push(size);
        allocated += size;
    }

    sizes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_sums_to_capacity_and_halves() {
        for capacity in [16usize, 100, 127, 1024, 100_000] {
            let sizes = partition_subarrays(capacity);
            assert_eq!(sizes.iter().sum::<usize>(), capacity, "capacity {capacity}");
            assert_eq!(sizes[0], capacity / 2);
            for window in sizes.windows(2).take(sizes.len().saturating_sub(2)) {
                assert!(window[1] <= window[0]);
            }
        }
        assert_eq!(partition_subarrays(1), vec![1]);
    }

    #[test]
    fn pair_seed_is_injective_over_small_range() {
        let mut seen = std::collections::HashMap::new();
        for i in 1..=16u32 {
            for j in 1..=64u32 {
                if let Some(previous) = seen.insert(pair_seed(i, j), (i, j)) {
                    panic!("seed collision between {previous:?} and {:?}", (i, j));
                }
            }
        }
    }

    #[test]
    fn probe_map_stays_in_range_and_handles_tiny_arrays() {
        assert_eq!(probe_map(12345, 7, 0), 0);
        assert_eq!(probe_map(12345, 7, 1), 0);
        for attempt in 0..50 {
            for size in [2usize, 3, 7, 50] {
                assert!(probe_map(0xDEAD_BEEF, attempt, size) < size);
            }
        }
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(ElasticTable::new(0, 0.1).is_none());
        assert!(ElasticTable::new(64, 0.0).is_none());
        assert!(ElasticTable::new(64, 1.0).is_none());
        assert!(ElasticTable::new(64, -0.5).is_none());
        assert!(ElasticTable::new(64, f64::NAN).is_none());
    }

    #[test]
    fn insert_lookup_and_overwrite() {
        let mut table = ElasticTable::new(64, 0.1).unwrap();

        assert!(table.insert(b"alpha", b"1"));
        assert!(table.insert(b"beta", b"2"));
        assert_eq!(table.lookup(b"alpha"), Some(&b"1"[..]));
        assert_eq!(table.lookup(b"beta"), Some(&b"2"[..]));
        assert_eq!(table.len(), 2);

        assert!(table.insert(b"alpha", b"3"));
        assert_eq!(table.lookup(b"alpha"), Some(&b"3"[..]));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn remove_frees_the_slot() {
        let mut table = ElasticTable::new(64, 0.1).unwrap();
        assert!(table.insert(b"alpha", b"1"));
        assert!(table.remove(b"alpha"));
        assert_eq!(table.lookup(b"alpha"), None);
        assert!(!table.remove(b"alpha"));
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn batch_advances_once_first_subarray_hits_target() {
        let mut table = ElasticTable::new(64, 0.1).unwrap();
        // First sub-array has 32 slots and a target fill of 31.
        let target = table.subarrays[0].target_fill(0.1);
        assert_eq!(target, 31);

        let mut inserted = 0;
        let mut serial = 0u32;
        while table.subarrays[0].len < target {
            let key = format!("key-{serial:04}");
            serial += 1;
            if table.insert(key.as_bytes(), b"v") {
                inserted += 1;
            }
        }
        assert_eq!(table.current_batch(), 1);
        assert!(inserted >= target);
    }

    #[test]
    fn capacity_ceiling_is_floor_of_usable_fraction() {
        let mut table = ElasticTable::new(100, 0.1).unwrap();
        assert_eq!(table.max_entries, 90);

        let mut successes = 0;
        for serial in 0..200u32 {
            let key = format!("fill-{serial:04}");
            if table.insert(key.as_bytes(), b"v") {
                successes += 1;
            }
            if table.len() == 90 {
                break;
            }
        }
        assert_eq!(successes, table.len());
        assert_eq!(table.len(), 90);

        assert!(!table.insert(b"one-too-many", b"v"));
        assert_eq!(table.len(), 90);
    }

    #[test]
    fn failed_operations_still_advance_statistics() {
        let mut table = ElasticTable::new(16, 0.1).unwrap();
        assert_eq!(table.lookup(b"missing"), None);
        assert_eq!(table.stats().lookup_ops, 1);
        assert!(!table.remove(b"missing"));
        assert_eq!(table.stats().delete_ops, 1);
        assert_eq!(table.stats().num_operations, 2);
    }

    #[test]
    fn occupancy_counters_track_subarray_contents() {
        let mut table = ElasticTable::new(32, 0.1).unwrap();
        for serial in 0..10u32 {
            let key = format!("key-{serial}");
            assert!(table.insert(key.as_bytes(), b"v"));
        }
        let total: usize = table.subarray_occupancy().iter().sum();
        assert_eq!(total, table.len());
    }
}
