//! Ordered index of rise/set intervals.
//!
//! Intervals are keyed by rise time in a `BTreeMap`, so both lookups are
//! `O(log n)` regardless of insertion order. Keys follow `f64::total_cmp`.
//!
//! Ordering convention: smaller rise times sort before larger ones (the
//! usual "smaller goes left" BST rule). Inserting a rise time that is
//! already present replaces the stored interval.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;

/// A single (rise, set) pair in an arbitrary monotonic time scale (JD, MJD, ...).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiseSetPair {
    pub rise: f64,
    pub set: f64,
}

impl RiseSetPair {
    pub fn new(rise: f64, set: f64) -> Self {
        Self { rise, set }
    }

    /// `t` lies within `[rise, set]`.
    pub fn contains(&self, t: f64) -> bool {
        self.rise <= t && t <= self.set
    }

    pub fn duration(&self) -> f64 {
        self.set - self.rise
    }
}

#[derive(Debug, Clone, Copy)]
struct RiseKey(f64);

impl PartialEq for RiseKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RiseKey {}

impl PartialOrd for RiseKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RiseKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Index answering "which interval is active at T" and "what rises next".
#[derive(Debug, Clone, Default)]
pub struct RiseSetIndex {
    intervals: BTreeMap<RiseKey, f64>,
}

impl RiseSetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rise: f64, set: f64) {
        self.intervals.insert(RiseKey(rise), set);
    }

    pub fn insert_pair(&mut self, pair: RiseSetPair) {
        self.insert(pair.rise, pair.set);
    }

    /// Interval with the greatest rise `<= t` (last-rise-wins).
    ///
    /// The returned interval may already have set; use [`Self::active_at`]
    /// to require `t <= set`.
    pub fn last_rise_at_or_before(&self, t: f64) -> Option<RiseSetPair> {
        self.intervals
            .range(..=RiseKey(t))
            .next_back()
            .map(|(rise, set)| RiseSetPair::new(rise.0, *set))
    }

    /// Interval with the smallest rise strictly greater than `t`.
    pub fn next_rise_after(&self, t: f64) -> Option<RiseSetPair> {
        self.intervals
            .range((Bound::Excluded(RiseKey(t)), Bound::Unbounded))
            .next()
            .map(|(rise, set)| RiseSetPair::new(rise.0, *set))
    }

    /// Interval covering `t`, if any.
    pub fn active_at(&self, t: f64) -> Option<RiseSetPair> {
        self.last_rise_at_or_before(t).filter(|pair| pair.contains(t))
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Intervals in ascending rise order.
    pub fn iter(&self) -> impl Iterator<Item = RiseSetPair> + '_ {
        self.intervals
            .iter()
            .map(|(rise, set)| RiseSetPair::new(rise.0, *set))
    }
}

impl FromIterator<RiseSetPair> for RiseSetIndex {
    fn from_iter<I: IntoIterator<Item = RiseSetPair>>(iter: I) -> Self {
        let mut index = RiseSetIndex::new();
        for pair in iter {
            index.insert_pair(pair);
        }
        index
    }
}

impl FromIterator<(f64, f64)> for RiseSetIndex {
    fn from_iter<I: IntoIterator<Item = (f64, f64)>>(iter: I) -> Self {
        iter.into_iter()
            .map(|(rise, set)| RiseSetPair::new(rise, set))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_index() -> RiseSetIndex {
        // Deliberately out of order.
        [(20.0, 25.0), (0.0, 5.0), (10.0, 15.0), (30.0, 35.0)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_empty_index_returns_none() {
        let index = RiseSetIndex::new();
        assert!(index.is_empty());
        assert_eq!(index.last_rise_at_or_before(100.0), None);
        assert_eq!(index.next_rise_after(-100.0), None);
        assert_eq!(index.active_at(0.0), None);
    }

    #[test]
    fn test_last_rise_at_or_before() {
        let index = sample_index();
        assert_eq!(index.last_rise_at_or_before(12.0), Some(RiseSetPair::new(10.0, 15.0)));
        assert_eq!(index.last_rise_at_or_before(10.0), Some(RiseSetPair::new(10.0, 15.0)));
        // Between intervals the last risen one is still returned.
        assert_eq!(index.last_rise_at_or_before(17.0), Some(RiseSetPair::new(10.0, 15.0)));
        assert_eq!(index.last_rise_at_or_before(-1.0), None);
        assert_eq!(index.last_rise_at_or_before(1e9), Some(RiseSetPair::new(30.0, 35.0)));
    }

    #[test]
    fn test_next_rise_after_is_strict() {
        let index = sample_index();
        assert_eq!(index.next_rise_after(10.0), Some(RiseSetPair::new(20.0, 25.0)));
        assert_eq!(index.next_rise_after(9.99), Some(RiseSetPair::new(10.0, 15.0)));
        assert_eq!(index.next_rise_after(-5.0), Some(RiseSetPair::new(0.0, 5.0)));
        assert_eq!(index.next_rise_after(30.0), None);
    }

    #[test]
    fn test_active_at_requires_cover() {
        let index = sample_index();
        assert_eq!(index.active_at(12.0), Some(RiseSetPair::new(10.0, 15.0)));
        assert_eq!(index.active_at(15.0), Some(RiseSetPair::new(10.0, 15.0)));
        assert_eq!(index.active_at(17.0), None);
    }

    #[test]
    fn test_duplicate_rise_replaces() {
        let mut index = RiseSetIndex::new();
        index.insert(1.0, 2.0);
        index.insert(1.0, 3.0);
        assert_eq!(index.len(), 1);
        assert_eq!(index.last_rise_at_or_before(1.0), Some(RiseSetPair::new(1.0, 3.0)));
    }

    #[test]
    fn test_iter_sorted() {
        let rises: Vec<f64> = sample_index().iter().map(|p| p.rise).collect();
        assert_eq!(rises, vec![0.0, 10.0, 20.0, 30.0]);
    }

    proptest! {
        #[test]
        fn prop_each_inserted_rise_finds_itself(
            rises in proptest::collection::hash_set(-1_000_000i64..1_000_000, 1..200)
        ) {
            let pairs: Vec<RiseSetPair> = rises
                .iter()
                .map(|r| RiseSetPair::new(*r as f64 / 8.0, *r as f64 / 8.0 + 0.1))
                .collect();
            let index: RiseSetIndex = pairs.iter().copied().collect();
            prop_assert_eq!(index.len(), pairs.len());
            for pair in &pairs {
                prop_assert_eq!(index.last_rise_at_or_before(pair.rise), Some(*pair));
            }
        }

        #[test]
        fn prop_next_rise_after_is_minimal(
            rises in proptest::collection::vec(-1_000.0f64..1_000.0, 0..100),
            t in -1_100.0f64..1_100.0
        ) {
            let index: RiseSetIndex = rises.iter().map(|r| (*r, *r + 1.0)).collect();
            let expected = rises
                .iter()
                .copied()
                .filter(|r| *r > t)
                .fold(None, |acc: Option<f64>, r| Some(acc.map_or(r, |a| a.min(r))));
            prop_assert_eq!(index.next_rise_after(t).map(|p| p.rise), expected);
        }
    }
}
