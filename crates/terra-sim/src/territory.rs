//! Territory as a packed coordinate set, and the add/sub delta between two
//! snapshots of it. Kept as a `HashSet<u32>` of `(x<<16)|y` so set
//! difference (the hot path for broadcast) is a HashSet operation rather
//! than a paired-array scan; paired arrays are a serialization format, not
//! the working representation.

use std::collections::HashSet;

/// Packs grid coordinates into the set's native key. Grid dimensions are
/// bounded well under 2^16 per axis by the map generator's own limits.
pub fn pack(x: u32, y: u32) -> u32 {
    (x << 16) | (y & 0xFFFF)
}

pub fn unpack(key: u32) -> (u32, u32) {
    (key >> 16, key & 0xFFFF)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Territory(HashSet<u32>);

impl Territory {
    pub fn new() -> Self {
        Self(HashSet::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.0.contains(&pack(x, y))
    }

    pub fn insert(&mut self, x: u32, y: u32) -> bool {
        self.0.insert(pack(x, y))
    }

    pub fn remove(&mut self, x: u32, y: u32) -> bool {
        self.0.remove(&pack(x, y))
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.0.iter().copied().map(unpack)
    }

    /// Paired `{x[], y[]}` form used by the wire protocol. Order is whatever
    /// the backing hash set yields; clients treat territory as an unordered
    /// set, so this is not required to be stable across calls.
    pub fn to_coords(&self) -> (Vec<u32>, Vec<u32>) {
        let mut xs = Vec::with_capacity(self.0.len());
        let mut ys = Vec::with_capacity(self.0.len());
        for (x, y) in self.iter() {
            xs.push(x);
            ys.push(y);
        }
        (xs, ys)
    }

    pub fn from_coords(xs: &[u32], ys: &[u32]) -> Self {
        let mut set = HashSet::with_capacity(xs.len());
        for (&x, &y) in xs.iter().zip(ys) {
            set.insert(pack(x, y));
        }
        Self(set)
    }
}

/// The additive/subtractive coordinate sets that transform a subscriber's
/// prior territory snapshot into the current one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub add: Territory,
    pub sub: Territory,
}

impl Delta {
    /// `add = new \ old`, `sub = old \ new`.
    pub fn diff(old: &Territory, new: &Territory) -> Self {
        let add = Territory(new.0.difference(&old.0).copied().collect());
        let sub = Territory(old.0.difference(&new.0).copied().collect());
        Delta { add, sub }
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.sub.is_empty()
    }

    /// Applies this delta to a territory snapshot: removes `sub`, then adds
    /// `add`. Idempotent when `add ∩ territory == ∅` and `sub ⊆ territory`.
    pub fn apply(&self, territory: &Territory) -> Territory {
        let mut next = territory.0.clone();
        for key in &self.sub.0 {
            next.remove(key);
        }
        for key in &self.add.0 {
            next.insert(*key);
        }
        Territory(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trips() {
        for (x, y) in [(0, 0), (50, 50), (65535, 65535), (1, 65534)] {
            assert_eq!(unpack(pack(x, y)), (x, y));
        }
    }

    #[test]
    fn diff_computes_add_and_sub() {
        let old = Territory::from_coords(&[1, 2], &[1, 2]);
        let new = Territory::from_coords(&[2, 3], &[2, 3]);
        let delta = Delta::diff(&old, &new);
        assert_eq!(delta.add.to_coords(), (vec![3], vec![3]));
        assert_eq!(delta.sub.to_coords(), (vec![1], vec![1]));
    }

    #[test]
    fn apply_delta_is_idempotent_under_precondition() {
        let territory = Territory::from_coords(&[1, 2, 3], &[1, 2, 3]);
        let delta = Delta {
            add: Territory::from_coords(&[4], &[4]),
            sub: Territory::from_coords(&[1], &[1]),
        };
        let once = delta.apply(&territory);
        let twice = delta.apply(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn defeated_nation_sub_contains_all_prior_cells() {
        let old = Territory::from_coords(&[50], &[50]);
        let new = Territory::new();
        let delta = Delta::diff(&old, &new);
        assert!(delta.add.is_empty());
        assert_eq!(delta.sub.to_coords(), (vec![50], vec![50]));
    }
}
