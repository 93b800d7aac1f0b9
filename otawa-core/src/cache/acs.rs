//! Abstract cache state shared by the Must/May/Persistence domains
//! (`spec.md` §4.8, Ferdinand & Heckmann's cache behavior prediction by
//! abstract interpretation).
//!
//! Only LRU replacement is modeled; a non-LRU cache falls back to
//! Not-Classified everywhere (see `cache::categorize`).

use std::collections::HashSet;

/// One age-indexed slot vector: `slots[0]` is most recently used,
/// `slots[ways - 1]` is least recently used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acs {
    pub slots: Vec<HashSet<u64>>,
}

impl Acs {
    pub fn empty(ways: usize) -> Self {
        Acs { slots: vec![HashSet::new(); ways] }
    }

    pub fn ways(&self) -> usize {
        self.slots.len()
    }

    fn age_of(&self, block: u64) -> Option<usize> {
        self.slots.iter().position(|s| s.contains(&block))
    }

    /// LRU touch: `block` moves to age 0, everything younger than its
    /// old position shifts one slot older, anything already older is
    /// untouched. Returns the set of blocks shifted out of the window
    /// entirely (age `ways`), if any — the Persistence ⊥ candidates.
    pub fn touch(&self, block: u64) -> (Acs, HashSet<u64>) {
        let ways = self.ways();
        let h = self.age_of(block).unwrap_or(ways);
        let mut new_slots = vec![HashSet::new(); ways];
        new_slots[0].insert(block);
        for i in 1..ways {
            if i <= h {
                let mut s = self.slots[i - 1].clone();
                s.remove(&block);
                new_slots[i] = s;
            } else {
                new_slots[i] = self.slots[i].clone();
            }
        }
        let mut fell_off = HashSet::new();
        if h >= ways.saturating_sub(1) && ways > 0 {
            let mut dropped = self.slots[ways - 1].clone();
            dropped.remove(&block);
            fell_off = dropped;
        }
        (Acs { slots: new_slots }, fell_off)
    }

    /// Worst-case (maximum) age a block is guaranteed at across both
    /// operands — the Must join.
    pub fn join_must(&self, other: &Acs) -> Acs {
        let ways = self.ways();
        let mut candidates: HashSet<u64> = HashSet::new();
        for s in &self.slots {
            candidates.extend(s.iter().copied());
        }
        let mut result = vec![HashSet::new(); ways];
        for block in candidates {
            if let (Some(a), Some(b)) = (self.age_of(block), other.age_of(block)) {
                result[a.max(b)].insert(block);
            }
        }
        Acs { slots: result }
    }

    /// Best-case (minimum) age a block could be at on either path — the
    /// May join.
    pub fn join_may(&self, other: &Acs) -> Acs {
        let ways = self.ways();
        let mut candidates: HashSet<u64> = HashSet::new();
        for s in self.slots.iter().chain(other.slots.iter()) {
            candidates.extend(s.iter().copied());
        }
        let mut result = vec![HashSet::new(); ways];
        for block in candidates {
            let age = match (self.age_of(block), other.age_of(block)) {
                (Some(a), Some(b)) => a.min(b),
                (Some(a), None) => a,
                (None, Some(b)) => b,
                (None, None) => unreachable!("candidate came from one of the two slot vectors"),
            };
            result[age].insert(block);
        }
        Acs { slots: result }
    }

    pub fn age_of_pub(&self, block: u64) -> Option<usize> {
        self.age_of(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_moves_block_to_age_zero() {
        let acs = Acs::empty(2);
        let (acs, fell) = acs.touch(7);
        assert_eq!(acs.age_of_pub(7), Some(0));
        assert!(fell.is_empty());
    }

    #[test]
    fn touching_a_full_cache_evicts_the_oldest() {
        let acs = Acs::empty(2);
        let (acs, _) = acs.touch(1);
        let (acs, _) = acs.touch(2);
        let (acs, fell) = acs.touch(3);
        assert_eq!(acs.age_of_pub(3), Some(0));
        assert_eq!(acs.age_of_pub(2), Some(1));
        assert_eq!(acs.age_of_pub(1), None);
        assert!(fell.contains(&1));
    }

    #[test]
    fn must_join_takes_the_worse_of_two_ages() {
        let (a, _) = Acs::empty(2).touch(1);
        let (b, _) = Acs::empty(2).touch(1);
        let (b, _) = b.touch(2); // block 1 now at age 1 on this path
        let joined = a.join_must(&b);
        assert_eq!(joined.age_of_pub(1), Some(1));
    }
}
