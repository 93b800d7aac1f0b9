//! Persistence abstract cache state (`spec.md` §4.8–§4.9): a Must-style
//! ACS plus a per-frame ⊥ set of blocks known to have fallen out of the
//! tracked window at least once. A block categorized First-Miss(h) is
//! one the Persistence domain can prove is resident on loop entry but
//! can still be evicted by later iterations of `h`.
//!
//! `enter_context`/`leave_context` push and pop one frame per loop
//! nesting level the dataflow engine crosses, so that an inner loop's
//! evictions are visible to the outer context without the outer
//! context's own residency guarantees being corrupted by the inner
//! loop's churn.

use std::collections::HashSet;

use super::acs::Acs;
use crate::dataflow::Domain;

#[derive(Debug, Clone, PartialEq)]
struct Frame {
    resident: Acs,
    evicted: HashSet<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersistenceAcs(Option<Vec<Frame>>);

impl PersistenceAcs {
    pub fn entry(ways: usize) -> Self {
        PersistenceAcs(Some(vec![Frame { resident: Acs::empty(ways), evicted: HashSet::new() }]))
    }

    pub fn touch(&self, block: u64) -> Self {
        let Some(frames) = &self.0 else { return PersistenceAcs(None) };
        let mut frames = frames.clone();
        let top = frames.last_mut().expect("persistence state always has at least one frame");
        let (resident, fell_off) = top.resident.touch(block);
        top.resident = resident;
        top.evicted.extend(fell_off);
        PersistenceAcs(Some(frames))
    }

    /// The guaranteed residency age, if Must-like residency holds in
    /// the innermost frame.
    pub fn age_of(&self, block: u64) -> Option<usize> {
        self.0.as_ref()?.last()?.resident.age_of_pub(block)
    }

    /// True once `block` has fallen out of the tracked window at least
    /// once anywhere in the current nesting.
    pub fn ever_evicted(&self, block: u64) -> bool {
        self.0.as_ref().is_some_and(|frames| frames.iter().any(|f| f.evicted.contains(&block)))
    }
}

impl Domain for PersistenceAcs {
    fn bottom() -> Self {
        PersistenceAcs(None)
    }

    fn equal(&self, other: &Self) -> bool {
        self == other
    }

    fn join(&self, other: &Self) -> Self {
        match (&self.0, &other.0) {
            (None, b) => PersistenceAcs(b.clone()),
            (a, None) => PersistenceAcs(a.clone()),
            (Some(a), Some(b)) => {
                let depth = a.len().min(b.len());
                let mut joined = Vec::with_capacity(depth);
                for i in 0..depth {
                    let fa = &a[a.len() - depth + i];
                    let fb = &b[b.len() - depth + i];
                    joined.push(Frame {
                        resident: fa.resident.join_must(&fb.resident),
                        evicted: fa.evicted.union(&fb.evicted).copied().collect(),
                    });
                }
                PersistenceAcs(Some(joined))
            }
        }
    }

    fn enter_context(&self) -> Self {
        match &self.0 {
            None => PersistenceAcs(None),
            Some(frames) => {
                let ways = frames.last().map(|f| f.resident.ways()).unwrap_or(0);
                let mut frames = frames.clone();
                frames.push(Frame { resident: Acs::empty(ways), evicted: HashSet::new() });
                PersistenceAcs(Some(frames))
            }
        }
    }

    fn leave_context(&self) -> Self {
        match &self.0 {
            None => PersistenceAcs(None),
            Some(frames) if frames.len() <= 1 => PersistenceAcs(Some(frames.clone())),
            Some(frames) => {
                let mut frames = frames.clone();
                let inner = frames.pop().expect("len > 1 checked above");
                let outer = frames.last_mut().expect("len > 1 checked above");
                outer.resident = inner.resident;
                outer.evicted = outer.evicted.union(&inner.evicted).copied().collect();
                PersistenceAcs(Some(frames))
            }
        }
    }
}
