//! Must abstract cache state: a block categorized Always-Hit is
//! guaranteed present on every path reaching the access.

use super::acs::Acs;
use crate::dataflow::Domain;

/// `None` is the join-identity "this path has not been analyzed yet",
/// distinct from `Some(Acs::empty(ways))` which is the real state at
/// the task entry (a cold cache). The engine's bottom/top vocabulary
/// needs a value usable before `ways` is known, which an `Option`
/// sentinel gives for free.
#[derive(Debug, Clone, PartialEq)]
pub struct MustAcs(pub Option<Acs>);

impl MustAcs {
    pub fn entry(ways: usize) -> Self {
        MustAcs(Some(Acs::empty(ways)))
    }

    pub fn touch(&self, block: u64) -> Self {
        match &self.0 {
            None => MustAcs(None),
            Some(acs) => MustAcs(Some(acs.touch(block).0)),
        }
    }

    /// The guaranteed age of `block`, or `None` if Must can't promise
    /// it is resident at all.
    pub fn age_of(&self, block: u64) -> Option<usize> {
        self.0.as_ref()?.age_of_pub(block)
    }
}

impl Domain for MustAcs {
    fn bottom() -> Self {
        MustAcs(None)
    }

    fn equal(&self, other: &Self) -> bool {
        self == other
    }

    fn join(&self, other: &Self) -> Self {
        match (&self.0, &other.0) {
            (None, b) => MustAcs(b.clone()),
            (a, None) => MustAcs(a.clone()),
            (Some(a), Some(b)) => MustAcs(Some(a.join_must(b))),
        }
    }
}
