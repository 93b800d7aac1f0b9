//! May abstract cache state: a block categorized Always-Miss is
//! guaranteed absent on every path; anything May ever places in the
//! window must be assumed reachable by at least one execution.

use super::acs::Acs;
use crate::dataflow::Domain;

#[derive(Debug, Clone, PartialEq)]
pub struct MayAcs(pub Option<Acs>);

impl MayAcs {
    pub fn entry(ways: usize) -> Self {
        MayAcs(Some(Acs::empty(ways)))
    }

    pub fn touch(&self, block: u64) -> Self {
        match &self.0 {
            None => MayAcs(None),
            Some(acs) => MayAcs(Some(acs.touch(block).0)),
        }
    }

    pub fn possibly_resident(&self, block: u64) -> bool {
        self.0.as_ref().is_some_and(|acs| acs.age_of_pub(block).is_some())
    }
}

impl Domain for MayAcs {
    fn bottom() -> Self {
        MayAcs(None)
    }

    fn equal(&self, other: &Self) -> bool {
        self == other
    }

    fn join(&self, other: &Self) -> Self {
        match (&self.0, &other.0) {
            (None, b) => MayAcs(b.clone()),
            (a, None) => MayAcs(a.clone()),
            (Some(a), Some(b)) => MayAcs(Some(a.join_may(b))),
        }
    }
}
