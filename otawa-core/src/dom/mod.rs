//! Dominance and loop-structure analyses (component C6).

pub mod dominance;
pub mod loops;

pub use dominance::Dominance;
pub use loops::{mark_back_edges, LoopNest};
