//! The generic dataflow engine (component C7, `spec.md` §4.6): a domain
//! contract, a block-indexed Kildall fixpoint, and observability hooks.
//! The cache abstract interpretation (C9) and loop-bound propagation
//! both run on top of this rather than hand-rolling their own worklist.

pub mod domain;
pub mod engine;
pub mod listener;

pub use domain::Domain;
pub use engine::fixpoint;
pub use listener::{fixpoint_with_listener, Listener, RecordingListener, UnrollingListener};
