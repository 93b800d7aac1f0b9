//! WCET analysis core: a process/CFG model, dominance and loop analyses,
//! a generic dataflow fixpoint engine, instruction-cache abstract
//! interpretation, and IPET ILP generation and solving.
//!
//! The crate does not load executables or decode instructions itself
//! (see `program` module docs); it consumes a [`program::Process`] built
//! by an external loader and drives every analysis stage through the
//! [`workspace::Workspace`] and [`feature::FeatureRegistry`].

pub mod cache;
pub mod cfg;
pub mod dataflow;
pub mod dom;
pub mod error;
pub mod feature;
pub mod flowfacts;
pub mod ipet;
pub mod lblock;
pub mod pipeline;
pub mod platform_xml;
pub mod program;
pub mod property;
pub mod workspace;

pub use error::{OtawaError, Result};
pub use workspace::Workspace;
