//! The control-flow graph model and its builders/transformations
//! (components C4 and C5).

pub mod block;
pub mod builder;
pub mod edge;
pub mod graph;
pub mod loop_reduce;
pub mod subcfg;
pub mod unroll;
pub mod virtualize;

pub use block::{BasicBlockData, Block, BlockId, BlockKind, SynthCallData};
pub use edge::{Edge, EdgeKind};
pub use graph::{Cfg, CfgCollection, CfgId};
