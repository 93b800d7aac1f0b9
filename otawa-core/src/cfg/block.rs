//! CFG block variants (component C4).
//!
//! Deep inheritance in the original source (`Inst <- Block <- ProgItem`) is
//! collapsed here to one tagged sum type, matched exhaustively rather than
//! dispatched virtually — see the "Deep inheritance" design note.

use smallvec::SmallVec;

use crate::program::{Address, Instruction};
use crate::property::PropertyStore;

/// Block identifier, local to one [`crate::cfg::graph::Cfg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u32);

impl BlockId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A basic block: a non-empty, ordered instruction sequence with no
/// internal branches, entirely within one segment.
#[derive(Debug, Clone)]
pub struct BasicBlockData {
    pub start: Address,
    pub end: Address,
    pub instructions: Vec<Instruction>,
}

/// A synthetic call block: a placeholder that stands in for a call to
/// `callee` within the caller's CFG. `callee` is `None` until the callee's
/// CFG has been built (or forever, for an unresolved indirect call).
#[derive(Debug, Clone)]
pub struct SynthCallData {
    pub callee: Option<crate::cfg::graph::CfgId>,
    /// Raw callee address, kept even after `callee` resolves so the
    /// builder can report which address an unresolved indirect call
    /// targeted.
    pub target: Option<Address>,
    pub call_site: Address,
    /// Set when a `call ADDR ignore` flow fact forbids virtualization of
    /// this call.
    pub do_not_inline: bool,
    /// Set by the virtualizer when inlining this call would recurse
    /// through a CFG already on the current call stack.
    pub recursive: bool,
}

/// The tagged variant every CFG node is.
#[derive(Debug, Clone)]
pub enum BlockKind {
    Entry,
    Exit,
    Basic(BasicBlockData),
    SynthCall(SynthCallData),
    /// Placeholder for a callee whose CFG has not been built yet.
    Phantom { target: Address },
    /// Distinguished sink for an indirect branch with no supplied target
    /// (§4.4 step 5). Treated by downstream analyses as worst-case: it
    /// always has a virtual edge back to the CFG's exit.
    Unknown,
}

/// One node of a [`crate::cfg::graph::Cfg`].
///
/// Successor/predecessor lists use `SmallVec` because the overwhelming
/// majority of blocks have at most two of either (the teacher's
/// `control_flow.rs` makes the same call for PowerPC basic blocks, and it
/// holds just as well for the architecture-neutral model here).
#[derive(Debug, Clone)]
pub struct Block {
    pub id: BlockId,
    pub kind: BlockKind,
    pub successors: SmallVec<[BlockId; 2]>,
    pub predecessors: SmallVec<[BlockId; 2]>,
    pub props: PropertyStore,
}

impl Block {
    pub fn new(id: BlockId, kind: BlockKind) -> Self {
        Block { id, kind, successors: SmallVec::new(), predecessors: SmallVec::new(), props: PropertyStore::new() }
    }

    pub fn is_entry(&self) -> bool {
        matches!(self.kind, BlockKind::Entry)
    }

    pub fn is_exit(&self) -> bool {
        matches!(self.kind, BlockKind::Exit)
    }

    pub fn is_basic(&self) -> bool {
        matches!(self.kind, BlockKind::Basic(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, BlockKind::Unknown)
    }

    pub fn basic(&self) -> Option<&BasicBlockData> {
        match &self.kind {
            BlockKind::Basic(data) => Some(data),
            _ => None,
        }
    }

    pub fn synth_call(&self) -> Option<&SynthCallData> {
        match &self.kind {
            BlockKind::SynthCall(data) => Some(data),
            _ => None,
        }
    }

    pub fn synth_call_mut(&mut self) -> Option<&mut SynthCallData> {
        match &mut self.kind {
            BlockKind::SynthCall(data) => Some(data),
            _ => None,
        }
    }

    fn add_successor(&mut self, id: BlockId) {
        if !self.successors.contains(&id) {
            self.successors.push(id);
        }
    }

    fn add_predecessor(&mut self, id: BlockId) {
        if !self.predecessors.contains(&id) {
            self.predecessors.push(id);
        }
    }
}

/// Link `from -> to` on both sides of the (already-inserted) block pair.
/// Internal to the `cfg` module: callers go through [`crate::cfg::graph::Cfg`]
/// so the edge list and the adjacency lists never drift apart.
pub(crate) fn link(blocks: &mut [Block], from: BlockId, to: BlockId) {
    blocks[from.index()].add_successor(to);
    blocks[to.index()].add_predecessor(from);
}

pub(crate) fn unlink(blocks: &mut [Block], from: BlockId, to: BlockId) {
    blocks[from.index()].successors.retain(|s| *s != to);
    blocks[to.index()].predecessors.retain(|p| *p != from);
}
