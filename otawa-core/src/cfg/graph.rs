//! The CFG and CFG-collection containers (component C4).
//!
//! Blocks live in a contiguous arena (`Vec<Block>`) indexed by integer id,
//! and edges reference blocks by id rather than by pointer — this is the
//! "cyclic graphs without cyclic ownership" design note: a CFG can have
//! back-edges without Rust ever seeing a reference cycle.

use smallvec::SmallVec;

use super::block::{self, Block, BlockId, BlockKind};
use super::edge::{Edge, EdgeKind};
use crate::error::{OtawaError, Result};
use crate::property::PropertyStore;

/// CFG identifier, indexing into a [`CfgCollection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CfgId(pub u32);

impl CfgId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One subroutine's control-flow graph.
///
/// Invariants (checked by [`Cfg::validate`], relied on everywhere else):
/// exactly one entry and one exit; the exit has no outgoing edges; the
/// entry has no incoming edges; every basic block has at least one
/// successor or is the exit.
#[derive(Debug, Clone)]
pub struct Cfg {
    pub id: CfgId,
    pub label: String,
    blocks: Vec<Block>,
    edges: Vec<Edge>,
    pub entry: BlockId,
    pub exit: BlockId,
    /// Synthetic call blocks, in other CFGs, that call this one.
    pub callers: Vec<(CfgId, BlockId)>,
    pub props: PropertyStore,
}

impl Cfg {
    /// Start a new CFG with just its entry and exit sentinels.
    pub fn new(id: CfgId, label: impl Into<String>) -> Self {
        let mut blocks = Vec::new();
        let entry = BlockId(0);
        let exit = BlockId(1);
        blocks.push(Block::new(entry, BlockKind::Entry));
        blocks.push(Block::new(exit, BlockKind::Exit));
        Cfg { id, label: label.into(), blocks, edges: Vec::new(), entry, exit, callers: Vec::new(), props: PropertyStore::new() }
    }

    pub fn add_block(&mut self, kind: BlockKind) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::new(id, kind));
        id
    }

    pub fn add_edge(&mut self, source: BlockId, sink: BlockId, kind: EdgeKind) {
        block::link(&mut self.blocks, source, sink);
        self.edges.push(Edge::new(source, sink, kind));
    }

    pub fn remove_edge(&mut self, source: BlockId, sink: BlockId) {
        block::unlink(&mut self.blocks, source, sink);
        self.edges.retain(|e| !(e.source == source && e.sink == sink));
    }

    /// Redirect every edge with `sink == from` so it instead targets `to`,
    /// preserving edge kind. Used by unrolling to retarget back-edges at
    /// the next loop copy.
    pub fn retarget_sink(&mut self, from: BlockId, to: BlockId) {
        let matches: SmallVec<[(BlockId, EdgeKind); 4]> =
            self.edges.iter().filter(|e| e.sink == from).map(|e| (e.source, e.kind)).collect();
        for (source, kind) in matches {
            self.remove_edge(source, from);
            self.add_edge(source, to, kind);
        }
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn edge(&self, source: BlockId, sink: BlockId) -> Option<&Edge> {
        self.edges.iter().find(|e| e.source == source && e.sink == sink)
    }

    pub fn edge_mut(&mut self, source: BlockId, sink: BlockId) -> Option<&mut Edge> {
        self.edges.iter_mut().find(|e| e.source == source && e.sink == sink)
    }

    /// In-edges ordered (source index, sink index) for deterministic
    /// iteration, per the spec's ordering requirement (§5).
    pub fn in_edges(&self, block: BlockId) -> Vec<&Edge> {
        let mut v: Vec<&Edge> = self.edges.iter().filter(|e| e.sink == block).collect();
        v.sort_by_key(|e| (e.source.0, e.sink.0));
        v
    }

    pub fn out_edges(&self, block: BlockId) -> Vec<&Edge> {
        let mut v: Vec<&Edge> = self.edges.iter().filter(|e| e.source == block).collect();
        v.sort_by_key(|e| (e.source.0, e.sink.0));
        v
    }

    /// Reverse post-order of blocks reachable from the entry, per the
    /// deterministic-tie-break rule of §4.5/§5.
    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        let mut visited = vec![false; self.blocks.len()];
        let mut order = Vec::with_capacity(self.blocks.len());
        let mut stack = vec![(self.entry, false)];
        while let Some((id, processed)) = stack.pop() {
            if processed {
                order.push(id);
                continue;
            }
            if visited[id.index()] {
                continue;
            }
            visited[id.index()] = true;
            stack.push((id, true));
            let mut succs: Vec<BlockId> = self.block(id).successors.to_vec();
            succs.sort_by_key(|b| b.0);
            for succ in succs.into_iter().rev() {
                if !visited[succ.index()] {
                    stack.push((succ, false));
                }
            }
        }
        order.reverse();
        order
    }

    /// Structural validation of the CFG invariants named in `spec.md` §3.
    pub fn validate(&self) -> Result<()> {
        if !self.block(self.entry).predecessors.is_empty() {
            return Err(OtawaError::ConsistencyError(format!("{}: entry has incoming edges", self.label)));
        }
        if !self.block(self.exit).successors.is_empty() {
            return Err(OtawaError::ConsistencyError(format!("{}: exit has outgoing edges", self.label)));
        }
        for block in &self.blocks {
            if block.is_basic() && block.successors.is_empty() {
                return Err(OtawaError::ConsistencyError(format!(
                    "{}: basic block {:?} has no successor and is not the exit",
                    self.label, block.id
                )));
            }
        }
        Ok(())
    }
}

/// An ordered set of CFGs, closed under call-reachability from the task
/// entry, with the task entry at index 0 and a global numbering over all
/// blocks (used by the dataflow engine's array-indexed store).
#[derive(Debug, Clone, Default)]
pub struct CfgCollection {
    cfgs: Vec<Cfg>,
    /// Prefix sum of block counts, for `global_index`.
    offsets: Vec<usize>,
}

impl CfgCollection {
    pub fn new() -> Self {
        CfgCollection { cfgs: Vec::new(), offsets: Vec::new() }
    }

    pub fn push(&mut self, cfg: Cfg) -> CfgId {
        let id = CfgId(self.cfgs.len() as u32);
        self.cfgs.push(cfg);
        self.recompute_offsets();
        id
    }

    fn recompute_offsets(&mut self) {
        let mut offsets = Vec::with_capacity(self.cfgs.len());
        let mut acc = 0usize;
        for cfg in &self.cfgs {
            offsets.push(acc);
            acc += cfg.block_count();
        }
        self.offsets = offsets;
    }

    pub fn task_entry(&self) -> CfgId {
        CfgId(0)
    }

    pub fn get(&self, id: CfgId) -> &Cfg {
        &self.cfgs[id.index()]
    }

    pub fn get_mut(&mut self, id: CfgId) -> &mut Cfg {
        &mut self.cfgs[id.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cfg> {
        self.cfgs.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Cfg> {
        self.cfgs.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.cfgs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cfgs.is_empty()
    }

    /// Total number of blocks across every CFG in the collection.
    pub fn total_blocks(&self) -> usize {
        self.cfgs.iter().map(Cfg::block_count).sum()
    }

    /// Global array-store index for `(cfg, block)`, unique across the
    /// whole collection. Requires [`Self::recompute_offsets`] to be up to
    /// date, which `push` maintains; call [`Self::refresh`] after
    /// mutating a CFG's block count in place (e.g. unrolling).
    pub fn global_index(&self, cfg: CfgId, block: BlockId) -> usize {
        self.offsets[cfg.index()] + block.index()
    }

    /// Recompute offsets after a CFG already in the collection gained or
    /// lost blocks.
    pub fn refresh(&mut self) {
        self.recompute_offsets();
    }

    pub fn find_by_label(&self, label: &str) -> Option<CfgId> {
        self.cfgs.iter().position(|c| c.label == label).map(|i| CfgId(i as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Address;

    fn basic(cfg: &mut Cfg, start: u64) -> BlockId {
        cfg.add_block(BlockKind::Basic(crate::cfg::block::BasicBlockData {
            start: Address::new(start),
            end: Address::new(start + 4),
            instructions: Vec::new(),
        }))
    }

    #[test]
    fn straight_line_cfg_validates() {
        let mut cfg = Cfg::new(CfgId(0), "f");
        let b0 = basic(&mut cfg, 0x1000);
        let b1 = basic(&mut cfg, 0x1004);
        cfg.add_edge(cfg.entry, b0, EdgeKind::Virtual);
        cfg.add_edge(b0, b1, EdgeKind::NotTaken);
        cfg.add_edge(b1, cfg.exit, EdgeKind::Virtual);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn block_with_no_successor_is_invalid() {
        let mut cfg = Cfg::new(CfgId(0), "f");
        let b0 = basic(&mut cfg, 0x1000);
        cfg.add_edge(cfg.entry, b0, EdgeKind::Virtual);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn reverse_postorder_starts_at_entry() {
        let mut cfg = Cfg::new(CfgId(0), "f");
        let b0 = basic(&mut cfg, 0x1000);
        let b1 = basic(&mut cfg, 0x1004);
        cfg.add_edge(cfg.entry, b0, EdgeKind::Virtual);
        cfg.add_edge(b0, b1, EdgeKind::NotTaken);
        cfg.add_edge(b1, cfg.exit, EdgeKind::Virtual);
        let order = cfg.reverse_postorder();
        assert_eq!(order[0], cfg.entry);
    }

    #[test]
    fn collection_global_index_is_offset_by_prior_cfgs() {
        let mut collection = CfgCollection::new();
        let mut cfg0 = Cfg::new(CfgId(0), "a");
        let _ = basic(&mut cfg0, 0x1000);
        collection.push(cfg0);
        let mut cfg1 = Cfg::new(CfgId(1), "b");
        let _ = basic(&mut cfg1, 0x2000);
        collection.push(cfg1);
        assert_eq!(collection.global_index(CfgId(0), BlockId(0)), 0);
        assert_eq!(collection.global_index(CfgId(1), BlockId(0)), collection.get(CfgId(0)).block_count());
    }
}
