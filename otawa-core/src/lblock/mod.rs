//! L-block construction (component C8, `spec.md` §4.7).
//!
//! A basic block is cut into l-blocks ("line blocks") at every cache-set
//! boundary it crosses, one table per cache level. L-blocks that land on
//! the same `(tag, set)` pair — whether in the same basic block or two
//! different ones — share a cache-block id, since the cache abstract
//! interpretation (C9) only cares about which physical cache block is
//! touched, not which instruction range produced the access.

use std::collections::HashMap;

use crate::cfg::{BlockId, CfgCollection, CfgId};
use crate::program::platform::Cache;
use crate::program::Address;

/// One contiguous instruction range of a basic block that maps entirely
/// to a single cache block.
#[derive(Debug, Clone)]
pub struct LBlock {
    pub cfg: CfgId,
    pub block: BlockId,
    pub start: Address,
    pub end: Address,
    pub set: u32,
    pub tag: u64,
    /// Deduplicated id shared by every l-block (in any basic block) that
    /// maps to the same `(tag, set)`.
    pub cache_block: u64,
}

/// Every l-block of one cache level, plus the per-basic-block ordering
/// needed for the "sequential inside a block" always-hit rule (C9).
#[derive(Debug, Clone, Default)]
pub struct LBlockTable {
    pub lblocks: Vec<LBlock>,
    /// Indices into `lblocks`, in program order, per basic block.
    by_block: HashMap<(CfgId, BlockId), Vec<usize>>,
}

impl LBlockTable {
    /// Build the table for one cache level by walking every basic block
    /// of every CFG in `collection` and cutting at cache-block boundaries.
    pub fn build(collection: &CfgCollection, cache: &Cache) -> Self {
        let mut table = LBlockTable::default();
        let mut cache_block_ids: HashMap<(u64, u32), u64> = HashMap::new();
        let mut next_id = 0u64;

        for cfg in collection.iter() {
            for block in cfg.blocks() {
                let Some(data) = block.basic() else { continue };
                if data.instructions.is_empty() {
                    continue;
                }
                let mut indices = Vec::new();
                let mut current: Option<(u32, u64, Address)> = None;

                for inst in &data.instructions {
                    let (Some(set), Some(tag)) = (cache.set(inst.address), cache.tag(inst.address)) else {
                        continue;
                    };
                    match &mut current {
                        Some((cur_set, cur_tag, start)) if *cur_set == set && *cur_tag == tag => {
                            let _ = start;
                        }
                        Some((cur_set, cur_tag, start)) => {
                            let idx = table.push_lblock(cfg.id, block.id, *start, inst.address, *cur_set, *cur_tag, &mut cache_block_ids, &mut next_id);
                            indices.push(idx);
                            current = Some((set, tag, inst.address));
                        }
                        None => current = Some((set, tag, inst.address)),
                    }
                }
                if let Some((set, tag, start)) = current {
                    let idx = table.push_lblock(cfg.id, block.id, start, data.end, set, tag, &mut cache_block_ids, &mut next_id);
                    indices.push(idx);
                }
                table.by_block.insert((cfg.id, block.id), indices);
            }
        }
        table
    }

    fn push_lblock(
        &mut self,
        cfg: CfgId,
        block: BlockId,
        start: Address,
        end: Address,
        set: u32,
        tag: u64,
        cache_block_ids: &mut HashMap<(u64, u32), u64>,
        next_id: &mut u64,
    ) -> usize {
        let cache_block = *cache_block_ids.entry((tag, set)).or_insert_with(|| {
            let id = *next_id;
            *next_id += 1;
            id
        });
        let idx = self.lblocks.len();
        self.lblocks.push(LBlock { cfg, block, start, end, set, tag, cache_block });
        idx
    }

    /// The l-blocks of one basic block, in program order.
    pub fn of_block(&self, cfg: CfgId, block: BlockId) -> &[usize] {
        self.by_block.get(&(cfg, block)).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn lblock(&self, idx: usize) -> &LBlock {
        &self.lblocks[idx]
    }

    /// True if an earlier l-block of the same basic block already
    /// touches `lblock`'s cache block — the "sequential inside a block"
    /// always-hit rule (`spec.md` §4.9).
    pub fn is_repeat_within_block(&self, idx: usize) -> bool {
        let lb = self.lblock(idx);
        self.of_block(lb.cfg, lb.block).iter().take_while(|&&i| i != idx).any(|&i| self.lblock(i).cache_block == lb.cache_block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::block::BasicBlockData;
    use crate::cfg::{BlockKind, Cfg, CfgId as CId, EdgeKind};
    use crate::program::platform::{ReplacementPolicy, WritePolicy};
    use crate::program::{InstKind, Instruction};
    use smallvec::SmallVec;

    fn inst(addr: u64) -> Instruction {
        Instruction { address: Address::new(addr), size: 4, kind: InstKind::NONE, target: None, reads: SmallVec::new(), writes: SmallVec::new(), semantics: SmallVec::new() }
    }

    #[test]
    fn a_block_spanning_two_cache_sets_is_cut_in_two() {
        let cache = Cache::new(4, 1, 16, ReplacementPolicy::Lru, WritePolicy::WriteBack);
        let mut cfg = Cfg::new(CId(0), "f");
        let instructions = vec![inst(0x0), inst(0x4), inst(0x8), inst(0xc), inst(0x10)];
        let b0 = cfg.add_block(BlockKind::Basic(BasicBlockData { start: Address::new(0x0), end: Address::new(0x14), instructions }));
        cfg.add_edge(cfg.entry, b0, EdgeKind::Virtual);
        cfg.add_edge(b0, cfg.exit, EdgeKind::Virtual);

        let mut collection = CfgCollection::new();
        collection.push(cfg);

        let table = LBlockTable::build(&collection, &cache);
        let indices = table.of_block(CId(0), b0);
        assert_eq!(indices.len(), 2);
        assert_eq!(table.lblock(indices[0]).set, 0);
        assert_eq!(table.lblock(indices[1]).set, 1);
    }

    #[test]
    fn revisiting_a_cache_block_in_the_same_basic_block_is_flagged_repeat() {
        let cache = Cache::new(4, 1, 16, ReplacementPolicy::Lru, WritePolicy::WriteBack);
        let mut cfg = Cfg::new(CId(0), "f");
        // 0x0 and 0x40 both map to set 0 (block size 16, 4 sets -> period 64 bytes).
        let instructions = vec![inst(0x0), inst(0x40)];
        let b0 = cfg.add_block(BlockKind::Basic(BasicBlockData { start: Address::new(0x0), end: Address::new(0x44), instructions }));
        cfg.add_edge(cfg.entry, b0, EdgeKind::Virtual);
        cfg.add_edge(b0, cfg.exit, EdgeKind::Virtual);

        let mut collection = CfgCollection::new();
        collection.push(cfg);

        let table = LBlockTable::build(&collection, &cache);
        let indices = table.of_block(CId(0), b0);
        assert_eq!(indices.len(), 2);
        assert_ne!(table.lblock(indices[0]).tag, table.lblock(indices[1]).tag);
        assert_eq!(table.lblock(indices[0]).set, table.lblock(indices[1]).set);
    }
}
