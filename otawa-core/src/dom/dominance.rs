//! Dominance computation (`spec.md` §4.5).
//!
//! Standard iterative bit-vector data-flow: initial value "all blocks"
//! except the entry (`{entry}`), transfer `out(b) = {b} ∪ ∩ᵢ in(predᵢ)`,
//! iterated to a fixpoint in reverse post-order.

use bitvec::prelude::*;

use crate::cfg::{BlockId, Cfg};

/// Dominance relation over one CFG's blocks, plus the immediate-dominator
/// tree derived from it.
#[derive(Debug, Clone)]
pub struct Dominance {
    block_count: usize,
    /// `dom_sets[b]` is the bitset of blocks dominating `b` (`b` itself
    /// always included).
    dom_sets: Vec<BitVec<u32>>,
    idom: Vec<Option<BlockId>>,
}

impl Dominance {
    /// Compute dominance for every block of `cfg` reachable from its entry.
    pub fn compute(cfg: &Cfg) -> Self {
        let n = cfg.block_count();
        let order = cfg.reverse_postorder();

        let mut dom_sets: Vec<BitVec<u32>> = vec![bitvec![u32, Lsb0; 1; n]; n];
        let entry_idx = cfg.entry.index();
        dom_sets[entry_idx] = bitvec![u32, Lsb0; 0; n];
        dom_sets[entry_idx].set(entry_idx, true);

        let mut changed = true;
        while changed {
            changed = false;
            for &b in &order {
                if b == cfg.entry {
                    continue;
                }
                let preds = &cfg.block(b).predecessors;
                let mut new_set: Option<BitVec<u32>> = None;
                for &p in preds {
                    new_set = Some(match new_set {
                        None => dom_sets[p.index()].clone(),
                        Some(acc) => acc & &dom_sets[p.index()],
                    });
                }
                let mut new_set = new_set.unwrap_or_else(|| bitvec![u32, Lsb0; 0; n]);
                new_set.set(b.index(), true);
                if new_set != dom_sets[b.index()] {
                    dom_sets[b.index()] = new_set;
                    changed = true;
                }
            }
        }

        let idom = compute_idom(cfg, &order, &dom_sets);
        Dominance { block_count: n, dom_sets, idom }
    }

    /// Does `a` dominate `b`? Every block dominates itself.
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        self.dom_sets[b.index()][a.index()]
    }

    /// `a` strictly dominates `b` (dominates it and is not itself).
    pub fn strictly_dominates(&self, a: BlockId, b: BlockId) -> bool {
        a != b && self.dominates(a, b)
    }

    pub fn idom(&self, b: BlockId) -> Option<BlockId> {
        self.idom[b.index()]
    }

    pub fn dominators_of(&self, b: BlockId) -> impl Iterator<Item = BlockId> + '_ {
        self.dom_sets[b.index()].iter_ones().map(BlockId::from_index)
    }

    pub fn block_count(&self) -> usize {
        self.block_count
    }
}

/// Immediate dominator of `b`: the unique strict dominator of `b` that is
/// dominated by every other strict dominator of `b` — equivalently, the
/// strict dominator with the largest dominator set.
fn compute_idom(cfg: &Cfg, order: &[BlockId], dom_sets: &[BitVec<u32>]) -> Vec<Option<BlockId>> {
    let n = dom_sets.len();
    let mut idom = vec![None; n];
    for &b in order {
        if b == cfg.entry {
            continue;
        }
        let mut best: Option<BlockId> = None;
        for candidate in dom_sets[b.index()].iter_ones().map(BlockId::from_index) {
            if candidate == b {
                continue;
            }
            best = match best {
                None => Some(candidate),
                Some(cur) if dom_sets[candidate.index()][cur.index()] => Some(candidate),
                Some(cur) => Some(cur),
            };
        }
        idom[b.index()] = best;
    }
    idom
}

impl BlockId {
    fn from_index(i: usize) -> BlockId {
        BlockId(i as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::block::BasicBlockData;
    use crate::cfg::{BlockKind, CfgId, EdgeKind};
    use crate::program::Address;

    fn basic(cfg: &mut Cfg, start: u64) -> BlockId {
        cfg.add_block(BlockKind::Basic(BasicBlockData {
            start: Address::new(start),
            end: Address::new(start + 4),
            instructions: Vec::new(),
        }))
    }

    #[test]
    fn diamond_join_is_dominated_only_by_common_ancestors() {
        let mut cfg = Cfg::new(CfgId(0), "f");
        let head = basic(&mut cfg, 0x1000);
        let left = basic(&mut cfg, 0x1004);
        let right = basic(&mut cfg, 0x1008);
        let join = basic(&mut cfg, 0x100c);
        cfg.add_edge(cfg.entry, head, EdgeKind::Virtual);
        cfg.add_edge(head, left, EdgeKind::Taken);
        cfg.add_edge(head, right, EdgeKind::NotTaken);
        cfg.add_edge(left, join, EdgeKind::NotTaken);
        cfg.add_edge(right, join, EdgeKind::NotTaken);
        cfg.add_edge(join, cfg.exit, EdgeKind::Virtual);

        let dom = Dominance::compute(&cfg);
        assert!(dom.dominates(head, join));
        assert!(!dom.dominates(left, join));
        assert!(!dom.dominates(right, join));
        assert_eq!(dom.idom(join), Some(head));
    }

    #[test]
    fn loop_header_dominates_its_back_edge_source() {
        let mut cfg = Cfg::new(CfgId(0), "f");
        let header = basic(&mut cfg, 0x1000);
        let body = basic(&mut cfg, 0x1004);
        cfg.add_edge(cfg.entry, header, EdgeKind::Virtual);
        cfg.add_edge(header, body, EdgeKind::Taken);
        cfg.add_edge(body, header, EdgeKind::NotTaken);
        cfg.add_edge(header, cfg.exit, EdgeKind::NotTaken);

        let dom = Dominance::compute(&cfg);
        assert!(dom.dominates(header, body));
    }
}
