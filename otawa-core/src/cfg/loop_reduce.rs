//! Irreducible-to-reducible loop transformation (`spec.md` §4.4, "Loop
//! reduction").
//!
//! A retreating edge found by a DFS from the entry is a legitimate
//! back-edge only if its sink dominates its source. Any retreating edge
//! that fails this test is a non-dominating entry into a multi-header
//! loop; the target is duplicated so the edge lands on a private copy
//! instead, which strictly reduces the number of such violations each
//! time and so terminates.

use crate::cfg::{BlockId, Cfg};
use crate::dom::Dominance;

/// Duplicate nodes until every retreating edge in a DFS from the entry
/// has a dominating sink.
pub fn reduce(cfg: &mut Cfg) {
    loop {
        let dom = Dominance::compute(cfg);
        let Some((source, sink)) = find_violating_edge(cfg, &dom) else { break };
        duplicate_entry(cfg, source, sink);
    }
}

fn find_violating_edge(cfg: &Cfg, dom: &Dominance) -> Option<(BlockId, BlockId)> {
    let mut visited = vec![false; cfg.block_count()];
    let mut on_stack = vec![false; cfg.block_count()];
    let mut result = None;
    visit(cfg, dom, cfg.entry, &mut visited, &mut on_stack, &mut result);
    result
}

fn visit(
    cfg: &Cfg,
    dom: &Dominance,
    b: BlockId,
    visited: &mut [bool],
    on_stack: &mut [bool],
    result: &mut Option<(BlockId, BlockId)>,
) {
    if result.is_some() {
        return;
    }
    visited[b.index()] = true;
    on_stack[b.index()] = true;
    let mut succs: Vec<BlockId> = cfg.block(b).successors.to_vec();
    succs.sort_by_key(|s| s.0);
    for s in succs {
        if result.is_some() {
            break;
        }
        if on_stack[s.index()] {
            if !dom.dominates(s, b) {
                *result = Some((b, s));
            }
        } else if !visited[s.index()] {
            visit(cfg, dom, s, visited, on_stack, result);
        }
    }
    on_stack[b.index()] = false;
}

/// Redirect `source -> sink` onto a fresh copy of `sink` that mimics its
/// outgoing edges, so `sink` itself keeps only entries a dominator check
/// accepts.
fn duplicate_entry(cfg: &mut Cfg, source: BlockId, sink: BlockId) {
    let kind = cfg.edge(source, sink).expect("violating edge must exist").kind;
    cfg.remove_edge(source, sink);

    let copy_kind = cfg.block(sink).kind.clone();
    let copy = cfg.add_block(copy_kind);

    let successors: Vec<BlockId> = cfg.block(sink).successors.to_vec();
    for succ in successors {
        let succ_kind = cfg.edge(sink, succ).expect("edge must exist").kind;
        cfg.add_edge(copy, succ, succ_kind);
    }

    cfg.add_edge(source, copy, kind);
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
    fn irreducible_multi_entry_loop_gets_duplicated() {
        // Two independent entries into a shared loop body with no single
        // dominating header: classic irreducible graph.
        let mut cfg = Cfg::new(CfgId(0), "f");
        let a = basic(&mut cfg, 0x1000);
        let b = basic(&mut cfg, 0x1004);
        let h1 = basic(&mut cfg, 0x1008);
        let h2 = basic(&mut cfg, 0x100c);
        cfg.add_edge(cfg.entry, a, EdgeKind::Virtual);
        cfg.add_edge(a, h1, EdgeKind::Taken);
        cfg.add_edge(a, b, EdgeKind::NotTaken);
        cfg.add_edge(b, h2, EdgeKind::NotTaken);
        cfg.add_edge(h1, h2, EdgeKind::NotTaken);
        cfg.add_edge(h2, h1, EdgeKind::NotTaken);
        cfg.add_edge(h1, cfg.exit, EdgeKind::Taken);

        let before = cfg.block_count();
        reduce(&mut cfg);
        assert!(cfg.block_count() > before);

        let dom = Dominance::compute(&cfg);
        assert!(find_violating_edge(&cfg, &dom).is_none());
    }
}
