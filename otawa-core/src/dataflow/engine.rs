//! Kildall worklist fixpoint engine (component C7, `spec.md` §4.6).
//!
//! Implements the array-indexed-by-block store with a FIFO worklist
//! policy; the hash-indexed-by-edge store and the rank/flow-aware
//! worklist policies named in the spec are not built out separately —
//! every analysis in this crate only ever needs per-block state, so the
//! one store variant carries the whole pipeline (see `DESIGN.md`).

use std::collections::VecDeque;

use super::domain::Domain;
use crate::cfg::{BlockId, Cfg};

/// Run the block-indexed Kildall fixpoint to convergence, calling
/// `on_visit(block, in, out, visit_count)` once per block visit.
///
/// `transfer(block, in) -> out` is the domain's update function; its
/// inputs/outputs are joined across predecessors using [`Domain::join`].
pub fn fixpoint<D, T, V>(cfg: &Cfg, entry_value: D, mut transfer: T, mut on_visit: V) -> Vec<D>
where
    D: Domain,
    T: FnMut(BlockId, &D) -> D,
    V: FnMut(BlockId, &D, &D, usize),
{
    let n = cfg.block_count();
    let mut out: Vec<D> = vec![D::bottom(); n];
    out[cfg.entry.index()] = entry_value;
    let mut visits = vec![0usize; n];
    let mut in_worklist = vec![false; n];
    let mut worklist: VecDeque<BlockId> = VecDeque::new();

    push_successors(cfg, cfg.entry, &mut worklist, &mut in_worklist);

    while let Some(v) = worklist.pop_front() {
        in_worklist[v.index()] = false;
        let input = join_predecessors::<D>(cfg, v, &out);
        let new_out = transfer(v, &input);
        visits[v.index()] += 1;
        on_visit(v, &input, &new_out, visits[v.index()]);
        if !new_out.equal(&out[v.index()]) {
            out[v.index()] = new_out;
            push_successors(cfg, v, &mut worklist, &mut in_worklist);
        }
    }
    out
}

fn join_predecessors<D: Domain>(cfg: &Cfg, block: BlockId, out: &[D]) -> D {
    let mut merged: Option<D> = None;
    for edge in cfg.in_edges(block) {
        let pred_out = &out[edge.source.index()];
        merged = Some(match merged {
            None => pred_out.clone(),
            Some(acc) => acc.join(pred_out),
        });
    }
    merged.unwrap_or_else(D::bottom)
}

fn push_successors(cfg: &Cfg, from: BlockId, worklist: &mut VecDeque<BlockId>, in_worklist: &mut [bool]) {
    let mut succs: Vec<BlockId> = cfg.block(from).successors.to_vec();
    succs.sort_by_key(|b| b.0);
    for s in succs {
        if !in_worklist[s.index()] {
            in_worklist[s.index()] = true;
            worklist.push_back(s);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::block::BasicBlockData;
    use crate::cfg::{BlockKind, CfgId, EdgeKind};
    use crate::program::Address;

    #[derive(Clone, PartialEq, Debug)]
    struct Reach(bool);
    impl Domain for Reach {
        fn bottom() -> Self {
            Reach(false)
        }
        fn equal(&self, other: &Self) -> bool {
            self == other
        }
        fn join(&self, other: &Self) -> Self {
            Reach(self.0 || other.0)
        }
    }

    fn basic(cfg: &mut Cfg, start: u64) -> BlockId {
        cfg.add_block(BlockKind::Basic(BasicBlockData {
            start: Address::new(start),
            end: Address::new(start + 4),
            instructions: Vec::new(),
        }))
    }

    #[test]
    fn reachability_propagates_through_a_loop() {
        let mut cfg = Cfg::new(CfgId(0), "f");
        let header = basic(&mut cfg, 0x1000);
        let body = basic(&mut cfg, 0x1004);
        cfg.add_edge(cfg.entry, header, EdgeKind::Virtual);
        cfg.add_edge(header, body, EdgeKind::Taken);
        cfg.add_edge(body, header, EdgeKind::NotTaken);
        cfg.add_edge(header, cfg.exit, EdgeKind::NotTaken);

        let out = fixpoint(&cfg, Reach(true), |_b, input| input.clone(), |_, _, _, _| {});
        assert!(out[body.index()].0);
        assert!(out[cfg.exit.index()].0);
    }

    #[test]
    fn on_visit_receives_the_join_of_predecessors_as_input() {
        let mut cfg = Cfg::new(CfgId(0), "f");
        let header = basic(&mut cfg, 0x1000);
        let body = basic(&mut cfg, 0x1004);
        cfg.add_edge(cfg.entry, header, EdgeKind::Virtual);
        cfg.add_edge(header, body, EdgeKind::Taken);
        cfg.add_edge(body, header, EdgeKind::NotTaken);
        cfg.add_edge(header, cfg.exit, EdgeKind::NotTaken);

        let mut first_input_to_header = None;
        fixpoint(&cfg, Reach(true), |_b, input| input.clone(), |block, input, _out, iteration| {
            if block == header && iteration == 1 {
                first_input_to_header = Some(input.clone());
            }
        });
        assert_eq!(first_input_to_header, Some(Reach(true)));
    }
}
