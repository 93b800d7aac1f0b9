//! Observability hooks into the fixpoint engine (`spec.md` §4.6).
//!
//! The engine itself only takes plain closures; a [`Listener`] is a
//! small adapter so a single struct can accumulate state across every
//! visit without the caller threading captures by hand.

use std::collections::HashMap;

use super::domain::Domain;
use crate::cfg::BlockId;
use crate::dom::LoopNest;

/// Called once per block visit with the joined input, the computed
/// output, how many times this block has been visited so far, and (if a
/// loop nest is known) the innermost loop header enclosing it.
pub trait Listener<D> {
    fn on_visit(&mut self, block: BlockId, input: &D, output: &D, iteration: usize, enclosing: Option<BlockId>);
}

/// Default listener: records the join of every input state ever seen at
/// each block. Useful for inspecting what a completed analysis run
/// actually computed without re-deriving it from the final `out` vector.
#[derive(Default)]
pub struct RecordingListener<D> {
    pub joined_inputs: HashMap<BlockId, D>,
}

impl<D: Domain> Listener<D> for RecordingListener<D> {
    fn on_visit(&mut self, block: BlockId, input: &D, _output: &D, _iteration: usize, _enclosing: Option<BlockId>) {
        let joined = match self.joined_inputs.get(&block) {
            Some(existing) => existing.join(input),
            None => input.clone(),
        };
        self.joined_inputs.insert(block, joined);
    }
}

/// Records first-iteration and converged (stable) state separately for
/// loop headers, so a cache Persistence analysis can read off "what the
/// abstract cache state looked like on entry to the loop's first pass"
/// without re-running the engine in unrolled form.
#[derive(Default)]
pub struct UnrollingListener<D> {
    pub first: HashMap<BlockId, D>,
    pub stable: HashMap<BlockId, D>,
}

impl<D: Domain> Listener<D> for UnrollingListener<D> {
    fn on_visit(&mut self, block: BlockId, _input: &D, output: &D, iteration: usize, _enclosing: Option<BlockId>) {
        if iteration == 1 {
            self.first.entry(block).or_insert_with(|| output.clone());
        }
        self.stable.insert(block, output.clone());
    }
}

/// Run `fixpoint` forwarding every visit to `listener`, resolving each
/// block's enclosing loop header from `nest`.
pub fn fixpoint_with_listener<D, T, L>(
    cfg: &crate::cfg::Cfg,
    nest: &LoopNest,
    entry_value: D,
    mut transfer: T,
    listener: &mut L,
) -> Vec<D>
where
    D: Domain,
    T: FnMut(BlockId, &D) -> D,
    L: Listener<D>,
{
    super::engine::fixpoint(cfg, entry_value, &mut transfer, |block, input, output, iteration| {
        listener.on_visit(block, input, output, iteration, nest.enclosing_of(block));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::block::BasicBlockData;
    use crate::cfg::{BlockKind, Cfg, CfgId, EdgeKind};
    use crate::dom::{mark_back_edges, Dominance, LoopNest};
    use crate::program::Address;

    #[derive(Clone, PartialEq, Debug, Default)]
    struct Count(i64);
    impl Domain for Count {
        fn bottom() -> Self {
            Count(0)
        }
        fn equal(&self, other: &Self) -> bool {
            self == other
        }
        fn join(&self, other: &Self) -> Self {
            Count(self.0.max(other.0))
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
    fn unrolling_listener_separates_first_and_stable_header_state() {
        let mut cfg = Cfg::new(CfgId(0), "f");
        let header = basic(&mut cfg, 0x1000);
        let body = basic(&mut cfg, 0x1004);
        cfg.add_edge(cfg.entry, header, EdgeKind::Virtual);
        cfg.add_edge(header, body, EdgeKind::Taken);
        cfg.add_edge(body, header, EdgeKind::NotTaken);
        cfg.add_edge(header, cfg.exit, EdgeKind::NotTaken);

        let dom = Dominance::compute(&cfg);
        mark_back_edges(&mut cfg, &dom);
        let nest = LoopNest::compute(&cfg, &dom);

        let mut listener = UnrollingListener::default();
        fixpoint_with_listener(&cfg, &nest, Count(1), |_b, input| Count(input.0 + 1), &mut listener);

        let first = listener.first.get(&header).unwrap();
        let stable = listener.stable.get(&header).unwrap();
        assert!(stable.0 >= first.0);
    }
}
