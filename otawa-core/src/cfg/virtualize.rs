//! Call inlining (`spec.md` §4.4, "Virtualizer").
//!
//! Produces a flattened copy of one CFG with every non-recursive,
//! non-`do-not-inline` [`crate::cfg::BlockKind::SynthCall`] replaced by
//! the callee's blocks spliced in place. Recursion is broken by refusing
//! to inline a callee already on the current inlining stack; the call
//! stays as a synthetic block flagged `recursive`.

use std::collections::HashMap;

use super::block::BlockKind;
use super::edge::EdgeKind;
use super::graph::{Cfg, CfgCollection, CfgId};
use super::BlockId;
use crate::error::Result;

/// Inline every reachable call starting from `root`, returning a
/// self-contained flat CFG. `collection` is read-only: each CFG may be
/// virtualized more than once (e.g. called from two different sites)
/// without the copies interfering.
pub fn virtualize(collection: &CfgCollection, root: CfgId) -> Result<Cfg> {
    let mut stack = Vec::new();
    virtualize_rec(collection, root, &mut stack)
}

fn virtualize_rec(collection: &CfgCollection, id: CfgId, stack: &mut Vec<CfgId>) -> Result<Cfg> {
    stack.push(id);
    let mut cfg = collection.get(id).clone();

    loop {
        let candidate = cfg.blocks().iter().find_map(|b| match &b.kind {
            BlockKind::SynthCall(data) if !data.do_not_inline && !data.recursive => {
                data.callee.map(|callee| (b.id, callee))
            }
            _ => None,
        });
        let Some((synth_id, callee_id)) = candidate else { break };

        if stack.contains(&callee_id) {
            if let Some(data) = cfg.block_mut(synth_id).synth_call_mut() {
                data.recursive = true;
            }
            continue;
        }

        let callee_flat = virtualize_rec(collection, callee_id, stack)?;
        splice(&mut cfg, synth_id, &callee_flat);
    }

    stack.pop();
    Ok(cfg)
}

/// Replace `synth_id` in `caller` with a fresh copy of every block/edge
/// of `callee` (excluding its entry and exit), rewiring the caller's
/// single predecessor/successor of the synthetic block directly onto the
/// callee's real blocks.
fn splice(caller: &mut Cfg, synth_id: BlockId, callee: &Cfg) {
    let preds: Vec<BlockId> = caller.block(synth_id).predecessors.to_vec();
    let succs: Vec<BlockId> = caller.block(synth_id).successors.to_vec();

    let mut remap: HashMap<BlockId, BlockId> = HashMap::new();
    for block in callee.blocks() {
        if block.is_entry() || block.is_exit() {
            continue;
        }
        let new_id = caller.add_block(block.kind.clone());
        remap.insert(block.id, new_id);
    }

    for edge in callee.edges() {
        if edge.source == callee.entry || edge.sink == callee.exit {
            continue;
        }
        if let (Some(&s), Some(&t)) = (remap.get(&edge.source), remap.get(&edge.sink)) {
            caller.add_edge(s, t, edge.kind);
        }
    }

    for edge in callee.out_edges(callee.entry) {
        if let Some(&first) = remap.get(&edge.sink) {
            for &pred in &preds {
                caller.add_edge(pred, first, EdgeKind::Virtual);
            }
        }
    }

    for edge in callee.in_edges(callee.exit) {
        if let Some(&last) = remap.get(&edge.source) {
            for &succ in &succs {
                caller.add_edge(last, succ, EdgeKind::Virtual);
            }
        }
    }

    for &pred in &preds {
        caller.remove_edge(pred, synth_id);
    }
    for &succ in &succs {
        caller.remove_edge(synth_id, succ);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::block::{BasicBlockData, SynthCallData};
    use crate::program::Address;

    fn leaf_cfg(id: CfgId) -> Cfg {
        let mut cfg = Cfg::new(id, "leaf");
        let b = cfg.add_block(BlockKind::Basic(BasicBlockData {
            start: Address::new(0x2000),
            end: Address::new(0x2004),
            instructions: Vec::new(),
        }));
        cfg.add_edge(cfg.entry, b, EdgeKind::Virtual);
        cfg.add_edge(b, cfg.exit, EdgeKind::Virtual);
        cfg
    }

    #[test]
    fn inlines_a_single_non_recursive_call() {
        let mut collection = CfgCollection::new();
        let leaf_id = CfgId(0);
        collection.push(leaf_cfg(leaf_id));

        let caller_id = CfgId(1);
        let mut caller = Cfg::new(caller_id, "caller");
        let before = caller.add_block(BlockKind::Basic(BasicBlockData {
            start: Address::new(0x1000),
            end: Address::new(0x1004),
            instructions: Vec::new(),
        }));
        let synth = caller.add_block(BlockKind::SynthCall(SynthCallData {
            callee: Some(leaf_id),
            target: Some(Address::new(0x2000)),
            call_site: Address::new(0x1004),
            do_not_inline: false,
            recursive: false,
        }));
        let after = caller.add_block(BlockKind::Basic(BasicBlockData {
            start: Address::new(0x1008),
            end: Address::new(0x100c),
            instructions: Vec::new(),
        }));
        caller.add_edge(caller.entry, before, EdgeKind::Virtual);
        caller.add_edge(before, synth, EdgeKind::Call);
        caller.add_edge(synth, after, EdgeKind::Return);
        caller.add_edge(after, caller.exit, EdgeKind::Virtual);
        collection.push(caller);

        let flat = virtualize(&collection, caller_id).unwrap();
        assert!(flat.block(synth).predecessors.is_empty());
        assert!(flat.validate().is_ok());
    }

    #[test]
    fn direct_recursion_is_left_as_synthetic_call() {
        let mut collection = CfgCollection::new();
        let id = CfgId(0);
        let mut cfg = Cfg::new(id, "f");
        let b = cfg.add_block(BlockKind::Basic(BasicBlockData {
            start: Address::new(0x1000),
            end: Address::new(0x1004),
            instructions: Vec::new(),
        }));
        let synth = cfg.add_block(BlockKind::SynthCall(SynthCallData {
            callee: Some(id),
            target: Some(Address::new(0x1000)),
            call_site: Address::new(0x1004),
            do_not_inline: false,
            recursive: false,
        }));
        cfg.add_edge(cfg.entry, b, EdgeKind::Virtual);
        cfg.add_edge(b, synth, EdgeKind::Call);
        cfg.add_edge(synth, cfg.exit, EdgeKind::Return);
        collection.push(cfg);

        let flat = virtualize(&collection, id).unwrap();
        let data = flat.block(synth).synth_call().unwrap();
        assert!(data.recursive);
    }
}
