//! Cache abstract interpretation (component C9, `spec.md` §4.8–§4.9).
//!
//! One [`run`] per cache level: Must and May are driven to a normal
//! fixpoint over the whole CFG, Persistence additionally captures each
//! loop header's loop-entry state so `categorize` can tell "always
//! resident on entry, evictable afterwards" apart from "always
//! resident, full stop".

pub mod acs;
pub mod categorize;
pub mod may;
pub mod must;
pub mod persistence;

pub use categorize::{Category, CacheAnalysis};
pub use may::MayAcs;
pub use must::MustAcs;
pub use persistence::PersistenceAcs;

use std::collections::HashMap;

use crate::cfg::{BlockId, Cfg, CfgId};
use crate::dataflow::{fixpoint, Domain};
use crate::dom::{Dominance, LoopNest};
use crate::lblock::LBlockTable;
use crate::program::platform::Cache;

/// Run Must, May, and Persistence for one cache level and categorize
/// every l-block of every basic block of `cfg`.
///
/// `categorize` classifies an l-block from the state *entering* its
/// block, before that block's own access is applied — so this driver
/// records, per block, the join of predecessors' states
/// (`fixpoint`'s `on_visit` input), not the post-transfer output the
/// engine returns. Persistence additionally needs the state as of
/// entering each loop from outside it, which is the join of
/// [`LoopNest::entry_edges`]'s sources' converged output — `dom` is
/// what lets `entry_edges` tell an edge from outside the loop apart
/// from a back edge.
///
/// Persistence here only needs that loop-entry state, compared against
/// May's verdict on later iterations in `categorize` — so the plain
/// Must-style transfer is enough; `PersistenceAcs`'s own frame stack
/// (`enter_context`/`leave_context`) exists for nested-loop-aware
/// consumers and is exercised directly by its unit tests, not wired
/// through this per-cache-level driver.
pub fn run(cfg: &Cfg, lblocks: &LBlockTable, cache: &Cache, dom: &Dominance, nest: &LoopNest) -> CacheAnalysis {
    let ways = cache.associativity as usize;
    let n = cfg.block_count();

    let mut must_in = vec![MustAcs::bottom(); n];
    fixpoint(
        cfg,
        MustAcs::entry(ways),
        |block, input| apply_block_must(lblocks, cfg.id, block, input),
        |block, input, _out, _visits| must_in[block.index()] = input.clone(),
    );

    let mut may_in = vec![MayAcs::bottom(); n];
    fixpoint(
        cfg,
        MayAcs::entry(ways),
        |block, input| apply_block_may(lblocks, cfg.id, block, input),
        |block, input, _out, _visits| may_in[block.index()] = input.clone(),
    );

    let persistence_out = fixpoint(
        cfg,
        PersistenceAcs::entry(ways),
        |block, input| apply_block_persistence(lblocks, cfg.id, block, input),
        |_, _, _, _| {},
    );
    let persistence_at_entry: HashMap<BlockId, PersistenceAcs> = nest
        .headers
        .iter()
        .map(|&header| {
            let state = nest
                .entry_edges(cfg, dom, header)
                .into_iter()
                .map(|edge| persistence_out[edge.source.index()].clone())
                .reduce(|a, b| a.join(&b))
                .unwrap_or_else(PersistenceAcs::bottom);
            (header, state)
        })
        .collect();

    let categories = categorize::categorize(cfg.id, lblocks, cache, &must_in, &may_in, &persistence_at_entry, nest);
    CacheAnalysis { categories }
}

fn apply_block_must(lblocks: &LBlockTable, cfg: CfgId, block: BlockId, input: &MustAcs) -> MustAcs {
    let mut state = input.clone();
    for &idx in lblocks.of_block(cfg, block) {
        state = state.touch(lblocks.lblock(idx).cache_block);
    }
    state
}

fn apply_block_may(lblocks: &LBlockTable, cfg: CfgId, block: BlockId, input: &MayAcs) -> MayAcs {
    let mut state = input.clone();
    for &idx in lblocks.of_block(cfg, block) {
        state = state.touch(lblocks.lblock(idx).cache_block);
    }
    state
}

fn apply_block_persistence(lblocks: &LBlockTable, cfg: CfgId, block: BlockId, input: &PersistenceAcs) -> PersistenceAcs {
    let mut state = input.clone();
    for &idx in lblocks.of_block(cfg, block) {
        state = state.touch(lblocks.lblock(idx).cache_block);
    }
    state
}

/// Categorizations for every cache level of `platform`'s instruction
/// cache hierarchy, keyed by level index.
pub fn run_icache_hierarchy(cfg: &Cfg, lblocks_per_level: &[LBlockTable], caches: &[Cache], dom: &Dominance, nest: &LoopNest) -> Vec<CacheAnalysis> {
    lblocks_per_level.iter().zip(caches.iter()).map(|(lb, cache)| run(cfg, lb, cache, dom, nest)).collect()
}

pub type LoopEntryStates = HashMap<BlockId, PersistenceAcs>;
