//! Per-l-block cache categorization (component C9, `spec.md` §4.9).
//!
//! Categories, most to least favorable:
//! - `AlwaysHit`: Must guarantees residency, or a prior l-block of the
//!   same cache block already ran earlier in the same basic block.
//! - `AlwaysMiss`: May guarantees non-residency.
//! - `FirstMiss(header)`: Persistence guarantees residency on the
//!   loop's first iteration but May cannot rule out eviction by a later
//!   one.
//! - `NotClassified`: none of the above — conservatively a miss on
//!   every execution for IPET purposes, without the bounded-count
//!   benefit a `FirstMiss` category gives the objective.

use crate::cfg::{BlockId, CfgId};
use crate::dom::LoopNest;
use crate::lblock::LBlockTable;
use crate::program::platform::{Cache, ReplacementPolicy};

use super::may::MayAcs;
use super::must::MustAcs;
use super::persistence::PersistenceAcs;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    AlwaysHit,
    AlwaysMiss,
    FirstMiss(BlockId),
    NotClassified,
}

/// Per-l-block analysis results needed by the IPET constraint builder.
#[derive(Debug, Clone, Default)]
pub struct CacheAnalysis {
    pub categories: Vec<Category>,
}

/// Run Must, May, and (for loop headers) Persistence over every basic
/// block's l-blocks and categorize each one.
///
/// `must_in`/`may_in` are the per-block *input* states (the join of
/// predecessors, before the block's own access) already computed by the
/// dataflow engine; `persistence_at_entry` is the state as of entering
/// each loop header from outside it (see `cache::run`). This function
/// only turns them into per-l-block verdicts.
pub fn categorize(
    cfg_id: CfgId,
    lblocks: &LBlockTable,
    cache: &Cache,
    must_in: &[MustAcs],
    may_in: &[MayAcs],
    persistence_at_entry: &std::collections::HashMap<BlockId, PersistenceAcs>,
    nest: &LoopNest,
) -> Vec<Category> {
    if cache.policy != ReplacementPolicy::Lru {
        return vec![Category::NotClassified; lblocks.lblocks.len()];
    }

    let mut categories = vec![Category::NotClassified; lblocks.lblocks.len()];
    for (idx, lblock) in lblocks.lblocks.iter().enumerate() {
        if lblock.cfg != cfg_id {
            continue;
        }
        if lblocks.is_repeat_within_block(idx) {
            categories[idx] = Category::AlwaysHit;
            continue;
        }

        let must = &must_in[lblock.block.index()];
        if must.age_of(lblock.cache_block).is_some_and(|age| age < cache.associativity as usize) {
            categories[idx] = Category::AlwaysHit;
            continue;
        }

        let may = &may_in[lblock.block.index()];
        if !may.possibly_resident(lblock.cache_block) {
            categories[idx] = Category::AlwaysMiss;
            continue;
        }

        if let Some(header) = nest.enclosing_of(lblock.block) {
            if let Some(first) = persistence_at_entry.get(&header) {
                if first.age_of(lblock.cache_block).is_some_and(|age| age < cache.associativity as usize) {
                    categories[idx] = Category::FirstMiss(header);
                    continue;
                }
            }
        }
    }
    categories
}
