//! IPET constraint construction (component C11, `spec.md` §4.10–§4.11).
//!
//! Three families of constraint, matching the spec's own grouping:
//! structural flow conservation (always present), loop-bound constraints
//! (one pair per loop header with a supplied flow fact), and cache
//! hit/miss decomposition constraints (one per categorized l-block).

use std::collections::HashMap;

use good_lp::{constraint, Constraint, Expression, ProblemVariables, Variable};

use crate::cache::Category;
use crate::cfg::{BlockId, Cfg, CfgId};
use crate::dom::{Dominance, LoopNest};
use crate::error::{OtawaError, Result};
use crate::lblock::LBlockTable;

use super::variables::IpetVariables;

/// A `loop ADDR BOUND` or `loop ADDR max BOUND_MAX total BOUND_TOTAL`
/// flow fact, resolved to the header block it names.
#[derive(Debug, Clone, Copy)]
pub struct LoopBound {
    pub max_per_entry: i64,
    pub total: Option<i64>,
}

/// `sum(back-edges) <= max_per_entry * sum(entry-edges)`, plus an
/// optional cap on total loop-body executions. Errors with
/// `MissingFlowFact` if a header in `nest` has no bound supplied.
pub fn loop_bound_constraints(
    cfg: &Cfg,
    cfg_id: CfgId,
    vars: &IpetVariables,
    dom: &Dominance,
    nest: &LoopNest,
    bounds: &HashMap<BlockId, LoopBound>,
) -> Result<Vec<Constraint>> {
    let mut out = Vec::new();
    for &header in &nest.headers {
        let bound = bounds.get(&header).ok_or_else(|| {
            let address = cfg.block(header).basic().map(|d| d.start.value().unwrap_or(0)).unwrap_or(0);
            OtawaError::MissingFlowFact { header: address }
        })?;

        let back_sum: Expression = nest.back_edges(cfg, header).iter().map(|e| Expression::from(vars.edge(cfg_id, e.source, e.sink))).sum();
        let entry_sum: Expression = nest.entry_edges(cfg, dom, header).iter().map(|e| Expression::from(vars.edge(cfg_id, e.source, e.sink))).sum();

        out.push(constraint!(back_sum.clone() <= bound.max_per_entry as f64 * entry_sum.clone()));
        if let Some(total) = bound.total {
            out.push(constraint!(back_sum + entry_sum <= total as f64));
        }
    }
    Ok(out)
}

/// Structural flow conservation (`spec.md` §4.10): the task entry and
/// exit each execute exactly once, and every other block's in-flow
/// equals its out-flow equals its own execution count.
pub fn structural_constraints(cfg: &Cfg, cfg_id: CfgId, vars: &IpetVariables) -> Vec<Constraint> {
    let mut out = vec![constraint!(vars.block(cfg_id, cfg.entry) == 1.0), constraint!(vars.block(cfg_id, cfg.exit) == 1.0)];

    for block in cfg.blocks() {
        let b = block.id;
        let count = Expression::from(vars.block(cfg_id, b));

        if !block.is_entry() {
            let in_sum: Expression = cfg.in_edges(b).iter().map(|e| Expression::from(vars.edge(cfg_id, e.source, e.sink))).sum();
            out.push(constraint!(in_sum == count.clone()));
        }
        if !block.is_exit() {
            let out_sum: Expression = cfg.out_edges(b).iter().map(|e| Expression::from(vars.edge(cfg_id, e.source, e.sink))).sum();
            out.push(constraint!(out_sum == count));
        }
    }
    out
}

/// Per-l-block cache miss decomposition (`spec.md` §4.9, §4.11): a
/// miss-count variable `m_L` per l-block, constrained according to its
/// category, plus the `miss_penalty * m_L` terms the objective adds.
/// Always-Hit l-blocks contribute nothing and get no variable.
pub struct CacheConstraints {
    pub constraints: Vec<Constraint>,
    pub miss_vars: HashMap<usize, Variable>,
}

pub fn cache_constraints(
    vars: &mut ProblemVariables,
    ipet_vars: &IpetVariables,
    cfg: &Cfg,
    cfg_id: CfgId,
    lblocks: &LBlockTable,
    categories: &[Category],
    nest: &LoopNest,
    dom: &Dominance,
) -> CacheConstraints {
    let mut constraints = Vec::new();
    let mut miss_vars = HashMap::new();

    for (idx, lblock) in lblocks.lblocks.iter().enumerate() {
        if lblock.cfg != cfg_id {
            continue;
        }
        let x_b = Expression::from(ipet_vars.block(cfg_id, lblock.block));
        match categories[idx] {
            Category::AlwaysHit => {}
            Category::AlwaysMiss => {
                let m = vars.add(good_lp::variable().integer().min(0.0));
                constraints.push(constraint!(Expression::from(m) == x_b));
                miss_vars.insert(idx, m);
            }
            Category::FirstMiss(header) => {
                let m = vars.add(good_lp::variable().integer().min(0.0));
                let entry_sum: Expression =
                    nest.entry_edges(cfg, dom, header).iter().map(|e| Expression::from(ipet_vars.edge(cfg_id, e.source, e.sink))).sum();
                constraints.push(constraint!(Expression::from(m) <= entry_sum));
                constraints.push(constraint!(Expression::from(m) <= x_b));
                miss_vars.insert(idx, m);
            }
            Category::NotClassified => {
                let m = vars.add(good_lp::variable().integer().min(0.0));
                constraints.push(constraint!(Expression::from(m) <= x_b));
                miss_vars.insert(idx, m);
            }
        }
    }
    CacheConstraints { constraints, miss_vars }
}
