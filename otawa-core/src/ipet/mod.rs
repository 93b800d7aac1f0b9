//! IPET: variable assignment, constraint construction, and ILP solving
//! (components C10–C12, `spec.md` §4.10–§4.11).

pub mod constraints;
pub mod solver;
pub mod variables;

pub use constraints::{cache_constraints, loop_bound_constraints, structural_constraints, CacheConstraints, LoopBound};
pub use solver::{CoinCbcSolver, IpetProblem, LpSolution, LpSolver};
pub use variables::IpetVariables;

use std::collections::HashMap;

use good_lp::{Expression, ProblemVariables};

use crate::cache::Category;
use crate::cfg::{BlockId, CfgId};
use crate::dom::{Dominance, LoopNest};
use crate::error::Result;
use crate::lblock::LBlockTable;
use crate::workspace::{block_time_id, count_id, edge_delay_id, wcet_id, Workspace};

/// One cache level's contribution to the IPET problem: its l-block
/// table, per-l-block categorization (from `cache::run`), and the cycle
/// cost of a miss at that level.
pub struct CacheLevel<'a> {
    pub lblocks: &'a LBlockTable,
    pub categories: &'a [Category],
    pub miss_penalty: i64,
}

/// Build and solve the IPET system for one CFG, writing `WCET` onto the
/// workspace and `count` onto every block/edge of the CFG on success.
pub fn solve_wcet(
    ws: &mut Workspace,
    cfg_id: CfgId,
    dom: &Dominance,
    nest: &LoopNest,
    bounds: &HashMap<BlockId, LoopBound>,
    cache_levels: &[CacheLevel],
    solver: &dyn LpSolver,
) -> Result<i64> {
    let cfg = ws.collection.get(cfg_id).clone();
    let mut vars = ProblemVariables::new();
    let ipet_vars = IpetVariables::build(&mut vars, cfg_id, &cfg);

    let mut all_constraints = structural_constraints(&cfg, cfg_id, &ipet_vars);
    all_constraints.extend(loop_bound_constraints(&cfg, cfg_id, &ipet_vars, dom, nest, bounds)?);

    let mut objective: Expression = cfg
        .blocks()
        .iter()
        .map(|b| {
            let time = b.props.get(block_time_id()).copied().unwrap_or_else(|| b.basic().map(|d| d.instructions.len() as i64).unwrap_or(0));
            time as f64 * Expression::from(ipet_vars.block(cfg_id, b.id))
        })
        .sum();
    objective += cfg
        .edges()
        .iter()
        .map(|e| {
            let delay = e.props.get(edge_delay_id()).copied().unwrap_or(0);
            delay as f64 * Expression::from(ipet_vars.edge(cfg_id, e.source, e.sink))
        })
        .sum::<Expression>();

    for level in cache_levels {
        let cc = cache_constraints(&mut vars, &ipet_vars, &cfg, cfg_id, level.lblocks, level.categories, nest, dom);
        objective += cc.miss_vars.values().map(|&m| level.miss_penalty as f64 * Expression::from(m)).sum::<Expression>();
        all_constraints.extend(cc.constraints);
    }

    let solution = solver.solve(IpetProblem { vars, objective, constraints: all_constraints })?;

    let dst = ws.collection.get_mut(cfg_id);
    for block in dst.blocks_mut() {
        let id = block.id;
        let count = solution.value_of(ipet_vars.block(cfg_id, id));
        block.props.set(count_id(), count);
    }
    let edge_pairs: Vec<(BlockId, BlockId)> = dst.edges().iter().map(|e| (e.source, e.sink)).collect();
    for (source, sink) in edge_pairs {
        let count = solution.value_of(ipet_vars.edge(cfg_id, source, sink));
        if let Some(edge) = dst.edge_mut(source, sink) {
            edge.props.set(count_id(), count);
        }
    }

    let wcet = solution.objective_value();
    ws.props.set(wcet_id(), wcet);
    Ok(wcet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::block::BasicBlockData;
    use crate::cfg::{BlockKind, Cfg, CfgCollection, EdgeKind};
    use crate::dom::{mark_back_edges, Dominance, LoopNest};
    use crate::program::{Address, Platform};

    fn basic(cfg: &mut Cfg, start: u64, time: i64) -> BlockId {
        let id = cfg.add_block(BlockKind::Basic(BasicBlockData { start: Address::new(start), end: Address::new(start + 4), instructions: Vec::new() }));
        cfg.block_mut(id).props.set(block_time_id(), time);
        id
    }

    #[test]
    fn straight_line_wcet_sums_block_times() {
        let mut cfg = Cfg::new(CfgId(0), "f");
        let b0 = basic(&mut cfg, 0x1000, 3);
        let b1 = basic(&mut cfg, 0x1004, 5);
        cfg.add_edge(cfg.entry, b0, EdgeKind::Virtual);
        cfg.add_edge(b0, b1, EdgeKind::NotTaken);
        cfg.add_edge(b1, cfg.exit, EdgeKind::Virtual);

        let dom = Dominance::compute(&cfg);
        mark_back_edges(&mut cfg, &dom);
        let nest = LoopNest::compute(&cfg, &dom);

        let mut ws = Workspace::new(Platform::new());
        let mut collection = CfgCollection::new();
        let cfg_id = collection.push(cfg);
        ws.collection = collection;

        let wcet = solve_wcet(&mut ws, cfg_id, &dom, &nest, &HashMap::new(), &[], &CoinCbcSolver).unwrap();
        assert_eq!(wcet, 8);
    }
}
