//! IPET variable assignment (component C10, `spec.md` §4.10).
//!
//! One execution-count variable per basic block (`x_b`) and per edge
//! (`x_e`); the objective is `sum t_b * x_b + sum d_e * x_e` plus the
//! cache miss penalty terms `constraints` adds on top.

use std::collections::HashMap;

use good_lp::{variable, ProblemVariables, Variable};

use crate::cfg::{BlockId, Cfg, CfgId};

#[derive(Debug, Clone, Default)]
pub struct IpetVariables {
    block_vars: HashMap<(CfgId, BlockId), Variable>,
    edge_vars: HashMap<(CfgId, BlockId, BlockId), Variable>,
}

impl IpetVariables {
    /// Register one non-negative integer variable per block and per
    /// edge of `cfg` with `vars`.
    pub fn build(vars: &mut ProblemVariables, cfg_id: CfgId, cfg: &Cfg) -> Self {
        let mut block_vars = HashMap::new();
        for block in cfg.blocks() {
            block_vars.insert((cfg_id, block.id), vars.add(variable().integer().min(0.0)));
        }
        let mut edge_vars = HashMap::new();
        for edge in cfg.edges() {
            edge_vars.insert((cfg_id, edge.source, edge.sink), vars.add(variable().integer().min(0.0)));
        }
        IpetVariables { block_vars, edge_vars }
    }

    pub fn block(&self, cfg: CfgId, block: BlockId) -> Variable {
        self.block_vars[&(cfg, block)]
    }

    pub fn edge(&self, cfg: CfgId, source: BlockId, sink: BlockId) -> Variable {
        self.edge_vars[&(cfg, source, sink)]
    }
}
