//! Sub-CFG extraction (`spec.md` §4.4, "Sub-CFG extraction").
//!
//! Forward flood from `start`, backward flood from every address in
//! `stops`, keep the intersection, and wrap it with a fresh synthetic
//! entry/exit.

use std::collections::{HashSet, VecDeque};

use super::edge::EdgeKind;
use super::graph::{Cfg, CfgId};
use super::BlockId;
use crate::error::{OtawaError, Result};
use crate::program::Address;

pub fn extract(cfg: &Cfg, id: CfgId, label: impl Into<String>, start: Address, stops: &[Address]) -> Result<Cfg> {
    let start_block = find_block_at(cfg, start)
        .ok_or_else(|| OtawaError::ConsistencyError(format!("sub-cfg start {start} is not a block start")))?;
    let stop_blocks: Vec<BlockId> = stops
        .iter()
        .map(|&addr| {
            find_block_at(cfg, addr)
                .ok_or_else(|| OtawaError::ConsistencyError(format!("sub-cfg stop {addr} is not a block start")))
        })
        .collect::<Result<_>>()?;

    let forward = flood(cfg, start_block, Direction::Forward);
    let mut backward = HashSet::new();
    for &stop in &stop_blocks {
        backward.extend(flood(cfg, stop, Direction::Backward));
    }
    let keep: HashSet<BlockId> = forward.intersection(&backward).copied().collect();

    let mut sub = Cfg::new(id, label);
    let mut remap = std::collections::HashMap::new();
    for &b in &keep {
        let new_id = sub.add_block(cfg.block(b).kind.clone());
        remap.insert(b, new_id);
    }
    for edge in cfg.edges() {
        if let (Some(&s), Some(&t)) = (remap.get(&edge.source), remap.get(&edge.sink)) {
            sub.add_edge(s, t, edge.kind);
        }
    }
    if let Some(&mapped_start) = remap.get(&start_block) {
        sub.add_edge(sub.entry, mapped_start, EdgeKind::Virtual);
    }
    for stop in stop_blocks {
        if let Some(&mapped_stop) = remap.get(&stop) {
            sub.add_edge(mapped_stop, sub.exit, EdgeKind::Virtual);
        }
    }
    Ok(sub)
}

fn find_block_at(cfg: &Cfg, addr: Address) -> Option<BlockId> {
    cfg.blocks().iter().find(|b| b.basic().is_some_and(|data| data.start == addr)).map(|b| b.id)
}

enum Direction {
    Forward,
    Backward,
}

fn flood(cfg: &Cfg, start: BlockId, dir: Direction) -> HashSet<BlockId> {
    let mut visited = HashSet::new();
    let mut wl = VecDeque::from([start]);
    visited.insert(start);
    while let Some(b) = wl.pop_front() {
        let neighbors = match dir {
            Direction::Forward => &cfg.block(b).successors,
            Direction::Backward => &cfg.block(b).predecessors,
        };
        for &n in neighbors {
            if visited.insert(n) {
                wl.push_back(n);
            }
        }
    }
    visited
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::block::BasicBlockData;
    use crate::cfg::BlockKind;

    fn basic(cfg: &mut Cfg, start: u64) -> BlockId {
        cfg.add_block(BlockKind::Basic(BasicBlockData {
            start: Address::new(start),
            end: Address::new(start + 4),
            instructions: Vec::new(),
        }))
    }

    #[test]
    fn extracts_only_blocks_between_start_and_stop() {
        let mut cfg = Cfg::new(CfgId(0), "f");
        let a = basic(&mut cfg, 0x1000);
        let b = basic(&mut cfg, 0x1004);
        let c = basic(&mut cfg, 0x1008);
        let off_path = basic(&mut cfg, 0x100c);
        cfg.add_edge(cfg.entry, a, EdgeKind::Virtual);
        cfg.add_edge(a, b, EdgeKind::NotTaken);
        cfg.add_edge(b, c, EdgeKind::NotTaken);
        cfg.add_edge(a, off_path, EdgeKind::Taken);
        cfg.add_edge(off_path, cfg.exit, EdgeKind::Virtual);
        cfg.add_edge(c, cfg.exit, EdgeKind::Virtual);

        let sub = extract(&cfg, CfgId(1), "sub", Address::new(0x1000), &[Address::new(0x1008)]).unwrap();
        // a, b, c plus synthetic entry/exit: 5 blocks, off_path excluded.
        assert_eq!(sub.block_count(), 5);
    }
}
