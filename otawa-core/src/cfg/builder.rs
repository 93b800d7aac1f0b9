//! Abstract CFG builder (component C5, `spec.md` §4.4).
//!
//! Leader-based basic-block discovery over a [`Process`], closed under
//! call-reachability from one task entry. Indirect branches/calls without
//! a flow-fact-supplied target are wired to a distinguished [`BlockKind::Unknown`]
//! sink and reported as warnings rather than failing the build outright.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use super::block::{BasicBlockData, BlockKind, SynthCallData};
use super::edge::EdgeKind;
use super::graph::{Cfg, CfgCollection, CfgId};
use super::BlockId;
use crate::error::{OtawaError, Result};
use crate::program::{Address, Process};

/// Flow-fact-derived inputs the builder needs but does not itself parse.
#[derive(Debug, Clone, Default)]
pub struct BuilderInputs {
    /// Address of an indirect branch/call -> the targets a `branch ADDR
    /// TARGET` flow fact supplied for it (one entry per fact; a repeated
    /// directive at the same address accumulates targets, modeling a
    /// switch-like multi-target indirect branch).
    pub resolved_indirect: HashMap<u64, Vec<Address>>,
    /// Addresses of `call ADDR ignore` directives: never virtualize these.
    pub do_not_inline_calls: HashSet<u64>,
    /// Addresses of `return ADDR` directives: treat as a return even if
    /// the loader didn't mark the instruction that way.
    pub forced_returns: HashSet<u64>,
}

/// Result of [`build`]: the closed CFG collection plus any non-fatal
/// warnings raised along the way (one per unresolved indirect branch).
pub struct BuildOutcome {
    pub collection: CfgCollection,
    pub warnings: Vec<String>,
}

struct CallSite {
    cfg: CfgId,
    block: BlockId,
    target: Option<Address>,
}

/// Build the CFG collection reachable (through direct and resolved
/// indirect calls) from `entry`.
pub fn build(process: &Process, entry: Address, inputs: &BuilderInputs) -> Result<BuildOutcome> {
    let mut collection = CfgCollection::new();
    let mut seed_to_cfg: HashMap<u64, CfgId> = HashMap::new();
    let mut worklist: VecDeque<Address> = VecDeque::from([entry]);
    let mut warnings = Vec::new();
    let mut pending_calls: Vec<CallSite> = Vec::new();

    while let Some(seed) = worklist.pop_front() {
        let Some(seed_value) = seed.value() else { continue };
        if seed_to_cfg.contains_key(&seed_value) {
            continue;
        }
        let label = process.symbol_at(seed).map(|s| s.name.clone()).unwrap_or_else(|| format!("fn_{seed}"));
        let cfg_id = CfgId(collection.len() as u32);
        let (cfg, new_seeds, calls, block_warnings) = build_one(process, cfg_id, label, seed, inputs)?;
        seed_to_cfg.insert(seed_value, cfg_id);
        warnings.extend(block_warnings);
        for s in new_seeds {
            worklist.push_back(s);
        }
        pending_calls.extend(calls);
        collection.push(cfg);
    }

    for call in pending_calls {
        let Some(target) = call.target else { continue };
        let Some(target_value) = target.value() else { continue };
        if let Some(&callee_id) = seed_to_cfg.get(&target_value) {
            let cfg = collection.get_mut(call.cfg);
            if let Some(data) = cfg.block_mut(call.block).synth_call_mut() {
                data.callee = Some(callee_id);
            }
            collection.get_mut(callee_id).callers.push((call.cfg, call.block));
        }
    }

    Ok(BuildOutcome { collection, warnings })
}

fn resolve_targets(addr: Address, direct: Option<Address>, inputs: &BuilderInputs) -> Vec<Address> {
    if let Some(t) = direct {
        return vec![t];
    }
    addr.value().and_then(|v| inputs.resolved_indirect.get(&v)).cloned().unwrap_or_default()
}

/// Flood instruction reachability from `seed`, discovering the set of
/// leaders (`spec.md` §4.4 steps 1-2) and the call sites found along the
/// way, without yet materializing basic blocks.
fn discover(
    process: &Process,
    seed: Address,
    inputs: &BuilderInputs,
) -> Result<(BTreeSet<u64>, HashSet<u64>, Vec<(Address, Option<Address>)>, Vec<String>)> {
    let mut leaders: BTreeSet<u64> = BTreeSet::new();
    let mut visited: HashSet<u64> = HashSet::new();
    let mut call_sites = Vec::new();
    let mut warnings = Vec::new();
    let mut wl: VecDeque<Address> = VecDeque::new();

    let seed_value = seed.value().ok_or_else(|| OtawaError::LoadError("null seed address".into()))?;
    leaders.insert(seed_value);
    wl.push_back(seed);

    while let Some(addr) = wl.pop_front() {
        let Some(value) = addr.value() else { continue };
        if visited.contains(&value) {
            continue;
        }
        let inst = process.inst_at(addr).ok_or_else(|| OtawaError::LoadError(format!("no instruction at {addr}")))?;
        visited.insert(value);

        if inst.is_return() || inputs.forced_returns.contains(&value) {
            continue;
        }

        if inst.is_call() {
            call_sites.push((addr, inst.target));
            let fallthrough = inst.end_address();
            if let Some(fv) = fallthrough.value() {
                leaders.insert(fv);
                wl.push_back(fallthrough);
            }
            continue;
        }

        if inst.is_branch() {
            if inst.is_conditional() {
                let fallthrough = inst.end_address();
                if let Some(fv) = fallthrough.value() {
                    leaders.insert(fv);
                    wl.push_back(fallthrough);
                }
            }
            let targets = resolve_targets(addr, inst.target, inputs);
            if targets.is_empty() && inst.is_indirect() {
                warnings.push(format!("unresolved indirect branch at {addr}"));
            }
            for t in targets {
                if let Some(tv) = t.value() {
                    leaders.insert(tv);
                    wl.push_back(t);
                }
            }
            continue;
        }

        let next = inst.end_address();
        if next.value().is_some() {
            wl.push_back(next);
        }
    }

    Ok((leaders, visited, call_sites, warnings))
}

fn build_one<'p>(
    process: &'p Process,
    cfg_id: CfgId,
    label: String,
    seed: Address,
    inputs: &BuilderInputs,
) -> Result<(Cfg, Vec<Address>, Vec<CallSite>, Vec<String>)> {
    let (leaders, reachable, _discovered_calls, mut warnings) = discover(process, seed, inputs)?;
    let mut cfg = Cfg::new(cfg_id, label);

    let sorted_leaders: Vec<u64> = leaders.into_iter().filter(|a| reachable.contains(a)).collect();
    let mut addr_to_block: HashMap<u64, BlockId> = HashMap::new();
    let mut call_terminated: HashMap<u64, &'p crate::program::Instruction> = HashMap::new();
    let mut branch_terminated: HashMap<u64, &'p crate::program::Instruction> = HashMap::new();
    let mut return_terminated: HashSet<u64> = HashSet::new();

    for (i, &start) in sorted_leaders.iter().enumerate() {
        let block_end_exclusive = sorted_leaders.get(i + 1).copied();
        let mut instructions = Vec::new();
        let mut addr = Address::new(start);
        loop {
            let inst =
                process.inst_at(addr).ok_or_else(|| OtawaError::LoadError(format!("no instruction at {addr}")))?;
            let this_addr = addr.value().unwrap();
            instructions.push(inst.clone());
            let is_return = inst.is_return() || inputs.forced_returns.contains(&this_addr);
            let is_branch = inst.is_branch();
            let is_call = inst.is_call();
            let next = inst.end_address();

            if is_return {
                return_terminated.insert(start);
                break;
            }
            if is_call {
                call_terminated.insert(start, inst);
                break;
            }
            if is_branch {
                branch_terminated.insert(start, inst);
                break;
            }
            match (next.value(), block_end_exclusive) {
                (Some(n), Some(end)) if n == end => break,
                _ => {}
            }
            addr = next;
        }
        let last = instructions.last().unwrap();
        let end = last.end_address();
        let block_id = cfg.add_block(BlockKind::Basic(BasicBlockData { start: Address::new(start), end, instructions }));
        addr_to_block.insert(start, block_id);
    }

    if let Some(&first) = sorted_leaders.first() {
        let first_block = addr_to_block[&first];
        cfg.add_edge(cfg.entry, first_block, EdgeKind::Virtual);
    }

    let mut calls = Vec::new();
    let mut unknown_block: Option<BlockId> = None;

    for &start in &sorted_leaders {
        let block_id = addr_to_block[&start];

        if return_terminated.contains(&start) {
            cfg.add_edge(block_id, cfg.exit, EdgeKind::Virtual);
            continue;
        }

        if let Some(&inst) = call_terminated.get(&start) {
            let fallthrough_addr = inst.end_address().value();
            let fallthrough_block = fallthrough_addr.and_then(|v| addr_to_block.get(&v)).copied();
            let targets = resolve_targets(inst.address, inst.target, inputs);
            if targets.is_empty() {
                warnings.push(format!("unresolved indirect call at {}", inst.address));
                let unk = unknown_block.get_or_insert_with(|| {
                    let id = cfg.add_block(BlockKind::Unknown);
                    cfg.add_edge(id, cfg.exit, EdgeKind::Virtual);
                    id
                });
                cfg.add_edge(block_id, *unk, EdgeKind::Call);
                if let Some(ft) = fallthrough_block {
                    cfg.add_edge(block_id, ft, EdgeKind::NotTaken);
                }
            } else {
                let target = targets[0];
                let synth = cfg.add_block(BlockKind::SynthCall(SynthCallData {
                    callee: None,
                    target: Some(target),
                    call_site: inst.address,
                    do_not_inline: inst.address.value().map(|v| inputs.do_not_inline_calls.contains(&v)).unwrap_or(false),
                    recursive: false,
                }));
                cfg.add_edge(block_id, synth, EdgeKind::Call);
                if let Some(ft) = fallthrough_block {
                    cfg.add_edge(synth, ft, EdgeKind::Return);
                }
                calls.push(CallSite { cfg: cfg_id, block: synth, target: Some(target) });
            }
            continue;
        }

        if let Some(&inst) = branch_terminated.get(&start) {
            let targets = resolve_targets(inst.address, inst.target, inputs);
            if inst.is_conditional() {
                let fallthrough_addr = inst.end_address().value();
                if let Some(ft) = fallthrough_addr.and_then(|v| addr_to_block.get(&v)).copied() {
                    cfg.add_edge(block_id, ft, EdgeKind::NotTaken);
                }
                if targets.is_empty() {
                    let unk = unknown_block.get_or_insert_with(|| {
                        let id = cfg.add_block(BlockKind::Unknown);
                        cfg.add_edge(id, cfg.exit, EdgeKind::Virtual);
                        id
                    });
                    cfg.add_edge(block_id, *unk, EdgeKind::Taken);
                } else {
                    for t in targets {
                        if let Some(tb) = t.value().and_then(|v| addr_to_block.get(&v)).copied() {
                            cfg.add_edge(block_id, tb, EdgeKind::Taken);
                        }
                    }
                }
            } else if targets.is_empty() {
                let unk = unknown_block.get_or_insert_with(|| {
                    let id = cfg.add_block(BlockKind::Unknown);
                    cfg.add_edge(id, cfg.exit, EdgeKind::Virtual);
                    id
                });
                cfg.add_edge(block_id, *unk, EdgeKind::NotTaken);
            } else {
                for t in targets {
                    if let Some(tb) = t.value().and_then(|v| addr_to_block.get(&v)).copied() {
                        cfg.add_edge(block_id, tb, EdgeKind::NotTaken);
                    }
                }
            }
            continue;
        }

        // Plain fallthrough: the block ended because the next leader was
        // reached, not because of a branch/call/return instruction.
        let block = cfg.block(block_id).basic().unwrap();
        if let Some(next_leader) = block.end.value().and_then(|v| addr_to_block.get(&v)).copied() {
            cfg.add_edge(block_id, next_leader, EdgeKind::NotTaken);
        }
    }

    let new_seeds: Vec<Address> = calls.iter().filter_map(|c| c.target).collect();
    Ok((cfg, new_seeds, calls, warnings))
}
