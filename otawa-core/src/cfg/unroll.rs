//! Loop unrolling (`spec.md` §4.4, "Loop unrolling").
//!
//! `unroll_loop(.., k)` turns one innermost loop into a chain of `k`
//! body copies: copy `i`'s back-edge (for `i < k`) redirects into copy
//! `i + 1`'s header instead of its own, and the final copy keeps its
//! back-edge pointing at itself. `k <= 1` is the identity transform —
//! this is how first-iteration behavior is exposed to the cache analysis
//! without solving persistence explicitly.

use std::collections::HashMap;

use super::{BlockId, Cfg};
use crate::dom::LoopNest;

/// Unroll the loop headed by `header` into `k` chained copies.
/// `header` and its body must come from `nest`, already computed for
/// `cfg` in its current (pre-unroll) state.
pub fn unroll_loop(cfg: &mut Cfg, nest: &LoopNest, header: BlockId, k: usize) {
    if k <= 1 {
        return;
    }
    let Some(body) = nest.body_of(header).cloned() else { return };

    // copies[i] (i from 2..=k) maps an original body block to its i-th
    // duplicate. Copy 1 is the original graph: map(1, b) = b.
    let mut copies: HashMap<usize, HashMap<BlockId, BlockId>> = HashMap::new();
    for i in 2..=k {
        let mut remap = HashMap::new();
        for &b in &body {
            let kind = cfg.block(b).kind.clone();
            remap.insert(b, cfg.add_block(kind));
        }
        copies.insert(i, remap);
    }
    let map = |i: usize, b: BlockId| -> BlockId {
        if i == 1 {
            b
        } else {
            copies[&i][&b]
        }
    };

    let snapshot: Vec<_> = cfg.edges().to_vec();

    for edge in &snapshot {
        let source_in_body = body.contains(&edge.source);
        let sink_in_body = body.contains(&edge.sink);

        if source_in_body && edge.back_edge && edge.sink == header {
            cfg.remove_edge(edge.source, edge.sink);
            for i in 1..k {
                let from = map(i, edge.source);
                let to = map(i + 1, header);
                cfg.add_edge(from, to, edge.kind);
            }
            let from = map(k, edge.source);
            let to = map(k, header);
            cfg.add_edge(from, to, edge.kind);
        } else if source_in_body && sink_in_body {
            for i in 2..=k {
                cfg.add_edge(map(i, edge.source), map(i, edge.sink), edge.kind);
            }
        } else if source_in_body && !sink_in_body {
            // Loop exit: every copy exits to the same external target.
            for i in 2..=k {
                cfg.add_edge(map(i, edge.source), edge.sink, edge.kind);
            }
        }
        // Entry edges (source outside the body) are left untouched: the
        // loop is always entered through copy 1's header.
    }
}
