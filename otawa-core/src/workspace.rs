//! The workspace: owns the process image, the CFG collection, the
//! top-level property store, and the feature registry (`spec.md` §6
//! "Workspace properties of record").
//!
//! Per-block and per-edge properties (`count`, `category`,
//! `loop-count-max`) live on the blocks/edges themselves; only the
//! genuinely workspace-scoped scalars (`task-entry`, `WCET`) are named
//! constants here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use std::sync::OnceLock;

use crate::cfg::CfgCollection;
use crate::feature::FeatureRegistry;
use crate::program::{Address, Platform, Process};
use crate::property::{PropertyId, PropertyStore};

/// A warning collected during analysis (e.g. an unresolved branch) that
/// did not abort the pipeline. Grounded in the same idea as a processor
/// log sink: recoverable problems are recorded, not silently dropped.
#[derive(Debug, Clone)]
pub struct Warning {
    pub message: String,
}

pub fn task_entry_id() -> PropertyId<Address> {
    static ID: OnceLock<PropertyId<Address>> = OnceLock::new();
    *ID.get_or_init(|| PropertyId::new("task-entry"))
}

pub fn wcet_id() -> PropertyId<i64> {
    static ID: OnceLock<PropertyId<i64>> = OnceLock::new();
    *ID.get_or_init(|| PropertyId::new("WCET"))
}

pub fn count_id() -> PropertyId<i64> {
    static ID: OnceLock<PropertyId<i64>> = OnceLock::new();
    *ID.get_or_init(|| PropertyId::new("count"))
}

pub fn loop_count_max_id() -> PropertyId<i64> {
    static ID: OnceLock<PropertyId<i64>> = OnceLock::new();
    *ID.get_or_init(|| PropertyId::new("loop-count-max"))
}

/// Per-block worst-case execution time in cycles, in the absence of
/// cache effects (those are added separately via the miss-penalty
/// terms IPET's objective adds on top). Populated by a timing analysis
/// that lives outside this crate's scope (`spec.md` §1 Non-goals);
/// `ipet::constraints` falls back to one cycle per instruction when a
/// block has no `block-time` set, so the pipeline still produces a
/// (pessimistic) answer on a workspace nothing has timed yet.
pub fn block_time_id() -> PropertyId<i64> {
    static ID: OnceLock<PropertyId<i64>> = OnceLock::new();
    *ID.get_or_init(|| PropertyId::new("block-time"))
}

/// Per-edge latency in cycles (e.g. a branch misprediction penalty).
/// Zero when unset.
pub fn edge_delay_id() -> PropertyId<i64> {
    static ID: OnceLock<PropertyId<i64>> = OnceLock::new();
    *ID.get_or_init(|| PropertyId::new("edge-delay"))
}

pub fn warnings_id() -> PropertyId<Vec<Warning>> {
    static ID: OnceLock<PropertyId<Vec<Warning>>> = OnceLock::new();
    *ID.get_or_init(|| PropertyId::new("WARNINGS"))
}

/// Cooperative cancellation token (`spec.md` §5): a flag an analysis
/// polls between block visits and fixpoint iterations, never a suspend
/// point.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub struct Workspace {
    pub process: Process,
    pub collection: CfgCollection,
    pub props: PropertyStore,
    pub registry: FeatureRegistry,
    cancellation: CancellationToken,
}

impl Workspace {
    pub fn new(platform: Platform) -> Self {
        Workspace {
            process: Process::new(platform),
            collection: CfgCollection::new(),
            props: PropertyStore::new(),
            registry: FeatureRegistry::new(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn push_warning(&mut self, message: impl Into<String>) {
        let id = warnings_id();
        let warning = Warning { message: message.into() };
        match self.props.get_mut(id) {
            Some(list) => list.push(warning),
            None => self.props.set(id, vec![warning]),
        }
    }

    pub fn warnings(&self) -> &[Warning] {
        self.props.get(warnings_id()).map(Vec::as_slice).unwrap_or(&[])
    }
}
