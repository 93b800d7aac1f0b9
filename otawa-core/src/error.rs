//! Structured error taxonomy for the WCET analysis pipeline.
//!
//! Every analysis-facing error is a named variant, never a bare string match.
//! `thiserror` gives each variant a `Display` impl without heap-allocating a
//! formatter at the call site; `anyhow` is reserved for the CLI boundary.

use thiserror::Error;

/// A single ILP constraint, stringified, for `SolverError`/`Infeasible` context.
pub type ConstraintName = String;

/// Errors raised anywhere in the analysis pipeline.
///
/// Recovery policy (see design doc §7): an analysis may catch and repair
/// only `UnresolvedBranch`, downgrading it to a warning plus a worst-case
/// edge to the unknown sink. Every other variant propagates to the
/// scheduler, which discards the failing analysis's partial work.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OtawaError {
    /// The program-model layer could not produce a usable process image.
    #[error("load error: {0}")]
    LoadError(String),

    /// A branch could not be resolved to a target address by the CFG
    /// builder. Not fatal on its own: callers may downgrade this to a
    /// warning and an edge to the unknown sink.
    #[error("unresolved branch at 0x{address:08x}")]
    UnresolvedBranch {
        /// Address of the offending branch instruction.
        address: u64,
    },

    /// An IPET constraint builder found a loop header with no supplied
    /// bound. No finite WCET is computable in that case.
    #[error("missing flow fact: loop header 0x{header:08x} has no bound")]
    MissingFlowFact {
        /// Address of the loop header lacking a bound.
        header: u64,
    },

    /// The dataflow engine hit its iteration cap without reaching a
    /// fixpoint, indicating the domain does not satisfy the ascending
    /// chain condition (or needs a widening operator).
    #[error("dataflow diverged after {iterations} iterations on a domain without a widening operator")]
    DomainDiverges {
        /// Number of iterations performed before the cap was hit.
        iterations: usize,
    },

    /// The ILP plug-in reported a generic internal failure.
    #[error("solver error: {0}")]
    SolverError(String),

    /// The ILP system has no feasible solution.
    #[error("infeasible ILP system{}", constraint.as_ref().map(|c| format!(" (offending constraint: {c})")).unwrap_or_default())]
    Infeasible {
        /// Name of the offending constraint, when the solver can identify one.
        constraint: Option<ConstraintName>,
    },

    /// The ILP objective is unbounded (a modeling bug: every real WCET
    /// system should be bounded by flow facts).
    #[error("unbounded ILP objective")]
    Unbounded,

    /// The solver plug-in exceeded its configured time budget.
    #[error("solver timeout")]
    Timeout,

    /// The current `require` call (or the workspace-level operation it
    /// was nested in) was cancelled via the scheduler's cooperative
    /// cancellation token.
    #[error("analysis cancelled")]
    Cancelled,

    /// A feature's precondition was violated at runtime: an internal bug,
    /// not a user-facing failure mode.
    #[error("consistency error: {0}")]
    ConsistencyError(String),

    /// A flow-fact file line could not be parsed.
    #[error("malformed flow fact at line {line}: {text}")]
    MalformedFlowFact {
        /// 1-based line number within the flow-fact file.
        line: usize,
        /// The offending line, verbatim.
        text: String,
    },

    /// The cache-configuration XML document was structurally invalid.
    #[error("invalid cache configuration: {0}")]
    InvalidCacheConfig(String),
}

impl From<std::io::Error> for OtawaError {
    #[cold]
    fn from(err: std::io::Error) -> Self {
        OtawaError::LoadError(format!("I/O error: {err}"))
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, OtawaError>;
