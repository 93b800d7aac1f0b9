//! The generic dataflow domain contract (`spec.md` §4.6).

/// A join-semilattice value type. The engine drives the actual transfer
/// function as a plain closure (its shape differs per analysis —
/// per-block instruction effects for reaching-definitions-style
/// analyses, per-set cache updates for Must/May/Persistence), so only
/// the lattice operations live on the trait itself.
///
/// `enter_context`/`leave_context` let a domain push/pop per-loop-header
/// state (used by the Persistence cache domain's frame stack); the
/// default no-op is correct for every domain that doesn't care about
/// loop nesting.
pub trait Domain: Clone {
    fn bottom() -> Self;

    /// Semantic equality used to detect fixpoint convergence. Usually
    /// just `PartialEq`, but kept as its own method since some domains
    /// (e.g. Persistence, whose age vectors can differ while denoting
    /// the same abstract state) need a looser notion.
    fn equal(&self, other: &Self) -> bool;

    /// Join two states flowing into the same block.
    fn join(&self, other: &Self) -> Self;

    /// Called when control flow crosses into a loop header's back-edge
    /// for the first time in this pass; default no-op.
    fn enter_context(&self) -> Self {
        self.clone()
    }

    /// Called when control flow crosses a loop exit edge; default no-op.
    fn leave_context(&self) -> Self {
        self.clone()
    }
}
