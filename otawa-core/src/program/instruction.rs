//! Read-only decoded instructions.
//!
//! Instructions are owned by the loader (an external collaborator, see
//! `spec.md` §1/§4.3) and are never mutated by analyses; analyses attach
//! results as properties on the blocks/edges/CFGs that reference them
//! instead.

use smallvec::SmallVec;

use super::address::Address;
use super::register::RegId;

/// Bitset of instruction kind flags.
///
/// A manual bitset over a `u16` rather than an enum: most instructions set
/// several flags at once (e.g. a conditional call is `BRANCH | CONDITIONAL
/// | CALL`), so a sum type would force one flag to be primary and the rest
/// bolted on as booleans anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstKind(u16);

impl InstKind {
    pub const BRANCH: InstKind = InstKind(1 << 0);
    pub const CONDITIONAL: InstKind = InstKind(1 << 1);
    pub const CALL: InstKind = InstKind(1 << 2);
    pub const RETURN: InstKind = InstKind(1 << 3);
    pub const INDIRECT: InstKind = InstKind(1 << 4);
    pub const LOAD: InstKind = InstKind(1 << 5);
    pub const STORE: InstKind = InstKind(1 << 6);
    pub const FLOAT: InstKind = InstKind(1 << 7);
    pub const MULTI_MEMORY: InstKind = InstKind(1 << 8);
    pub const INTERN: InstKind = InstKind(1 << 9);

    pub const NONE: InstKind = InstKind(0);

    pub const fn contains(self, flag: InstKind) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub const fn union(self, other: InstKind) -> InstKind {
        InstKind(self.0 | other.0)
    }
}

impl std::ops::BitOr for InstKind {
    type Output = InstKind;
    fn bitor(self, rhs: InstKind) -> InstKind {
        self.union(rhs)
    }
}

impl std::ops::BitOrAssign for InstKind {
    fn bitor_assign(&mut self, rhs: InstKind) {
        *self = self.union(rhs);
    }
}

/// A semantic micro-operation, the value-level IR that dataflow analyses
/// needing actual semantics (as opposed to the coarse [`InstKind`] bitset)
/// are driven from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemOp {
    /// Load a value from memory into a register.
    Load { dst: RegId, base: RegId, offset: i32 },
    /// Store a register's value to memory.
    Store { src: RegId, base: RegId, offset: i32 },
    /// `dst = a + b` (or `a + imm` when `b` is `None`).
    Add { dst: RegId, a: RegId, b: Option<RegId>, imm: i64 },
    /// Compare two values, setting an implicit condition.
    Cmp { a: RegId, b: Option<RegId>, imm: i64 },
    /// Conditional continuation: branch if the last comparison matches.
    If { target: Address },
    /// Unconditional continuation to the next instruction (fall-through).
    Cont,
    /// Clobber a register with an unknown value (call conventions, etc.).
    Scratch { reg: RegId },
}

/// A decoded instruction.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub address: Address,
    pub size: u8,
    pub kind: InstKind,
    /// Direct branch target, if statically known.
    pub target: Option<Address>,
    pub reads: SmallVec<[RegId; 4]>,
    pub writes: SmallVec<[RegId; 2]>,
    pub semantics: SmallVec<[SemOp; 4]>,
}

impl Instruction {
    pub fn is_branch(&self) -> bool {
        self.kind.contains(InstKind::BRANCH)
    }

    pub fn is_conditional(&self) -> bool {
        self.kind.contains(InstKind::CONDITIONAL)
    }

    pub fn is_call(&self) -> bool {
        self.kind.contains(InstKind::CALL)
    }

    pub fn is_return(&self) -> bool {
        self.kind.contains(InstKind::RETURN)
    }

    pub fn is_indirect(&self) -> bool {
        self.kind.contains(InstKind::INDIRECT)
    }

    pub fn end_address(&self) -> Address {
        self.address.offset(self.size as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_union_is_queryable() {
        let k = InstKind::BRANCH | InstKind::CONDITIONAL;
        assert!(k.contains(InstKind::BRANCH));
        assert!(k.contains(InstKind::CONDITIONAL));
        assert!(!k.contains(InstKind::CALL));
    }

    #[test]
    fn end_address_accounts_for_size() {
        let inst = Instruction {
            address: Address::new(0x1000),
            size: 4,
            kind: InstKind::NONE,
            target: None,
            reads: SmallVec::new(),
            writes: SmallVec::new(),
            semantics: SmallVec::new(),
        };
        assert_eq!(inst.end_address(), Address::new(0x1004));
    }
}
