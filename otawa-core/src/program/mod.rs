//! The read-only program model (component C3).
//!
//! Everything here is populated by an external loader and never mutated
//! by an analysis afterwards; analyses attach their findings as
//! properties instead of writing back into the model.

pub mod address;
pub mod instruction;
pub mod platform;
pub mod register;

use std::collections::HashMap;

pub use address::{Address, MemoryArea};
pub use instruction::{InstKind, Instruction, SemOp};
pub use platform::Platform;
pub use register::{RegId, RegisterBank, RegisterKind};

/// A named location in the symbol table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub address: Address,
    pub size: u64,
    pub kind: SymbolKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Function,
    Data,
    Label,
}

/// One segment of one loaded file.
#[derive(Debug, Clone)]
pub struct Segment {
    pub name: String,
    pub area: MemoryArea,
    pub executable: bool,
    pub writable: bool,
}

/// A loaded file: a sequence of segments.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub path: String,
    pub segments: Vec<Segment>,
}

/// The decoded process image: files, symbols, and the decoded-instruction
/// lookup that [`Loader::inst_at`] is built from.
///
/// The core never decodes bytes itself — it is handed a `Process` by
/// whatever external loader/disassembler collaborator the host wires in
/// (see `spec.md` §1, §4.3). `otawa-cli`'s own tiny fixture loader is one
/// such collaborator, used only to drive the end-to-end test scenarios.
#[derive(Debug, Clone, Default)]
pub struct Process {
    pub files: Vec<LoadedFile>,
    pub symbols: Vec<Symbol>,
    instructions: HashMap<u64, Instruction>,
    pub platform: Platform,
}

impl Process {
    pub fn new(platform: Platform) -> Self {
        Process { files: Vec::new(), symbols: Vec::new(), instructions: HashMap::new(), platform }
    }

    /// Register a decoded instruction at its address.
    pub fn insert_instruction(&mut self, inst: Instruction) {
        if let Some(addr) = inst.address.value() {
            self.instructions.insert(addr, inst);
        }
    }

    /// Look up the decoded instruction at `address`, if any.
    pub fn inst_at(&self, address: Address) -> Option<&Instruction> {
        self.instructions.get(&address.value()?)
    }

    /// Look up a symbol by name.
    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.name == name)
    }

    /// Look up the symbol (if any) that starts exactly at `address`.
    pub fn symbol_at(&self, address: Address) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.address == address)
    }
}
