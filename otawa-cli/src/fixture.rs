//! Toy fixture loader.
//!
//! ELF/DWARF decoding is out of scope for the core (`spec.md` §1): the
//! driver needs *some* collaborator to turn bytes on disk into a
//! [`otawa_core::program::Process`], so it reads a small JSON fixture
//! format instead. Real deployments plug in a real loader/disassembler
//! here; this one exists to drive the end-to-end scenarios and give
//! users something to point the CLI at without a toolchain.

use std::path::Path;

use anyhow::{Context, Result};
use otawa_core::program::instruction::InstKind;
use otawa_core::program::{Address, Instruction, Platform, Process, Symbol, SymbolKind};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct FixtureFile {
    symbols: Vec<FixtureSymbol>,
    instructions: Vec<FixtureInstruction>,
}

#[derive(Debug, Deserialize)]
struct FixtureSymbol {
    name: String,
    address: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct FixtureInstruction {
    address: String,
    #[serde(default = "default_size")]
    size: u8,
    #[serde(default)]
    flags: Vec<String>,
    #[serde(default)]
    target: Option<String>,
}

fn default_size() -> u8 {
    4
}

/// Parse a hex (`0x...`) or decimal address string.
fn parse_address(text: &str) -> Result<Address> {
    let value = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).with_context(|| format!("invalid hex address '{text}'"))?,
        None => text.parse::<u64>().with_context(|| format!("invalid address '{text}'"))?,
    };
    Ok(Address::new(value))
}

fn parse_flags(flags: &[String]) -> Result<InstKind> {
    let mut kind = InstKind::NONE;
    for flag in flags {
        kind |= match flag.as_str() {
            "branch" => InstKind::BRANCH,
            "conditional" => InstKind::CONDITIONAL,
            "call" => InstKind::CALL,
            "return" => InstKind::RETURN,
            "indirect" => InstKind::INDIRECT,
            "load" => InstKind::LOAD,
            "store" => InstKind::STORE,
            other => anyhow::bail!("unknown instruction flag '{other}'"),
        };
    }
    Ok(kind)
}

/// Load a fixture JSON file into a [`Process`] with an empty platform
/// (callers attach a real [`Platform`] separately, from `-p`).
pub fn load(path: &Path) -> Result<Process> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading fixture '{}'", path.display()))?;
    let fixture: FixtureFile = serde_json::from_str(&text).with_context(|| format!("parsing fixture '{}'", path.display()))?;

    let mut process = Process::new(Platform::new());

    for symbol in fixture.symbols {
        let address = parse_address(&symbol.address)?;
        process.symbols.push(Symbol { name: symbol.name, address, size: symbol.size, kind: SymbolKind::Function });
    }

    for inst in fixture.instructions {
        let address = parse_address(&inst.address)?;
        let target = inst.target.as_deref().map(parse_address).transpose()?;
        let kind = parse_flags(&inst.flags)?;
        process.insert_instruction(Instruction {
            address,
            size: inst.size,
            kind,
            target,
            reads: Default::default(),
            writes: Default::default(),
            semantics: Default::default(),
        });
    }

    Ok(process)
}
