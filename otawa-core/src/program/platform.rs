//! Platform description: memory banks and the cache hierarchy.
//!
//! Populated from a [`crate::platform_xml`]-parsed `<cache-config>`
//! document (or built up programmatically by tests); consumed read-only
//! by the l-block builder (C8) and the cache abstract interpretation
//! (C9).

use super::address::{Address, MemoryArea};
use super::register::RegisterBank;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementPolicy {
    Lru,
    Fifo,
    Random,
    PseudoLru,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    WriteThrough,
    WriteBack,
}

/// One level of a cache hierarchy.
///
/// `sets` and `block_size` are both required to be powers of two so that
/// [`Cache::set`]/[`Cache::tag`] can use shifts/masks rather than division.
#[derive(Debug, Clone)]
pub struct Cache {
    pub sets: u32,
    pub associativity: u32,
    pub block_size: u32,
    pub policy: ReplacementPolicy,
    pub write_policy: WritePolicy,
    /// Cycles charged to the IPET objective for each miss at this level.
    pub miss_penalty: i64,
    /// Index into the platform's cache list for the next level up, if any.
    pub next_level: Option<usize>,
}

impl Cache {
    pub fn new(sets: u32, associativity: u32, block_size: u32, policy: ReplacementPolicy, write_policy: WritePolicy) -> Self {
        assert!(sets.is_power_of_two(), "cache set count must be a power of two");
        assert!(block_size.is_power_of_two(), "cache block size must be a power of two");
        Cache { sets, associativity, block_size, policy, write_policy, miss_penalty: 0, next_level: None }
    }

    pub fn with_miss_penalty(mut self, miss_penalty: i64) -> Self {
        self.miss_penalty = miss_penalty;
        self
    }

    fn block_bits(&self) -> u32 {
        self.block_size.trailing_zeros()
    }

    fn set_bits(&self) -> u32 {
        self.sets.trailing_zeros()
    }

    /// Cache block index containing `addr` (address >> log2(block size)).
    pub fn block(&self, addr: Address) -> Option<u64> {
        Some(addr.value()? >> self.block_bits())
    }

    /// Which set `addr` maps to.
    pub fn set(&self, addr: Address) -> Option<u32> {
        let block = self.block(addr)?;
        Some((block & (self.sets as u64 - 1)) as u32)
    }

    /// The tag bits of `addr` (block index with the set bits removed).
    pub fn tag(&self, addr: Address) -> Option<u64> {
        let block = self.block(addr)?;
        Some(block >> self.set_bits())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryBankKind {
    Rom,
    Scratchpad,
    Dram,
    Io,
}

#[derive(Debug, Clone)]
pub struct MemoryBank {
    pub name: String,
    pub area: MemoryArea,
    pub kind: MemoryBankKind,
    pub read_latency: u32,
    pub write_latency: u32,
    pub cached: bool,
}

/// Optional pipeline description: stage count and per-stage latency.
/// The core does not model pipelines beyond exposing this to a timing
/// analysis that lives outside core scope; it is carried because §4.3
/// names it as part of the platform description.
#[derive(Debug, Clone)]
pub struct PipelineDescriptor {
    pub stage_latencies: Vec<u32>,
}

/// The full hardware description consumed by the core.
#[derive(Debug, Clone, Default)]
pub struct Platform {
    pub register_banks: Vec<RegisterBank>,
    pub memory_banks: Vec<MemoryBank>,
    /// Instruction cache hierarchy, L1 first.
    pub icache: Vec<Cache>,
    /// Data cache hierarchy, L1 first.
    pub dcache: Vec<Cache>,
    pub pipeline: Option<PipelineDescriptor>,
}

impl Platform {
    pub fn new() -> Self {
        Platform::default()
    }

    pub fn memory_bank_at(&self, addr: Address) -> Option<&MemoryBank> {
        self.memory_banks.iter().find(|bank| bank.area.contains(addr))
    }
}
