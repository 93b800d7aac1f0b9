//! Addresses and address ranges.

use std::fmt;

/// A 64-bit program address, with a distinguished null sentinel.
///
/// A null address participates in no [`MemoryArea`]: `meet` and
/// `contains` both return `false` whenever either side is null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(Option<u64>);

impl Address {
    /// The distinguished null address.
    pub const NULL: Address = Address(None);

    pub const fn new(value: u64) -> Self {
        Address(Some(value))
    }

    pub fn is_null(self) -> bool {
        self.0.is_none()
    }

    /// The raw value, or `None` for the null address.
    pub fn value(self) -> Option<u64> {
        self.0
    }

    /// Offset by `delta` bytes. Null stays null.
    pub fn offset(self, delta: i64) -> Address {
        match self.0 {
            Some(v) => Address(Some(v.wrapping_add_signed(delta))),
            None => Address::NULL,
        }
    }
}

impl From<u64> for Address {
    fn from(value: u64) -> Self {
        Address::new(value)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "0x{v:08x}"),
            None => write!(f, "<null>"),
        }
    }
}

/// A half-open `[base, base + size)` byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryArea {
    base: Address,
    size: u64,
}

impl MemoryArea {
    pub fn new(base: Address, size: u64) -> Self {
        MemoryArea { base, size }
    }

    pub fn base(&self) -> Address {
        self.base
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn end(&self) -> Address {
        self.base.offset(self.size as i64)
    }

    /// True if `addr` falls within this half-open range.
    pub fn contains(&self, addr: Address) -> bool {
        match (self.base.value(), addr.value(), self.end().value()) {
            (Some(b), Some(a), Some(e)) => a >= b && a < e,
            _ => false,
        }
    }

    /// True if the two ranges overlap (non-empty intersection).
    pub fn meet(&self, other: &MemoryArea) -> bool {
        match (self.base.value(), self.end().value(), other.base.value(), other.end().value()) {
            (Some(b1), Some(e1), Some(b2), Some(e2)) => b1 < e2 && b2 < e1,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_address_contains_nothing() {
        let area = MemoryArea::new(Address::NULL, 16);
        assert!(!area.contains(Address::new(0)));
    }

    #[test]
    fn half_open_range_excludes_end() {
        let area = MemoryArea::new(Address::new(0x1000), 0x10);
        assert!(area.contains(Address::new(0x1000)));
        assert!(area.contains(Address::new(0x100f)));
        assert!(!area.contains(Address::new(0x1010)));
    }

    #[test]
    fn meet_detects_overlap() {
        let a = MemoryArea::new(Address::new(0x1000), 0x100);
        let b = MemoryArea::new(Address::new(0x1080), 0x100);
        let c = MemoryArea::new(Address::new(0x2000), 0x100);
        assert!(a.meet(&b));
        assert!(!a.meet(&c));
    }
}
