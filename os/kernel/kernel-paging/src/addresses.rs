//! # User Virtual Addresses
//!
//! Two thin `u64` wrappers keep raw addresses and page bases apart:
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`VirtualAddress`] | Any byte address, e.g. the faulting address. |
//! | [`VirtualPage`] | The page-aligned base of one [`PAGE_SIZE`] page. |
//!
//! A page is obtained from an address by aligning down
//! ([`VirtualAddress::page`]); there is no way to build an unaligned
//! [`VirtualPage`].

use core::fmt;
use kernel_info::memory::PAGE_SIZE;

const OFFSET_MASK: u64 = PAGE_SIZE - 1;

/// A virtual address in some address space.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct VirtualAddress(u64);

impl VirtualAddress {
    #[inline]
    #[must_use]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The page containing this address (aligns down).
    #[inline]
    #[must_use]
    pub const fn page(self) -> VirtualPage {
        VirtualPage(self.0 & !OFFSET_MASK)
    }

    /// `None` if the subtraction would wrap below address zero.
    #[inline]
    #[must_use]
    pub const fn checked_sub(self, bytes: u64) -> Option<Self> {
        match self.0.checked_sub(bytes) {
            Some(a) => Some(Self(a)),
            None => None,
        }
    }
}

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl fmt::Debug for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualAddress({:#010x})", self.0)
    }
}

/// Page-aligned base of a virtual page.
///
/// ### Invariants
/// - The low `PAGE_SHIFT` bits are always zero.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPage(u64);

impl VirtualPage {
    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress(self.0)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// The page `n` pages above this one.
    #[inline]
    #[must_use]
    pub const fn checked_add_pages(self, n: u64) -> Option<Self> {
        match n.checked_mul(PAGE_SIZE) {
            Some(bytes) => match self.0.checked_add(bytes) {
                Some(base) => Some(Self(base)),
                None => None,
            },
            None => None,
        }
    }

    /// The next page up, or `None` at the top of the address range.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        self.checked_add_pages(1)
    }
}

impl fmt::Display for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {:#010x}", self.0)
    }
}

impl fmt::Debug for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualPage({:#010x})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_aligns_down() {
        let va = VirtualAddress::new(0x0804_8123);
        assert_eq!(va.page().as_u64(), 0x0804_8000);
        assert_eq!(va.page().base(), VirtualAddress::new(0x0804_8000));
    }

    #[test]
    fn checked_sub_refuses_to_wrap() {
        let sp = VirtualAddress::new(0x100);
        assert_eq!(sp.checked_sub(0x100), Some(VirtualAddress::new(0)));
        assert_eq!(sp.checked_sub(0x101), None);
    }

    #[test]
    fn page_arithmetic() {
        let p = VirtualAddress::new(0xBFFF_E000).page();
        let top = VirtualAddress::new(0xC000_0000).page();
        assert_eq!(p.checked_add_pages(2), Some(top));
        assert_eq!(p.next().and_then(VirtualPage::next), Some(top));
        assert_eq!(VirtualAddress::new(u64::MAX).page().next(), None);
    }

    #[test]
    fn display_formats() {
        let va = VirtualAddress::new(0xBFFF_FF80);
        assert_eq!(va.to_string(), "0xbfffff80");
        assert_eq!(va.page().to_string(), "page 0xbffff000");
    }
}
