//! # Supplemental Page Records
//!
//! A [`Page`] describes one user virtual page: where its contents come
//! from and where they live right now.
//!
//! ```text
//!            swap_in                 evict(ToSwap)
//!   OnDisk ─────────────▶ Framed ─────────────────▶ OnSwap
//!     ▲                     │  ▲                      │
//!     └─────────────────────┘  └──────────────────────┘
//!         evict(Discard)               swap_in
//! ```
//!
//! `Framed` is only ever entered through a completed swap-in; a failed
//! swap-in leaves the state untouched.

use crate::addresses::VirtualPage;
use crate::backing::{FileHandle, SwapSlot};
use crate::frame::FrameHandle;
use kernel_info::memory::PAGE_BYTES;

/// Why a page exists.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PageOrigin {
    /// Part of a loaded executable segment.
    File,
    /// Created by stack growth.
    Stack,
}

/// Coarse location of a page's contents.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PageLocation {
    OnDisk,
    OnSwap,
    Framed,
}

/// Location of a page's contents, with the handle needed to reach them.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PageState {
    /// Reproducible from the file region, or zero-filled if there is none.
    OnDisk,
    OnSwap(SwapSlot),
    Framed(FrameHandle),
}

impl PageState {
    #[must_use]
    pub const fn location(self) -> PageLocation {
        match self {
            Self::OnDisk => PageLocation::OnDisk,
            Self::OnSwap(_) => PageLocation::OnSwap,
            Self::Framed(_) => PageLocation::Framed,
        }
    }
}

/// Where in a file a page's initial bytes are read from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct FileRegion {
    pub file: FileHandle,
    pub offset: u64,
}

/// One user virtual page.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Page {
    vaddr: VirtualPage,
    size: usize,
    origin: PageOrigin,
    writable: bool,
    state: PageState,
    file: Option<FileRegion>,
    diverged: bool,
}

impl Page {
    /// A page whose first `size` bytes come from `region`; the rest of the
    /// page reads as zero. `size` is clamped to one page.
    #[must_use]
    pub fn file_backed(vaddr: VirtualPage, region: FileRegion, size: usize, writable: bool) -> Self {
        Self {
            vaddr,
            size: size.min(PAGE_BYTES),
            origin: PageOrigin::File,
            writable,
            state: PageState::OnDisk,
            file: Some(region),
            diverged: false,
        }
    }

    /// An all-zero page of an executable segment (e.g. `.bss`).
    #[must_use]
    pub const fn zeroed(vaddr: VirtualPage, writable: bool) -> Self {
        Self {
            vaddr,
            size: 0,
            origin: PageOrigin::File,
            writable,
            state: PageState::OnDisk,
            file: None,
            diverged: false,
        }
    }

    /// A writable, zero-filled stack page.
    #[must_use]
    pub const fn stack(vaddr: VirtualPage) -> Self {
        Self {
            vaddr,
            size: PAGE_BYTES,
            origin: PageOrigin::Stack,
            writable: true,
            state: PageState::OnDisk,
            file: None,
            diverged: false,
        }
    }

    #[inline]
    #[must_use]
    pub const fn vaddr(&self) -> VirtualPage {
        self.vaddr
    }

    /// Number of valid bytes; only meaningful with a file region.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[inline]
    #[must_use]
    pub const fn origin(&self) -> PageOrigin {
        self.origin
    }

    #[inline]
    #[must_use]
    pub const fn writable(&self) -> bool {
        self.writable
    }

    #[inline]
    #[must_use]
    pub const fn state(&self) -> PageState {
        self.state
    }

    #[inline]
    #[must_use]
    pub const fn location(&self) -> PageLocation {
        self.state.location()
    }

    #[inline]
    #[must_use]
    pub const fn file(&self) -> Option<FileRegion> {
        self.file
    }

    #[must_use]
    pub const fn frame(&self) -> Option<FrameHandle> {
        match self.state {
            PageState::Framed(frame) => Some(frame),
            _ => None,
        }
    }

    #[must_use]
    pub const fn swap_slot(&self) -> Option<SwapSlot> {
        match self.state {
            PageState::OnSwap(slot) => Some(slot),
            _ => None,
        }
    }

    /// Whether the contents can no longer be rebuilt from the file region
    /// (or zero fill), because they once went to swap.
    #[inline]
    #[must_use]
    pub const fn diverged(&self) -> bool {
        self.diverged
    }

    pub(crate) const fn set_state(&mut self, state: PageState) {
        if let PageState::OnSwap(_) = state {
            self.diverged = true;
        }
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addresses::VirtualAddress;

    fn at(addr: u64) -> VirtualPage {
        VirtualAddress::new(addr).page()
    }

    #[test]
    fn file_backed_size_is_clamped() {
        let region = FileRegion {
            file: FileHandle::new(1),
            offset: 0,
        };
        let page = Page::file_backed(at(0x0804_8000), region, PAGE_BYTES + 7, false);
        assert_eq!(page.size(), PAGE_BYTES);
        assert_eq!(page.location(), PageLocation::OnDisk);
        assert_eq!(page.file(), Some(region));
    }

    #[test]
    fn stack_pages_are_writable_and_fileless() {
        let page = Page::stack(at(0xBFFF_F000));
        assert!(page.writable());
        assert_eq!(page.origin(), PageOrigin::Stack);
        assert_eq!(page.file(), None);
    }

    #[test]
    fn swapping_out_marks_the_page_diverged() {
        let mut page = Page::zeroed(at(0x0805_0000), true);
        page.set_state(PageState::Framed(FrameHandle::new(3)));
        assert!(!page.diverged());
        page.set_state(PageState::OnSwap(SwapSlot::new(9)));
        assert!(page.diverged());
        assert_eq!(page.swap_slot(), Some(SwapSlot::new(9)));
        page.set_state(PageState::Framed(FrameHandle::new(4)));
        assert!(page.diverged());
        assert_eq!(page.frame(), Some(FrameHandle::new(4)));
    }
}
