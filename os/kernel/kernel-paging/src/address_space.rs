//! # Address Spaces
//!
//! An [`AddressSpace`] owns the supplemental page records of one process,
//! an index from virtual page to record, the page table they are mapped
//! through, and the current lower boundary of the user stack.
//!
//! ```text
//!  user_end ──────────────┐
//!     stack pages         │  registered lazily by grow_stack_to
//!  stack_bound ───────────┤  (lowest stack page so far)
//!     ...                 │
//!  stack_floor ───────────┤  growth below here is refused
//!     ...                 │
//!     segment pages       │  register_file_segment
//!  user_base ─────────────┘
//! ```

use crate::addresses::{VirtualAddress, VirtualPage};
use crate::arena::{PageArena, PageId};
use crate::backing::{FileHandle, SwapSlot};
use crate::frame::{FrameAlloc, FrameHandle};
use crate::layout::UserLayout;
use crate::mapper::PageTableMapper;
use crate::page::{FileRegion, Page, PageLocation, PageOrigin, PageState};
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;
use kernel_info::memory::{PAGE_BYTES, PAGE_SIZE};
use log::{debug, trace};

/// Identifies an address space (process) in frame-table back-references.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct AddressSpaceId(u32);

impl AddressSpaceId {
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for AddressSpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "address space {}", self.0)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum AddressSpaceError {
    #[error("{0} is outside user space")]
    OutsideUserRange(VirtualPage),
    #[error("{0} is already registered")]
    AlreadyRegistered(VirtualPage),
    #[error("{0} is below the stack limit")]
    StackLimitExceeded(VirtualPage),
    #[error("segment is not page aligned (offset {offset:#x}, length {len:#x})")]
    MisalignedSegment { offset: u64, len: u64 },
    #[error("{0:?} no longer exists")]
    StalePage(PageId),
    #[error("{0} is not resident")]
    NotResident(VirtualPage),
    #[error("{0} holds contents that exist only in memory")]
    CannotDiscard(VirtualPage),
    #[error("{0} must be registered before it is loaded")]
    AlreadyFramed(VirtualPage),
}

/// Where an evicted page's contents go.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Eviction {
    /// The frame was already written to `slot`.
    ToSwap(SwapSlot),
    /// Drop the frame; the page reloads from its file region or zero fill.
    Discard,
}

pub struct AddressSpace<M> {
    id: AddressSpaceId,
    layout: UserLayout,
    mapper: M,
    pages: PageArena,
    index: BTreeMap<VirtualPage, PageId>,
    stack_bound: VirtualPage,
}

impl<M> fmt::Debug for AddressSpace<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressSpace")
            .field("id", &self.id)
            .field("pages", &self.pages.len())
            .field("stack_bound", &self.stack_bound)
            .finish_non_exhaustive()
    }
}

impl<M: PageTableMapper> AddressSpace<M> {
    /// An empty address space. The stack boundary starts at the top of
    /// user space, i.e. no stack pages yet.
    #[must_use]
    pub fn new(id: AddressSpaceId, mapper: M, layout: UserLayout) -> Self {
        Self {
            id,
            layout,
            mapper,
            pages: PageArena::new(),
            index: BTreeMap::new(),
            stack_bound: layout.stack_top(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn id(&self) -> AddressSpaceId {
        self.id
    }

    #[inline]
    #[must_use]
    pub const fn layout(&self) -> &UserLayout {
        &self.layout
    }

    #[inline]
    #[must_use]
    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    #[inline]
    pub const fn mapper_mut(&mut self) -> &mut M {
        &mut self.mapper
    }

    /// Lowest stack page registered so far.
    #[inline]
    #[must_use]
    pub const fn stack_bound(&self) -> VirtualPage {
        self.stack_bound
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.pages.len()
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// The page record covering `addr`, if any.
    #[must_use]
    pub fn lookup(&self, addr: VirtualAddress) -> Option<PageId> {
        self.index.get(&addr.page()).copied()
    }

    #[must_use]
    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.pages.get(id)
    }

    pub(crate) fn page_mut(&mut self, id: PageId) -> Option<&mut Page> {
        self.pages.get_mut(id)
    }

    #[must_use = "iterators are lazy"]
    pub fn pages(&self) -> impl Iterator<Item = (PageId, &Page)> {
        self.pages.iter()
    }

    /// Register a page that is not yet resident.
    ///
    /// # Errors
    /// The page lies outside user space, its address is taken, or it claims
    /// to be framed already.
    pub fn register(&mut self, page: Page) -> Result<PageId, AddressSpaceError> {
        self.check_vacant(page.vaddr())?;
        if page.location() == PageLocation::Framed {
            return Err(AddressSpaceError::AlreadyFramed(page.vaddr()));
        }
        Ok(self.insert(page))
    }

    /// Register the pages of one executable segment starting at `base`.
    ///
    /// The first `read_bytes` come from `file` at `offset`, the following
    /// `zero_bytes` read as zero. Their sum and `offset` must be page
    /// aligned. Either every page is registered or none is.
    ///
    /// # Errors
    /// Misaligned segments, pages outside user space, or pages already in
    /// use.
    pub fn register_file_segment(
        &mut self,
        base: VirtualPage,
        file: FileHandle,
        offset: u64,
        read_bytes: u64,
        zero_bytes: u64,
        writable: bool,
    ) -> Result<u64, AddressSpaceError> {
        let misaligned = AddressSpaceError::MisalignedSegment {
            offset,
            len: read_bytes.saturating_add(zero_bytes),
        };
        let len = read_bytes.checked_add(zero_bytes).ok_or(misaligned)?;
        if offset % PAGE_SIZE != 0 || len % PAGE_SIZE != 0 {
            return Err(misaligned);
        }

        let count = len / PAGE_SIZE;
        let mut inserted = Vec::new();
        let mut remaining = read_bytes;
        let mut file_offset = offset;
        for n in 0..count {
            let placed = base
                .checked_add_pages(n)
                .ok_or(AddressSpaceError::OutsideUserRange(base))
                .and_then(|vpage| self.check_vacant(vpage).map(|()| vpage));
            let vpage = match placed {
                Ok(vpage) => vpage,
                Err(err) => {
                    self.unregister_all(&inserted);
                    return Err(err);
                }
            };

            let chunk = remaining.min(PAGE_SIZE);
            let page = if chunk > 0 {
                let region = FileRegion {
                    file,
                    offset: file_offset,
                };
                let size = usize::try_from(chunk).unwrap_or(PAGE_BYTES);
                Page::file_backed(vpage, region, size, writable)
            } else {
                Page::zeroed(vpage, writable)
            };
            inserted.push(self.insert(page));
            remaining -= chunk;
            file_offset += chunk;
        }

        debug!(
            "{}: registered {count} segment pages at {base} from {file} offset {offset:#x}",
            self.id
        );
        Ok(count)
    }

    /// Register stack pages for every missing page in
    /// `[target, stack_bound)`, or just `target` if it lies above the
    /// boundary. Returns the number of pages created.
    ///
    /// # Errors
    /// `target` is outside user space or below the stack floor.
    pub fn grow_stack_to(&mut self, target: VirtualPage) -> Result<u64, AddressSpaceError> {
        if !self.layout.contains_page(target) {
            return Err(AddressSpaceError::OutsideUserRange(target));
        }
        if target < self.layout.stack_floor_page() {
            return Err(AddressSpaceError::StackLimitExceeded(target));
        }

        let end = match target.next() {
            Some(above) => above.max(self.stack_bound),
            None => self.stack_bound,
        };

        let mut grown = 0;
        let mut vpage = Some(target);
        while let Some(current) = vpage
            && current < end
        {
            if !self.index.contains_key(&current) {
                self.insert(Page::stack(current));
                grown += 1;
            }
            vpage = current.next();
        }

        trace!(
            "{}: stack grown by {grown} pages, boundary now {}",
            self.id, self.stack_bound
        );
        Ok(grown)
    }

    /// Take a resident page out of memory, returning the frame it occupied.
    /// The caller owns the frame afterwards.
    ///
    /// # Errors
    /// The page is gone or not resident, or it is dirty and asked to be
    /// discarded.
    pub fn evict(&mut self, id: PageId, how: Eviction) -> Result<FrameHandle, AddressSpaceError> {
        let page = *self
            .pages
            .get(id)
            .ok_or(AddressSpaceError::StalePage(id))?;
        let vaddr = page.vaddr();
        let Some(frame) = page.frame() else {
            return Err(AddressSpaceError::NotResident(vaddr));
        };

        let next = match how {
            Eviction::ToSwap(slot) => PageState::OnSwap(slot),
            Eviction::Discard => {
                if page.diverged() || self.mapper.is_dirty(vaddr) {
                    return Err(AddressSpaceError::CannotDiscard(vaddr));
                }
                PageState::OnDisk
            }
        };

        self.mapper.uninstall(vaddr);
        if let Some(record) = self.pages.get_mut(id) {
            record.set_state(next);
        }
        trace!("{}: evicted {vaddr} from {frame} ({how:?})", self.id);
        Ok(frame)
    }

    /// Destroy the address space: unmap and free every resident frame and
    /// hand back the swap slots still holding pages, for the swap
    /// allocator to release.
    pub fn teardown<F: FrameAlloc + ?Sized>(self, frames: &mut F) -> Vec<SwapSlot> {
        let Self {
            id,
            mut mapper,
            pages,
            ..
        } = self;

        let mut slots = Vec::new();
        let mut freed = 0usize;
        for page in pages.into_pages() {
            match page.state() {
                PageState::Framed(frame) => {
                    mapper.uninstall(page.vaddr());
                    frames.free_frame(frame);
                    freed += 1;
                }
                PageState::OnSwap(slot) => slots.push(slot),
                PageState::OnDisk => {}
            }
        }

        debug!(
            "{id}: torn down, {freed} frames freed, {} swap slots released",
            slots.len()
        );
        slots
    }

    fn check_vacant(&self, vpage: VirtualPage) -> Result<(), AddressSpaceError> {
        if !self.layout.contains_page(vpage) {
            return Err(AddressSpaceError::OutsideUserRange(vpage));
        }
        if self.index.contains_key(&vpage) {
            return Err(AddressSpaceError::AlreadyRegistered(vpage));
        }
        Ok(())
    }

    /// Drop freshly registered, never loaded pages again.
    fn unregister_all(&mut self, ids: &[PageId]) {
        for &id in ids {
            if let Some(page) = self.pages.remove(id) {
                self.index.remove(&page.vaddr());
            }
        }
    }

    fn insert(&mut self, page: Page) -> PageId {
        let vaddr = page.vaddr();
        if page.origin() == PageOrigin::Stack && vaddr < self.stack_bound {
            self.stack_bound = vaddr;
        }
        let id = self.pages.insert(page);
        self.index.insert(vaddr, id);
        id
    }
}
