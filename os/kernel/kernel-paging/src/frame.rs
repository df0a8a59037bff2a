//! Physical frames and the allocator seam.

use crate::address_space::AddressSpaceId;
use crate::arena::PageId;
use core::fmt;
use kernel_info::memory::PAGE_BYTES;

/// The contents of one page-sized frame.
pub type PageBuf = [u8; PAGE_BYTES];

/// Opaque handle to a physical frame handed out by a [`FrameAlloc`].
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct FrameHandle(u32);

impl FrameHandle {
    #[inline]
    #[must_use]
    pub const fn new(number: u32) -> Self {
        Self(number)
    }

    #[inline]
    #[must_use]
    pub const fn number(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FrameHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame #{}", self.0)
    }
}

/// Back-reference from a frame to the page occupying it, so an evictor can
/// find the owning page from the frame table.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct FrameOwner {
    pub space: AddressSpaceId,
    pub page: PageId,
}

/// Minimal frame allocator used by the fault path.
///
/// Implementations own the frame table; the paging engine only asks for a
/// frame, gives it back, or records who owns it.
pub trait FrameAlloc {
    /// Allocate one frame, or `None` when physical memory is exhausted.
    fn alloc_frame(&mut self) -> Option<FrameHandle>;

    /// Return `frame` to the free pool.
    fn free_frame(&mut self, frame: FrameHandle);

    /// Record the page now occupying `frame`.
    fn bind_owner(&mut self, frame: FrameHandle, owner: FrameOwner);
}

/// Gives the kernel a writable view of a frame's bytes.
pub trait PhysMapper {
    fn frame_mut(&mut self, frame: FrameHandle) -> &mut PageBuf;
}
