//! Per-address-space page table seam.

use crate::addresses::VirtualPage;
use crate::frame::FrameHandle;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MapError {
    #[error("{0} is already mapped")]
    AlreadyMapped(VirtualPage),
    #[error("out of memory for page tables")]
    OutOfMemory,
}

/// The hardware page table of one address space.
pub trait PageTableMapper {
    /// Map `page` to `frame`, read-only unless `writable`.
    ///
    /// # Errors
    /// [`MapError`] if `page` already has a mapping or a table could not be
    /// allocated. Nothing is changed on error.
    fn install(&mut self, page: VirtualPage, frame: FrameHandle, writable: bool)
    -> Result<(), MapError>;

    /// Remove the mapping of `page`, returning the frame it pointed to.
    fn uninstall(&mut self, page: VirtualPage) -> Option<FrameHandle>;

    fn translate(&self, page: VirtualPage) -> Option<FrameHandle>;

    /// Whether the hardware dirty bit of `page` is set.
    fn is_dirty(&self, page: VirtualPage) -> bool;
}
