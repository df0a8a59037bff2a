//! Backing stores a page can be loaded from.

use crate::frame::PageBuf;
use core::fmt;

/// Slot on the swap device holding one evicted page.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct SwapSlot(u32);

impl SwapSlot {
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SwapSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "swap slot {}", self.0)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum SwapError {
    #[error("{0} is not in use")]
    InvalidSlot(SwapSlot),
    #[error("I/O error reading {0}")]
    Io(SwapSlot),
}

/// Read side of the swap device.
pub trait SwapDevice {
    /// Copy the page stored in `slot` into `dest`.
    ///
    /// # Errors
    /// [`SwapError`] if the slot is unused or the device fails.
    fn retrieve(&mut self, slot: SwapSlot, dest: &mut PageBuf) -> Result<(), SwapError>;
}

/// Open file an executable segment is loaded from.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct FileHandle(u32);

impl FileHandle {
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    #[inline]
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file #{}", self.0)
    }
}

/// Positional reads from the file system.
pub trait FileReader {
    /// Read up to `buf.len()` bytes of `file` starting at `offset`; returns
    /// the number of bytes actually read. A short count means end of file
    /// or an I/O failure.
    fn read_at(&mut self, file: FileHandle, buf: &mut [u8], offset: u64) -> usize;
}
