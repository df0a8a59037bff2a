//! Block device seam.

use crate::Block;
use core::fmt;

/// Index of a sector on a block device.
///
/// Sector ids are dense and zero-based; valid ids are `0..block_count()`.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
pub struct SectorId(u32);

impl SectorId {
    #[inline]
    #[must_use]
    pub const fn new(sector: u32) -> Self {
        Self(sector)
    }

    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for SectorId {
    #[inline]
    fn from(sector: u32) -> Self {
        Self(sector)
    }
}

impl fmt::Display for SectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sector {}", self.0)
    }
}

impl fmt::Debug for SectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SectorId({})", self.0)
    }
}

/// A device that transfers whole sectors.
///
/// Implementations block until the transfer is complete. The buffer cache
/// calls these with its lock held, so a slow device stalls every cache user.
pub trait BlockDevice {
    /// Number of sectors on the device.
    fn block_count(&self) -> u32;

    /// Read `sector` into `buf`.
    ///
    /// # Errors
    /// The device failed to complete the transfer.
    fn read_block(&mut self, sector: SectorId, buf: &mut Block) -> Result<(), BlockDeviceError>;

    /// Write `buf` to `sector`.
    ///
    /// # Errors
    /// The device failed to complete the transfer.
    fn write_block(&mut self, sector: SectorId, buf: &Block) -> Result<(), BlockDeviceError>;
}

impl<D: BlockDevice + ?Sized> BlockDevice for &mut D {
    fn block_count(&self) -> u32 {
        (**self).block_count()
    }

    fn read_block(&mut self, sector: SectorId, buf: &mut Block) -> Result<(), BlockDeviceError> {
        (**self).read_block(sector, buf)
    }

    fn write_block(&mut self, sector: SectorId, buf: &Block) -> Result<(), BlockDeviceError> {
        (**self).write_block(sector, buf)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum BlockDeviceError {
    #[error("{0} is beyond the end of the device")]
    OutOfRange(SectorId),
    #[error("I/O error on {0}")]
    Io(SectorId),
}
