use crate::{Block, SectorId};
use kernel_info::storage::BLOCK_SECTOR_SIZE;

/// One cache-resident copy of a sector.
///
/// `sector`, `dirty` and `accessed` are only meaningful while the slot is
/// marked occupied in the table's occupancy set.
#[derive(Clone)]
pub struct CacheSlot {
    pub(crate) sector: SectorId,
    /// Bytes are newer than the on-disk copy.
    pub(crate) dirty: bool,
    /// Touched since the clock hand last passed.
    pub(crate) accessed: bool,
    pub(crate) data: Block,
}

impl CacheSlot {
    pub(crate) const fn empty() -> Self {
        Self {
            sector: SectorId::new(0),
            dirty: false,
            accessed: false,
            data: [0; BLOCK_SECTOR_SIZE],
        }
    }

    /// Bind the slot to `sector` with clean, untouched state.
    pub(crate) const fn assign(&mut self, sector: SectorId) {
        self.sector = sector;
        self.dirty = false;
        self.accessed = false;
    }

    #[inline]
    #[must_use]
    pub const fn sector(&self) -> SectorId {
        self.sector
    }

    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    #[must_use]
    pub const fn is_accessed(&self) -> bool {
        self.accessed
    }
}

impl core::fmt::Debug for CacheSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CacheSlot")
            .field("sector", &self.sector)
            .field("dirty", &self.dirty)
            .field("accessed", &self.accessed)
            .finish_non_exhaustive()
    }
}
