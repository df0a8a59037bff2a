use crate::bitmap::SlotBitmap;
use crate::clock::ClockHand;
use crate::device::{BlockDevice, BlockDeviceError};
use crate::slot::CacheSlot;
use crate::{Block, SectorId};
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;
use kernel_info::storage::{BLOCK_SECTOR_SIZE, BUFFER_CACHE_SLOTS};
use kernel_sync::TicketMutex;
use log::{debug, error, trace};

/// Fixed-capacity write-back cache of device sectors.
///
/// All state sits behind one [`TicketMutex`]. Lookups, slot allocation,
/// eviction and the device transfers they trigger all happen with the lock
/// held, so every operation is atomic with respect to every other cache
/// user, at the price of serializing all cache traffic behind device
/// latency.
///
/// Any [`CacheError`] returned from here is unrecoverable for the file
/// system; callers are expected to halt.
pub struct BlockCache<D: BlockDevice> {
    table: TicketMutex<CacheTable<D>>,
}

/// Everything guarded by the cache lock.
///
/// # Invariants
/// - At most `slots.len()` slots are occupied.
/// - `index` maps exactly the sectors of occupied slots, so a sector is
///   resident in at most one slot.
/// - A dirty slot holds bytes newer than the device copy.
struct CacheTable<D> {
    device: D,
    slots: Vec<CacheSlot>,
    occupied: SlotBitmap,
    index: BTreeMap<SectorId, usize>,
    clock: ClockHand,
    stats: CacheStats,
}

/// Whether a miss must fetch the sector before the slot is used.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum Fill {
    /// The caller reads the slot, or only overwrites part of it.
    Load,
    /// The caller overwrites the whole slot.
    Overwrite,
}

/// Counters since the cache was created.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub write_backs: u64,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Buffer cache: {} hits, {} misses, {} evictions, {} write-backs",
            self.hits, self.misses, self.evictions, self.write_backs
        )
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum CacheError {
    #[error("{sector} is beyond the end of the device ({block_count} sectors)")]
    SectorOutOfRange { sector: SectorId, block_count: u32 },
    #[error("range {offset}..{offset}+{len} does not fit in a sector")]
    RangeOutsideSector { offset: usize, len: usize },
    #[error("buffer cache is full and no slot could be evicted")]
    NoEvictableSlot,
    #[error("block device failure: {0}")]
    Device(#[from] BlockDeviceError),
}

impl<D: BlockDevice> BlockCache<D> {
    /// Create a cache of `capacity` slots in front of `device`.
    ///
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(device: D, capacity: usize) -> Self {
        assert!(capacity > 0, "buffer cache needs at least one slot");
        debug!("Initializing buffer cache with {capacity} slots of {BLOCK_SECTOR_SIZE} bytes");
        Self {
            table: TicketMutex::new(CacheTable {
                device,
                slots: alloc::vec![CacheSlot::empty(); capacity],
                occupied: SlotBitmap::new(capacity),
                index: BTreeMap::new(),
                clock: ClockHand::new(),
                stats: CacheStats::default(),
            }),
        }
    }

    /// Create a cache with the configured [`BUFFER_CACHE_SLOTS`].
    pub fn with_default_capacity(device: D) -> Self {
        Self::new(device, BUFFER_CACHE_SLOTS)
    }

    /// Copy the current contents of `sector` into `buf`.
    ///
    /// # Errors
    /// See [`CacheError`]; every error is fatal to the file system.
    pub fn read(&self, sector: SectorId, buf: &mut Block) -> Result<(), CacheError> {
        let mut t = self.table.lock();
        let i = t.slot_for(sector, Fill::Load)?;
        let slot = &mut t.slots[i];
        slot.accessed = true;
        buf.copy_from_slice(&slot.data);
        Ok(())
    }

    /// Replace the contents of `sector` with `buf`.
    ///
    /// The sector is not read from the device; the slot is marked dirty and
    /// reaches the device on eviction or [`flush`](Self::flush).
    ///
    /// # Errors
    /// See [`CacheError`]; every error is fatal to the file system.
    pub fn write(&self, sector: SectorId, buf: &Block) -> Result<(), CacheError> {
        let mut t = self.table.lock();
        let i = t.slot_for(sector, Fill::Overwrite)?;
        let slot = &mut t.slots[i];
        slot.data.copy_from_slice(buf);
        slot.accessed = true;
        slot.dirty = true;
        Ok(())
    }

    /// Copy `buf.len()` bytes starting at `offset` within `sector` into `buf`.
    ///
    /// # Errors
    /// [`CacheError::RangeOutsideSector`] if the range crosses the sector end,
    /// otherwise as for [`read`](Self::read).
    pub fn read_at(&self, sector: SectorId, offset: usize, buf: &mut [u8]) -> Result<(), CacheError> {
        let range = sector_range(offset, buf.len())?;
        let mut t = self.table.lock();
        let i = t.slot_for(sector, Fill::Load)?;
        let slot = &mut t.slots[i];
        slot.accessed = true;
        buf.copy_from_slice(&slot.data[range]);
        Ok(())
    }

    /// Overwrite `buf.len()` bytes starting at `offset` within `sector`.
    ///
    /// A partial write to a sector that is not resident loads it first so
    /// the untouched bytes survive.
    ///
    /// # Errors
    /// [`CacheError::RangeOutsideSector`] if the range crosses the sector end,
    /// otherwise as for [`write`](Self::write).
    pub fn write_at(&self, sector: SectorId, offset: usize, buf: &[u8]) -> Result<(), CacheError> {
        let range = sector_range(offset, buf.len())?;
        let fill = if range.len() == BLOCK_SECTOR_SIZE {
            Fill::Overwrite
        } else {
            Fill::Load
        };
        let mut t = self.table.lock();
        let i = t.slot_for(sector, fill)?;
        let slot = &mut t.slots[i];
        slot.data[range].copy_from_slice(buf);
        slot.accessed = true;
        slot.dirty = true;
        Ok(())
    }

    /// Write every dirty slot back to the device. Slots stay resident.
    ///
    /// Returns the number of sectors written.
    ///
    /// # Errors
    /// The first device failure; slots not yet written stay dirty.
    pub fn flush(&self) -> Result<usize, CacheError> {
        self.table.lock().flush()
    }

    /// Flush and hand back the device.
    ///
    /// # Errors
    /// As for [`flush`](Self::flush).
    pub fn shutdown(self) -> Result<D, CacheError> {
        let mut t = self.table.into_inner();
        let written = t.flush()?;
        debug!("Buffer cache shut down, {written} dirty sectors flushed. {}", t.stats);
        Ok(t.device)
    }

    /// Number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.table.lock().slots.len()
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn resident(&self) -> usize {
        self.table.lock().occupied.count_set()
    }

    #[must_use]
    pub fn contains(&self, sector: SectorId) -> bool {
        self.table.lock().index.contains_key(&sector)
    }

    /// `Some(dirty)` if `sector` is resident.
    #[must_use]
    pub fn is_dirty(&self, sector: SectorId) -> Option<bool> {
        let t = self.table.lock();
        t.index.get(&sector).map(|&i| t.slots[i].dirty)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.table.lock().stats
    }
}

impl<D: BlockDevice> CacheTable<D> {
    /// Find the slot holding `sector`, allocating (and possibly evicting)
    /// one on a miss.
    fn slot_for(&mut self, sector: SectorId, fill: Fill) -> Result<usize, CacheError> {
        let block_count = self.device.block_count();
        if sector.as_u32() >= block_count {
            return Err(CacheError::SectorOutOfRange {
                sector,
                block_count,
            });
        }

        if let Some(&i) = self.index.get(&sector) {
            trace!("Buffer cache hit for {sector} in slot {i}");
            self.stats.hits += 1;
            return Ok(i);
        }

        let i = self.allocate(sector)?;
        trace!("Buffer cache miss for {sector}, using slot {i}");

        if fill == Fill::Load
            && let Err(e) = self.device.read_block(sector, &mut self.slots[i].data)
        {
            error!("Failed to load {sector} into the buffer cache: {e}");
            self.release(i);
            return Err(e.into());
        }
        self.stats.misses += 1;
        Ok(i)
    }

    /// Claim the lowest free slot for `sector`, evicting first if the table
    /// is full.
    fn allocate(&mut self, sector: SectorId) -> Result<usize, CacheError> {
        if self.occupied.count_free() == 0 {
            self.evict()?;
        }
        let Some(i) = self.occupied.first_free() else {
            error!("Buffer cache is full and we are not able to evict");
            return Err(CacheError::NoEvictableSlot);
        };
        self.occupied.set(i);
        self.slots[i].assign(sector);
        self.index.insert(sector, i);
        Ok(i)
    }

    /// Free one slot chosen by the clock hand, writing it back if dirty.
    fn evict(&mut self) -> Result<(), CacheError> {
        let Some(victim) = self.clock.select_victim(&mut self.slots, &self.occupied) else {
            error!(
                "Clock sweep found no evictable slot among {} occupied slots",
                self.occupied.count_set()
            );
            return Err(CacheError::NoEvictableSlot);
        };

        let slot = &self.slots[victim];
        let sector = slot.sector;
        if slot.dirty {
            debug!("Writing back {sector} from slot {victim} before reuse");
            if let Err(e) = self.device.write_block(sector, &slot.data) {
                // The slot stays resident and dirty; nothing is lost.
                error!("Write-back of {sector} failed: {e}");
                return Err(e.into());
            }
            self.stats.write_backs += 1;
        }
        debug!("Evicted {sector} from slot {victim}");
        self.stats.evictions += 1;
        self.release(victim);
        Ok(())
    }

    fn release(&mut self, i: usize) {
        let slot = &mut self.slots[i];
        self.index.remove(&slot.sector);
        slot.dirty = false;
        slot.accessed = false;
        self.occupied.clear(i);
    }

    fn flush(&mut self) -> Result<usize, CacheError> {
        let mut written = 0;
        for i in self.occupied.iter_set() {
            let slot = &mut self.slots[i];
            if !slot.dirty {
                continue;
            }
            self.device.write_block(slot.sector, &slot.data)?;
            slot.dirty = false;
            self.stats.write_backs += 1;
            written += 1;
        }
        if written > 0 {
            debug!("Flushed {written} dirty sectors");
        }
        Ok(written)
    }
}

fn sector_range(offset: usize, len: usize) -> Result<core::ops::Range<usize>, CacheError> {
    match offset.checked_add(len) {
        Some(end) if end <= BLOCK_SECTOR_SIZE => Ok(offset..end),
        _ => Err(CacheError::RangeOutsideSector { offset, len }),
    }
}
