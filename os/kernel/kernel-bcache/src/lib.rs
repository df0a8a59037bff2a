//! # Buffer Cache
//!
//! A fixed pool of in-memory sector slots in front of a [`BlockDevice`].
//! The file system routes every sector transfer through [`BlockCache`], so
//! repeated access to inode and data sectors is served from memory and
//! writes are coalesced until the slot is reused or the cache is flushed.
//!
//! ## Slot Lifecycle
//!
//! ```text
//!             read/write miss                 clock sweep picks it
//!   ┌──────┐ ─────────────────► ┌──────────┐ ─────────────────────► ┌──────┐
//!   │ free │                    │ occupied │  (write back if dirty)  │ free │
//!   └──────┘                    └──────────┘                         └──────┘
//!                                  │    ▲
//!                                  └────┘ read/write hit: set accessed,
//!                                          write: set dirty
//! ```
//!
//! * Slots are claimed lazily; the lowest free index wins.
//! * When no slot is free, the [`ClockHand`] sweeps at most `N + 1` slots,
//!   clearing accessed bits until it finds a slot whose bit was already
//!   clear. That slot is written back if dirty and then reused.
//! * [`BlockCache::flush`] writes every dirty slot back without evicting it.
//!
//! ## Concurrency
//!
//! One lock guards the whole table, and device I/O happens with it held.
//! Any two operations are therefore atomic with respect to each other:
//! no reader sees a half-written slot, and a dirty slot is always written
//! back before another sector takes it over.
//!
//! ## Example
//!
//! ```ignore
//! use kernel_bcache::{BlockCache, SectorId};
//!
//! let cache = BlockCache::with_default_capacity(disk);
//! cache.write(SectorId::new(7), &[0xAA; 512])?;
//!
//! let mut buf = [0; 512];
//! cache.read(SectorId::new(7), &mut buf)?; // served from memory
//! let disk = cache.shutdown()?;            // dirty sector reaches the disk
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod bitmap;
mod cache;
mod clock;
mod device;
mod slot;

pub use crate::bitmap::SlotBitmap;
pub use crate::cache::{BlockCache, CacheError, CacheStats};
pub use crate::clock::ClockHand;
pub use crate::device::{BlockDevice, BlockDeviceError, SectorId};
pub use crate::slot::CacheSlot;

pub use kernel_info::storage::BLOCK_SECTOR_SIZE;

/// The contents of one sector.
pub type Block = [u8; BLOCK_SECTOR_SIZE];
