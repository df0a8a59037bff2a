//! # Storage Geometry

/// Size of a block device sector in bytes.
pub const BLOCK_SECTOR_SIZE: usize = 512;

/// Number of sector slots held by the buffer cache.
pub const BUFFER_CACHE_SLOTS: usize = 64;

const _: () = {
    assert!(BLOCK_SECTOR_SIZE.is_power_of_two());
    assert!(BUFFER_CACHE_SLOTS > 0);
    assert!(crate::memory::PAGE_BYTES.is_multiple_of(BLOCK_SECTOR_SIZE));
};
