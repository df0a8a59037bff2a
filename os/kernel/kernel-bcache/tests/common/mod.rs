#![allow(dead_code)]

use kernel_bcache::{BLOCK_SECTOR_SIZE, Block, BlockDevice, BlockDeviceError, SectorId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A device transfer, in the order the cache issued it.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Io {
    Read(u32),
    Write(u32),
}

#[derive(Default)]
struct Shared {
    sectors: Mutex<Vec<Block>>,
    log: Mutex<Vec<Io>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

/// In-memory block device. Clones share the same storage, so a test can
/// keep one handle while the cache owns another.
#[derive(Clone)]
pub struct RamDisk {
    shared: Arc<Shared>,
}

impl RamDisk {
    /// A disk of `sectors` sectors, sector `i` filled with byte `i as u8`.
    pub fn new(sectors: u32) -> Self {
        let data = (0..sectors)
            .map(|i| [i.to_le_bytes()[0]; BLOCK_SECTOR_SIZE])
            .collect();
        Self {
            shared: Arc::new(Shared {
                sectors: Mutex::new(data),
                ..Shared::default()
            }),
        }
    }

    pub fn sector(&self, sector: u32) -> Block {
        self.shared.sectors.lock().unwrap()[sector as usize]
    }

    pub fn log(&self) -> Vec<Io> {
        self.shared.log.lock().unwrap().clone()
    }

    pub fn clear_log(&self) {
        self.shared.log.lock().unwrap().clear();
    }

    pub fn writes(&self) -> usize {
        self.log().iter().filter(|io| matches!(io, Io::Write(_))).count()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.shared.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.shared.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl BlockDevice for RamDisk {
    fn block_count(&self) -> u32 {
        u32::try_from(self.shared.sectors.lock().unwrap().len()).unwrap()
    }

    fn read_block(&mut self, sector: SectorId, buf: &mut Block) -> Result<(), BlockDeviceError> {
        if self.shared.fail_reads.load(Ordering::SeqCst) {
            return Err(BlockDeviceError::Io(sector));
        }
        self.shared.log.lock().unwrap().push(Io::Read(sector.as_u32()));
        *buf = self.shared.sectors.lock().unwrap()[sector.as_u32() as usize];
        Ok(())
    }

    fn write_block(&mut self, sector: SectorId, buf: &Block) -> Result<(), BlockDeviceError> {
        if self.shared.fail_writes.load(Ordering::SeqCst) {
            return Err(BlockDeviceError::Io(sector));
        }
        self.shared.log.lock().unwrap().push(Io::Write(sector.as_u32()));
        self.shared.sectors.lock().unwrap()[sector.as_u32() as usize] = *buf;
        Ok(())
    }
}

pub fn block(byte: u8) -> Block {
    [byte; BLOCK_SECTOR_SIZE]
}

pub fn s(sector: u32) -> SectorId {
    SectorId::new(sector)
}
