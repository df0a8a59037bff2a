#![allow(dead_code)]

use kernel_paging::{
    AddressSpace, AddressSpaceId, FaultContext, FaultReport, FileHandle, FileReader, FrameAlloc,
    FrameHandle, FrameOwner, MapError, PageBuf, PageFaultError, PageTableMapper, PagingEngine,
    PhysMapper, ProcessControl, SavedRegisters, SwapDevice, SwapError, SwapSlot, UserLayout,
    VirtualAddress, VirtualPage,
};
use kernel_sync::TicketMutex;
use std::collections::{BTreeMap, HashMap};

pub const PAGE: u64 = 4096;
pub const STACK_TOP: u64 = 0xC000_0000;
pub const TEXT_BASE: u64 = 0x0804_8000;

pub type Engine = PagingEngine<MockFrames, MockSwap, MockFiles>;
pub type Space = AddressSpace<MockPageTable>;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn va(addr: u64) -> VirtualAddress {
    VirtualAddress::new(addr)
}

pub fn vp(addr: u64) -> VirtualPage {
    VirtualAddress::new(addr).page()
}

/// A fixed pool of frames with their own backing bytes.
pub struct MockFrames {
    memory: Vec<Box<PageBuf>>,
    free: Vec<FrameHandle>,
    pub owners: HashMap<FrameHandle, FrameOwner>,
}

impl MockFrames {
    pub fn new(count: u32) -> Self {
        Self {
            memory: (0..count).map(|_| Box::new([0xCC; 4096])).collect(),
            free: (0..count).rev().map(FrameHandle::new).collect(),
            owners: HashMap::new(),
        }
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn bytes(&self, frame: FrameHandle) -> &PageBuf {
        &self.memory[frame.number() as usize]
    }
}

impl FrameAlloc for MockFrames {
    fn alloc_frame(&mut self) -> Option<FrameHandle> {
        self.free.pop()
    }

    fn free_frame(&mut self, frame: FrameHandle) {
        assert!(!self.free.contains(&frame), "double free of {frame}");
        self.owners.remove(&frame);
        // Poison so a reused frame must be fully reloaded.
        self.memory[frame.number() as usize].fill(0xCC);
        self.free.push(frame);
    }

    fn bind_owner(&mut self, frame: FrameHandle, owner: FrameOwner) {
        self.owners.insert(frame, owner);
    }
}

impl PhysMapper for MockFrames {
    fn frame_mut(&mut self, frame: FrameHandle) -> &mut PageBuf {
        &mut self.memory[frame.number() as usize]
    }
}

#[derive(Default)]
pub struct MockSwap {
    pub slots: HashMap<SwapSlot, Box<PageBuf>>,
    pub failing: bool,
    pub reads: usize,
}

impl MockSwap {
    pub fn store(&mut self, slot: SwapSlot, data: &PageBuf) {
        self.slots.insert(slot, Box::new(*data));
    }
}

impl SwapDevice for MockSwap {
    fn retrieve(&mut self, slot: SwapSlot, dest: &mut PageBuf) -> Result<(), SwapError> {
        if self.failing {
            return Err(SwapError::Io(slot));
        }
        let data = self.slots.get(&slot).ok_or(SwapError::InvalidSlot(slot))?;
        dest.copy_from_slice(&data[..]);
        self.reads += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct MockFiles {
    pub files: HashMap<FileHandle, Vec<u8>>,
}

impl MockFiles {
    pub fn with_file(mut self, file: FileHandle, contents: Vec<u8>) -> Self {
        self.files.insert(file, contents);
        self
    }
}

impl FileReader for MockFiles {
    fn read_at(&mut self, file: FileHandle, buf: &mut [u8], offset: u64) -> usize {
        let Some(contents) = self.files.get(&file) else {
            return 0;
        };
        let start = (offset as usize).min(contents.len());
        let n = buf.len().min(contents.len() - start);
        buf[..n].copy_from_slice(&contents[start..start + n]);
        n
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pte {
    pub frame: FrameHandle,
    pub writable: bool,
    pub dirty: bool,
}

#[derive(Default)]
pub struct MockPageTable {
    pub entries: BTreeMap<VirtualPage, Pte>,
    pub refuse_installs: bool,
}

impl MockPageTable {
    pub fn mark_dirty(&mut self, page: VirtualPage) {
        if let Some(pte) = self.entries.get_mut(&page) {
            pte.dirty = true;
        }
    }
}

impl PageTableMapper for MockPageTable {
    fn install(
        &mut self,
        page: VirtualPage,
        frame: FrameHandle,
        writable: bool,
    ) -> Result<(), MapError> {
        if self.refuse_installs {
            return Err(MapError::OutOfMemory);
        }
        if self.entries.contains_key(&page) {
            return Err(MapError::AlreadyMapped(page));
        }
        self.entries.insert(
            page,
            Pte {
                frame,
                writable,
                dirty: false,
            },
        );
        Ok(())
    }

    fn uninstall(&mut self, page: VirtualPage) -> Option<FrameHandle> {
        self.entries.remove(&page).map(|pte| pte.frame)
    }

    fn translate(&self, page: VirtualPage) -> Option<FrameHandle> {
        self.entries.get(&page).map(|pte| pte.frame)
    }

    fn is_dirty(&self, page: VirtualPage) -> bool {
        self.entries.get(&page).is_some_and(|pte| pte.dirty)
    }
}

/// Records terminations; halting panics so tests can observe it.
#[derive(Default)]
pub struct RecordingProcess {
    pub exit_status: Option<i32>,
}

impl ProcessControl for RecordingProcess {
    fn terminate_current_process(&mut self, status: i32) {
        assert!(self.exit_status.is_none(), "process terminated twice");
        self.exit_status = Some(status);
    }

    fn halt_kernel(&mut self, report: &FaultReport) -> ! {
        panic!("kernel halted: {report}");
    }
}

pub fn engine(frames: u32) -> Engine {
    PagingEngine::new(MockFrames::new(frames), MockSwap::default(), MockFiles::default())
}

pub fn engine_with_files(frames: u32, files: MockFiles) -> Engine {
    PagingEngine::new(MockFrames::new(frames), MockSwap::default(), files)
}

pub fn space() -> TicketMutex<Space> {
    TicketMutex::new(AddressSpace::new(
        AddressSpaceId::new(1),
        MockPageTable::default(),
        UserLayout::default(),
    ))
}

pub fn user_fault(addr: u64, write: bool, sp: u64) -> FaultContext {
    FaultContext::new(
        va(addr),
        PageFaultError::new().with_user(true).with_write(write),
        SavedRegisters {
            instruction_pointer: TEXT_BASE + 0x10,
            result: 0,
            stack_pointer: sp,
        },
    )
}

pub fn kernel_fault(addr: u64, write: bool, recovery: u64) -> FaultContext {
    FaultContext::new(
        va(addr),
        PageFaultError::new().with_write(write),
        SavedRegisters {
            instruction_pointer: 0xC010_0000,
            result: recovery,
            stack_pointer: 0xC020_0000,
        },
    )
}

/// Deterministic file contents: byte `i` is `(i % 251) as u8`.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
