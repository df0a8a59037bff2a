//! # Page-Fault Resolution
//!
//! [`PagingEngine`] classifies a fault and either grows the stack, loads the
//! missing page into a fresh frame, or gives up on the faulting process.
//!
//! ```text
//!  fault ─▶ in user range? ──no──────────────────────────▶ unresolvable
//!              │yes
//!              ▼
//!          page known? ──no──▶ user ctx and stack access? ──no──▶ unresolvable
//!              │yes                        │yes
//!              ▼                           ▼
//!     write to read-only? ──yes──▶ kill   grow stack (limit) ──▶ resume
//!              │no
//!              ▼
//!           swap in ──ok──▶ resume
//!              └──err─────▶ kill
//! ```
//!
//! ## Locking
//!
//! The address space stays locked for the whole resolution, which makes a
//! swap-in atomic per page. The frame pool, swap device and file system are
//! each behind their own lock and are never held together; file and swap
//! contents are staged in a scratch page before being copied into the
//! frame.

use crate::address_space::{AddressSpace, AddressSpaceError};
use crate::addresses::{VirtualAddress, VirtualPage};
use crate::arena::PageId;
use crate::backing::{FileReader, SwapDevice, SwapError, SwapSlot};
use crate::fault::FaultContext;
use crate::frame::{FrameAlloc, FrameHandle, FrameOwner, PageBuf, PhysMapper};
use crate::mapper::{MapError, PageTableMapper};
use crate::page::{FileRegion, PageState};
use crate::process::{EXIT_FAILURE, ProcessControl};
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use kernel_info::memory::PAGE_BYTES;
use kernel_sync::TicketMutex;
use log::{debug, error, trace, warn};

/// Address spaces are shared between the fault handler and the rest of the
/// kernel behind this lock.
pub type SharedAddressSpace<M> = TicketMutex<AddressSpace<M>>;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum FaultError {
    #[error("{0} is outside user space")]
    OutsideUserRange(VirtualAddress),
    #[error("no page covers {0}")]
    NotMapped(VirtualAddress),
    #[error("stack growth to {0} exceeds the stack limit")]
    StackLimitExceeded(VirtualAddress),
    #[error("write to read-only {0}")]
    ProtectionViolation(VirtualPage),
    #[error("no free frame for {0}")]
    OutOfFrames(VirtualPage),
    #[error("failed to map {page}: {source}")]
    Map {
        page: VirtualPage,
        #[source]
        source: MapError,
    },
    #[error("short read loading {page}: {read} of {expected} bytes")]
    ShortRead {
        page: VirtualPage,
        expected: usize,
        read: usize,
    },
    #[error("failed to load {page} from swap: {source}")]
    Swap {
        page: VirtualPage,
        #[source]
        source: SwapError,
    },
    #[error("{0:?} no longer exists")]
    StalePage(PageId),
    #[error(transparent)]
    AddressSpace(#[from] AddressSpaceError),
}

/// How the fault handler reacts to a [`FaultError`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Disposition {
    /// Terminate the faulting process.
    Kill,
    /// Nothing could be resolved: halt in kernel context, otherwise rewrite
    /// the registers to the error sentinel and terminate.
    Unresolvable,
}

impl FaultError {
    #[must_use]
    pub const fn disposition(&self) -> Disposition {
        match self {
            Self::ProtectionViolation(_)
            | Self::OutOfFrames(_)
            | Self::Map { .. }
            | Self::ShortRead { .. }
            | Self::Swap { .. } => Disposition::Kill,
            Self::OutsideUserRange(_)
            | Self::NotMapped(_)
            | Self::StackLimitExceeded(_)
            | Self::StalePage(_)
            | Self::AddressSpace(_) => Disposition::Unresolvable,
        }
    }
}

/// Where a swapped-in page's contents came from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PageSource {
    File,
    ZeroFill,
    Swap(SwapSlot),
    /// The page was resident already; nothing was loaded.
    AlreadyResident,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SwapIn {
    pub page: VirtualPage,
    pub frame: FrameHandle,
    pub source: PageSource,
}

/// A fault that was handled without killing anyone.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Resolution {
    StackGrown { pages: u64, bound: VirtualPage },
    Loaded(SwapIn),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FaultOutcome {
    /// Resume the faulting instruction.
    Resolved(Resolution),
    /// The current process was told to exit with [`EXIT_FAILURE`].
    Terminated(FaultError),
}

/// Snapshot of the fault counters.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct FaultStats {
    pub faults: u64,
    pub stack_growths: u64,
    pub file_loads: u64,
    pub zero_fills: u64,
    pub swap_reads: u64,
    pub terminations: u64,
}

impl fmt::Display for FaultStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Exception: {} page faults ({} stack growths, {} file loads, {} zero fills, {} swap reads, {} terminations)",
            self.faults,
            self.stack_growths,
            self.file_loads,
            self.zero_fills,
            self.swap_reads,
            self.terminations
        )
    }
}

#[derive(Default)]
struct FaultCounters {
    faults: AtomicU64,
    stack_growths: AtomicU64,
    file_loads: AtomicU64,
    zero_fills: AtomicU64,
    swap_reads: AtomicU64,
    terminations: AtomicU64,
}

impl FaultCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> FaultStats {
        FaultStats {
            faults: self.faults.load(Ordering::Relaxed),
            stack_growths: self.stack_growths.load(Ordering::Relaxed),
            file_loads: self.file_loads.load(Ordering::Relaxed),
            zero_fills: self.zero_fills.load(Ordering::Relaxed),
            swap_reads: self.swap_reads.load(Ordering::Relaxed),
            terminations: self.terminations.load(Ordering::Relaxed),
        }
    }
}

/// The page-fault handler and the pools it draws on.
pub struct PagingEngine<F, S, R> {
    frames: TicketMutex<F>,
    swap: TicketMutex<S>,
    files: TicketMutex<R>,
    counters: FaultCounters,
}

impl<F, S, R> PagingEngine<F, S, R>
where
    F: FrameAlloc + PhysMapper,
    S: SwapDevice,
    R: FileReader,
{
    #[must_use]
    pub fn new(frames: F, swap: S, files: R) -> Self {
        Self {
            frames: TicketMutex::new(frames),
            swap: TicketMutex::new(swap),
            files: TicketMutex::new(files),
            counters: FaultCounters::default(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn frames(&self) -> &TicketMutex<F> {
        &self.frames
    }

    #[inline]
    #[must_use]
    pub const fn swap(&self) -> &TicketMutex<S> {
        &self.swap
    }

    #[must_use]
    pub fn stats(&self) -> FaultStats {
        self.counters.snapshot()
    }

    /// Entry point from the trap handler.
    ///
    /// Resolves the fault against `space`. If that fails the process is
    /// terminated through `process`; an unresolvable fault in kernel context
    /// halts the machine instead and this function does not return.
    pub fn handle_page_fault<M, P>(
        &self,
        space: &SharedAddressSpace<M>,
        process: &mut P,
        ctx: &mut FaultContext,
    ) -> FaultOutcome
    where
        M: PageTableMapper,
        P: ProcessControl + ?Sized,
    {
        FaultCounters::bump(&self.counters.faults);

        let resolved = space.with_lock(|space| self.resolve(space, ctx));
        match resolved {
            Ok(resolution) => {
                trace!("fault at {} resolved: {resolution:?}", ctx.address);
                FaultOutcome::Resolved(resolution)
            }
            Err(err) => self.give_up(process, ctx, err),
        }
    }

    /// Classify `ctx` and act on it, without touching the process.
    ///
    /// # Errors
    /// Any [`FaultError`]; see [`FaultError::disposition`] for what the
    /// handler does with it.
    pub fn resolve<M: PageTableMapper>(
        &self,
        space: &mut AddressSpace<M>,
        ctx: &FaultContext,
    ) -> Result<Resolution, FaultError> {
        let addr = ctx.address;
        if !space.layout().contains(addr) {
            return Err(FaultError::OutsideUserRange(addr));
        }

        if let Some(id) = space.lookup(addr) {
            let page = space.page(id).ok_or(FaultError::StalePage(id))?;
            if ctx.is_write() && !page.writable() {
                return Err(FaultError::ProtectionViolation(page.vaddr()));
            }
            return self.swap_in(space, id).map(Resolution::Loaded);
        }

        if !ctx.is_user() || !space.layout().is_stack_access(addr, ctx.stack_pointer()) {
            return Err(FaultError::NotMapped(addr));
        }

        let pages = space.grow_stack_to(addr.page()).map_err(|err| match err {
            AddressSpaceError::StackLimitExceeded(_) => FaultError::StackLimitExceeded(addr),
            other => FaultError::AddressSpace(other),
        })?;
        FaultCounters::bump(&self.counters.stack_growths);
        debug!(
            "stack grown by {pages} pages for {addr}, boundary {}",
            space.stack_bound()
        );
        Ok(Resolution::StackGrown {
            pages,
            bound: space.stack_bound(),
        })
    }

    /// Bring page `id` into a fresh frame.
    ///
    /// The mapping is installed first and the contents loaded second; if
    /// loading fails the mapping is removed and the frame freed, leaving the
    /// page exactly as it was. A page that is already resident is left
    /// alone.
    ///
    /// # Errors
    /// [`FaultError::OutOfFrames`], [`FaultError::Map`],
    /// [`FaultError::ShortRead`], [`FaultError::Swap`], or
    /// [`FaultError::StalePage`] for an id that no longer resolves.
    pub fn swap_in<M: PageTableMapper>(
        &self,
        space: &mut AddressSpace<M>,
        id: PageId,
    ) -> Result<SwapIn, FaultError> {
        let page = *space.page(id).ok_or(FaultError::StalePage(id))?;
        let vaddr = page.vaddr();

        if let Some(frame) = page.frame() {
            return Ok(SwapIn {
                page: vaddr,
                frame,
                source: PageSource::AlreadyResident,
            });
        }
        let source = match page.swap_slot() {
            Some(slot) => PageSource::Swap(slot),
            None if page.file().is_some() => PageSource::File,
            None => PageSource::ZeroFill,
        };

        let frame = self
            .frames
            .lock()
            .alloc_frame()
            .ok_or(FaultError::OutOfFrames(vaddr))?;

        if let Err(source) = space.mapper_mut().install(vaddr, frame, page.writable()) {
            self.frames.lock().free_frame(frame);
            return Err(FaultError::Map {
                page: vaddr,
                source,
            });
        }

        if let Err(err) = self.load(vaddr, source, page.file(), page.size(), frame) {
            space.mapper_mut().uninstall(vaddr);
            self.frames.lock().free_frame(frame);
            warn!("loading {vaddr} into {frame} failed: {err}");
            return Err(err);
        }

        self.frames.lock().bind_owner(
            frame,
            FrameOwner {
                space: space.id(),
                page: id,
            },
        );
        if let Some(record) = space.page_mut(id) {
            record.set_state(PageState::Framed(frame));
        }

        let counter = match source {
            PageSource::File => &self.counters.file_loads,
            PageSource::Swap(_) => &self.counters.swap_reads,
            PageSource::ZeroFill | PageSource::AlreadyResident => &self.counters.zero_fills,
        };
        FaultCounters::bump(counter);
        trace!("{vaddr} now in {frame} ({source:?})");

        Ok(SwapIn {
            page: vaddr,
            frame,
            source,
        })
    }

    /// Free every frame of `space` and return the swap slots it still held.
    pub fn teardown<M: PageTableMapper>(&self, space: AddressSpace<M>) -> Vec<SwapSlot> {
        let mut frames = self.frames.lock();
        space.teardown(&mut *frames)
    }

    /// Stage the page contents and copy them into `frame`. Bytes past the
    /// valid size stay zero.
    fn load(
        &self,
        vaddr: VirtualPage,
        source: PageSource,
        region: Option<FileRegion>,
        size: usize,
        frame: FrameHandle,
    ) -> Result<(), FaultError> {
        let mut scratch: Box<PageBuf> = Box::new([0; PAGE_BYTES]);

        match (source, region) {
            (PageSource::File, Some(region)) => {
                let expected = size.min(PAGE_BYTES);
                let read = self.files.lock().read_at(
                    region.file,
                    &mut scratch[..expected],
                    region.offset,
                );
                if read != expected {
                    return Err(FaultError::ShortRead {
                        page: vaddr,
                        expected,
                        read,
                    });
                }
            }
            (PageSource::Swap(slot), _) => {
                self.swap
                    .lock()
                    .retrieve(slot, &mut scratch)
                    .map_err(|source| FaultError::Swap {
                        page: vaddr,
                        source,
                    })?;
            }
            _ => {}
        }

        self.frames.lock().frame_mut(frame).copy_from_slice(&scratch[..]);
        Ok(())
    }

    fn give_up<P: ProcessControl + ?Sized>(
        &self,
        process: &mut P,
        ctx: &mut FaultContext,
        err: FaultError,
    ) -> FaultOutcome {
        let report = ctx.report();
        match err.disposition() {
            Disposition::Kill => {
                warn!("{report} {err}; terminating process");
            }
            Disposition::Unresolvable => {
                error!("{report} {}", ctx.error.explain());
                if !ctx.is_user() {
                    error!("Kernel bug - unexpected page fault in kernel: {err}");
                    process.halt_kernel(&report);
                }
                ctx.registers.set_error_sentinel();
                warn!("{err}; terminating process");
            }
        }

        FaultCounters::bump(&self.counters.terminations);
        process.terminate_current_process(EXIT_FAILURE);
        FaultOutcome::Terminated(err)
    }
}
