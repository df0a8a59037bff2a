//! # Demand Paging
//!
//! The user half of virtual memory: supplemental page records per address
//! space, lazy loading of executable segments, stack growth, and the page
//! fault handler that ties them together.
//!
//! ## Pieces
//!
//! - [`AddressSpace`]: page records of one process, keyed by virtual page,
//!   plus the page table seam ([`PageTableMapper`]) and stack boundary.
//! - [`PagingEngine`]: the fault handler. Owns the frame pool
//!   ([`FrameAlloc`] + [`PhysMapper`]), the swap device ([`SwapDevice`]) and
//!   the file system ([`FileReader`]) behind kernel-sync locks.
//! - [`FaultContext`]: faulting address, hardware error code, and the
//!   saved registers the handler may rewrite.
//! - [`ProcessControl`]: how the handler kills a process or halts.
//!
//! ## Example
//!
//! ```ignore
//! let engine = PagingEngine::new(frames, swap, files);
//! let space = TicketMutex::new(AddressSpace::new(pid, page_table, UserLayout::default()));
//! space.lock().register_file_segment(text_base, exe, 0, text_len, 0, false)?;
//!
//! // from the #PF trap:
//! match engine.handle_page_fault(&space, &mut process, &mut ctx) {
//!     FaultOutcome::Resolved(_) => { /* return from the trap */ }
//!     FaultOutcome::Terminated(err) => { /* process is exiting */ }
//! }
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

pub mod address_space;
pub mod addresses;
pub mod arena;
pub mod backing;
pub mod engine;
pub mod fault;
pub mod frame;
pub mod layout;
pub mod mapper;
pub mod page;
pub mod process;

pub use address_space::{AddressSpace, AddressSpaceError, AddressSpaceId, Eviction};
pub use addresses::{VirtualAddress, VirtualPage};
pub use arena::{PageArena, PageId};
pub use backing::{FileHandle, FileReader, SwapDevice, SwapError, SwapSlot};
pub use engine::{
    Disposition, FaultError, FaultOutcome, FaultStats, PageSource, PagingEngine, Resolution,
    SharedAddressSpace, SwapIn,
};
pub use fault::{FaultContext, FaultReport, PageFaultError, SavedRegisters};
pub use frame::{FrameAlloc, FrameHandle, FrameOwner, PageBuf, PhysMapper};
pub use layout::UserLayout;
pub use mapper::{MapError, PageTableMapper};
pub use page::{FileRegion, Page, PageLocation, PageOrigin, PageState};
pub use process::{EXIT_FAILURE, ProcessControl};
