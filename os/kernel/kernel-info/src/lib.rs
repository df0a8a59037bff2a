//! # Kernel Configuration
//!
//! Compile-time configuration shared by the storage and virtual memory
//! subsystems. Every constant here is consumed by at least one kernel crate,
//! and the layout invariants between them are checked by `const` assertions
//! so an inconsistent configuration fails the build instead of the boot.
//!
//! ## Modules
//!
//! ### Memory Layout ([`memory`])
//! The user address-space window handled by the page-fault engine:
//! * **Page Geometry**: page size and shift
//! * **User Window**: lowest resolvable user address and the user/kernel split
//! * **Stack Growth**: the slack below the stack pointer that still counts as
//!   a stack access, and the maximum size a user stack may grow to
//!
//! ### Storage ([`storage`])
//! Block-device geometry and buffer-cache sizing:
//! * **Sector Size**: the fixed transfer unit of every block device
//! * **Cache Capacity**: number of sector slots the buffer cache holds
//!
//! ## Virtual Memory Architecture
//!
//! ```text
//! Virtual Address Space Layout (user portion):
//!
//! 0x0000_0000           ┌─────────────────────────────────┐
//!                       │        Unmapped (null guard)    │
//! USER_CODE_START       ├─────────────────────────────────┤ 0x0804_8000
//!                       │   Program text, data, bss       │
//!                       │   (file-backed, demand loaded)  │
//!                       │               ...               │
//!                       │               ▲                 │
//!                       │   User stack (grows downwards)  │
//! USER_SPACE_END        ├─────────────────────────────────┤ 0xC000_0000
//!                       │          Kernel Space           │
//! 0xFFFF_FFFF           └─────────────────────────────────┘
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod memory;
pub mod storage;
