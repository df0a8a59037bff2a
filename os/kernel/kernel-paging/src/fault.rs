//! # Page-Fault Context
//!
//! Everything the fault handler learns from the trap: the faulting address,
//! the hardware error code and the saved user registers it may rewrite.

use crate::addresses::VirtualAddress;
use bitfield_struct::bitfield;
use core::fmt;

/// Page-fault error code layout (x86).
///
/// Each bit describes the condition that caused the page fault.
/// Reference: Intel SDM Vol. 3A, §6.15.1 "Page-Fault Exception (#PF)".
#[bitfield(u64)]
#[derive(PartialEq, Eq)]
pub struct PageFaultError {
    /// 0 = non-present page.
    /// 1 = protection violation (page present but access disallowed).
    pub present: bool, // bit 0

    /// 0 = read or execute.
    /// 1 = write access.
    pub write: bool, // bit 1

    /// 0 = supervisor.
    /// 1 = user mode.
    pub user: bool, // bit 2

    /// 1 = caused by reserved bit set in a paging structure.
    pub reserved_bit: bool, // bit 3

    /// 1 = instruction fetch (execute access).
    pub instruction_fetch: bool, // bit 4

    /// 1 = protection-key violation.
    pub protection_key: bool, // bit 5

    /// 1 = shadow stack access.
    pub shadow_stack: bool, // bit 6

    #[bits(57)]
    __: u64,
}

impl PageFaultError {
    /// A human-readable reading of the error code, for diagnostics.
    #[must_use]
    pub const fn explain(&self) -> &'static str {
        if !self.present() {
            "Non-present page (page not loaded or swapped out)"
        } else if self.instruction_fetch() {
            if self.user() {
                "User-mode instruction fetch on protected page"
            } else {
                "Kernel instruction fetch on protected page"
            }
        } else if self.write() {
            "Write access to protected page"
        } else {
            "Read access to protected page"
        }
    }
}

/// The subset of the interrupted thread's registers the fault path touches.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct SavedRegisters {
    /// Address execution resumes at.
    pub instruction_pointer: u64,
    /// Result / return-value register.
    pub result: u64,
    /// User stack pointer at the time of the fault.
    pub stack_pointer: u64,
}

impl SavedRegisters {
    /// Value placed in the result register on an unresolvable fault; reads
    /// as `-1` at the register's width.
    pub const ERROR_SENTINEL: u64 = u64::MAX;

    /// Rewrites the registers so the interrupted code observes a failure.
    ///
    /// The kernel's user-memory accessors put their recovery address in the
    /// result register before touching user memory. Resuming there with
    /// [`Self::ERROR_SENTINEL`] as the result makes the access "return" an
    /// error instead of faulting again.
    pub const fn set_error_sentinel(&mut self) {
        self.instruction_pointer = self.result;
        self.result = Self::ERROR_SENTINEL;
    }
}

/// What the trap handed to the fault handler.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FaultContext {
    pub address: VirtualAddress,
    pub error: PageFaultError,
    pub registers: SavedRegisters,
}

impl FaultContext {
    #[must_use]
    pub const fn new(
        address: VirtualAddress,
        error: PageFaultError,
        registers: SavedRegisters,
    ) -> Self {
        Self {
            address,
            error,
            registers,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_write(&self) -> bool {
        self.error.write()
    }

    #[inline]
    #[must_use]
    pub const fn is_user(&self) -> bool {
        self.error.user()
    }

    /// `true` for rights violations, `false` for non-present pages.
    #[inline]
    #[must_use]
    pub const fn is_present(&self) -> bool {
        self.error.present()
    }

    #[inline]
    #[must_use]
    pub const fn stack_pointer(&self) -> VirtualAddress {
        VirtualAddress::new(self.registers.stack_pointer)
    }

    /// Diagnostic summary of this fault.
    #[must_use]
    pub const fn report(&self) -> FaultReport {
        FaultReport {
            address: self.address,
            present: self.is_present(),
            write: self.is_write(),
            user: self.is_user(),
        }
    }
}

/// One-line diagnostic for a fault that could not be resolved.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FaultReport {
    pub address: VirtualAddress,
    pub present: bool,
    pub write: bool,
    pub user: bool,
}

impl fmt::Display for FaultReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Page fault at {}: {} error {} page in {} context.",
            self.address,
            if self.present {
                "rights violation"
            } else {
                "not present"
            },
            if self.write { "writing" } else { "reading" },
            if self.user { "user" } else { "kernel" },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_bits() {
        let err = PageFaultError::from_bits(0b110);
        assert!(!err.present());
        assert!(err.write());
        assert!(err.user());
        assert_eq!(err.explain(), "Non-present page (page not loaded or swapped out)");

        let err = PageFaultError::new().with_present(true).with_write(true);
        assert_eq!(err.into_bits(), 0b011);
        assert_eq!(err.explain(), "Write access to protected page");
    }

    #[test]
    fn sentinel_moves_result_into_ip() {
        let mut regs = SavedRegisters {
            instruction_pointer: 0xC010_0000,
            result: 0xC010_0042,
            stack_pointer: 0xBFFF_FF00,
        };
        regs.set_error_sentinel();
        assert_eq!(regs.instruction_pointer, 0xC010_0042);
        assert_eq!(regs.result, u64::MAX);
        assert_eq!(regs.stack_pointer, 0xBFFF_FF00);
    }

    #[test]
    fn report_wording() {
        let ctx = FaultContext::new(
            VirtualAddress::new(0x0804_8000),
            PageFaultError::new().with_present(true).with_write(true).with_user(true),
            SavedRegisters::default(),
        );
        assert_eq!(
            ctx.report().to_string(),
            "Page fault at 0x08048000: rights violation error writing page in user context."
        );

        let ctx = FaultContext::new(
            VirtualAddress::new(0x10),
            PageFaultError::new(),
            SavedRegisters::default(),
        );
        assert_eq!(
            ctx.report().to_string(),
            "Page fault at 0x00000010: not present error reading page in kernel context."
        );
    }
}
