//! Process-control seam.

use crate::fault::FaultReport;

/// Exit status of a process killed by the fault handler.
pub const EXIT_FAILURE: i32 = -1;

/// What the fault handler may do to the faulting thread.
pub trait ProcessControl {
    /// Terminate the current process with `status`.
    fn terminate_current_process(&mut self, status: i32);

    /// Stop the machine after a kernel fault nothing can resolve.
    fn halt_kernel(&mut self, report: &FaultReport) -> !;
}
