//! Runtime view of the user address-space layout.

use crate::addresses::{VirtualAddress, VirtualPage};
use kernel_info::memory::{
    STACK_HEURISTIC_SLACK, USER_CODE_START, USER_SPACE_END, USER_STACK_FLOOR,
};

/// Bounds the fault handler uses to classify addresses.
///
/// [`Default`] takes the compile-time layout from [`kernel_info::memory`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct UserLayout {
    /// Lowest resolvable user address.
    pub user_base: VirtualAddress,
    /// End of user space (exclusive).
    pub user_end: VirtualAddress,
    /// Bytes below the stack pointer that still count as a stack access.
    pub stack_slack: u64,
    /// The stack may not grow below this address.
    pub stack_floor: VirtualAddress,
}

impl Default for UserLayout {
    fn default() -> Self {
        Self {
            user_base: VirtualAddress::new(USER_CODE_START),
            user_end: VirtualAddress::new(USER_SPACE_END),
            stack_slack: STACK_HEURISTIC_SLACK,
            stack_floor: VirtualAddress::new(USER_STACK_FLOOR),
        }
    }
}

impl UserLayout {
    /// Whether `addr` is inside the resolvable user window.
    #[inline]
    #[must_use]
    pub fn contains(&self, addr: VirtualAddress) -> bool {
        addr >= self.user_base && addr < self.user_end
    }

    /// Whether the whole of `page` is inside the resolvable user window.
    #[inline]
    #[must_use]
    pub fn contains_page(&self, page: VirtualPage) -> bool {
        self.contains(page.base())
    }

    /// Whether an access at `addr` with stack pointer `sp` looks like a
    /// stack access: at or above `sp - stack_slack`. A stack pointer closer
    /// than `stack_slack` to address zero never qualifies.
    #[inline]
    #[must_use]
    pub fn is_stack_access(&self, addr: VirtualAddress, sp: VirtualAddress) -> bool {
        sp.checked_sub(self.stack_slack)
            .is_some_and(|lowest| addr >= lowest)
    }

    /// The first page above user space; the stack boundary of an address
    /// space without stack pages.
    #[inline]
    #[must_use]
    pub const fn stack_top(&self) -> VirtualPage {
        self.user_end.page()
    }

    /// Lowest page the stack may grow to.
    #[inline]
    #[must_use]
    pub const fn stack_floor_page(&self) -> VirtualPage {
        self.stack_floor.page()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slack_boundary_is_inclusive() {
        let layout = UserLayout::default();
        let sp = VirtualAddress::new(0xBFFF_F000);
        let lowest = 0xBFFF_F000 - STACK_HEURISTIC_SLACK;
        assert!(layout.is_stack_access(VirtualAddress::new(lowest), sp));
        assert!(!layout.is_stack_access(VirtualAddress::new(lowest - 1), sp));
        assert!(layout.is_stack_access(VirtualAddress::new(0xBFFF_FFFF), sp));
    }

    #[test]
    fn stack_pointer_near_zero_is_never_a_stack_access() {
        let layout = UserLayout::default();
        let sp = VirtualAddress::new(STACK_HEURISTIC_SLACK - 1);
        assert!(!layout.is_stack_access(VirtualAddress::new(0xBFFF_F000), sp));
        assert!(!layout.is_stack_access(sp, sp));

        let sp = VirtualAddress::new(STACK_HEURISTIC_SLACK);
        assert!(layout.is_stack_access(VirtualAddress::new(0), sp));
    }
}
