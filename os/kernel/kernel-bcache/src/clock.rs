//! Second-chance (clock) victim selection.

use crate::bitmap::SlotBitmap;
use crate::slot::CacheSlot;

/// The clock hand: a sweep cursor that persists across evictions.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct ClockHand {
    cursor: usize,
}

impl ClockHand {
    #[must_use]
    pub const fn new() -> Self {
        Self { cursor: 0 }
    }

    /// Slot index the next sweep starts at.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.cursor
    }

    /// Pick an occupied slot to evict.
    ///
    /// Visits at most `N + 1` slots starting at the cursor. An accessed slot
    /// has its bit cleared and is passed over; the first slot found with a
    /// clear bit is the victim, and the cursor moves one past it. After one
    /// full pass every bit is clear, so the `(N + 1)`-th visit always finds
    /// a victim when all slots are occupied.
    ///
    /// Free slots are skipped; callers only sweep a full table. Returns
    /// `None` if no victim was found, which means the table was empty or the
    /// invariants are broken.
    pub fn select_victim(
        &mut self,
        slots: &mut [CacheSlot],
        occupied: &SlotBitmap,
    ) -> Option<usize> {
        let n = slots.len();
        if n == 0 {
            return None;
        }
        debug_assert_eq!(n, occupied.len());

        for step in 0..=n {
            let index = (self.cursor + step) % n;
            if !occupied.test(index) {
                continue;
            }
            let slot = &mut slots[index];
            if slot.accessed {
                slot.accessed = false;
            } else {
                self.cursor = (index + 1) % n;
                return Some(index);
            }
        }
        None
    }
}
