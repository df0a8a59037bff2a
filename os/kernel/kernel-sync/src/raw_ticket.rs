use crate::{RawLock, RawUnlock};
use core::hint::spin_loop;
use core::sync::atomic::{AtomicUsize, Ordering};

/// FIFO ticket lock.
///
/// Each waiter draws a ticket from `next` and waits until `owner` reaches it,
/// so the lock is handed over in arrival order.
pub struct RawTicket {
    next: AtomicUsize,
    owner: AtomicUsize,
}

impl Default for RawTicket {
    fn default() -> Self {
        Self::new()
    }
}

impl RawTicket {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicUsize::new(0),
            owner: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn lock(&self) {
        let ticket = self.next.fetch_add(1, Ordering::Relaxed);
        while self.owner.load(Ordering::Acquire) != ticket {
            spin_loop();
        }
    }

    #[inline]
    pub fn try_lock(&self) -> bool {
        let owner = self.owner.load(Ordering::Relaxed);
        // Only claim a ticket if it would be served immediately.
        self.next
            .compare_exchange(
                owner,
                owner.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    /// # Safety
    /// The caller must hold the lock.
    #[inline]
    pub unsafe fn unlock(&self) {
        let served = self.owner.load(Ordering::Relaxed);
        self.owner.store(served.wrapping_add(1), Ordering::Release);
    }

    /// Number of threads holding or waiting for the lock.
    #[inline]
    pub fn queue_len(&self) -> usize {
        let next = self.next.load(Ordering::Relaxed);
        let owner = self.owner.load(Ordering::Relaxed);
        next.wrapping_sub(owner)
    }
}

impl RawLock for RawTicket {
    fn raw_lock(&self) {
        self.lock();
    }

    fn raw_try_lock(&self) -> bool {
        self.try_lock()
    }

    fn raw_is_locked(&self) -> bool {
        self.queue_len() != 0
    }
}

impl RawUnlock for RawTicket {
    unsafe fn raw_unlock(&self) {
        unsafe { self.unlock() }
    }
}
