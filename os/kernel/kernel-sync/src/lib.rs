//! # Kernel synchronization primitives
//!
//! A single generic [`Mutex`] parameterized over a raw lock strategy:
//!
//! * [`RawSpin`]: test-and-test-and-set; cheapest when contention is rare.
//! * [`RawTicket`]: FIFO ticket lock; waiters are served in arrival order,
//!   which keeps long critical sections (such as buffer-cache device I/O)
//!   from starving any one thread.
//!
//! Guards release on drop, including during unwinding.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod mutex;
mod raw_spin;
mod raw_ticket;

pub use mutex::{Mutex, MutexGuard};
pub use raw_spin::RawSpin;
pub use raw_ticket::RawTicket;

pub type SpinMutex<T> = Mutex<T, RawSpin>;
pub type TicketMutex<T> = Mutex<T, RawTicket>;

impl<T> SpinMutex<T> {
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawSpin::new(), value)
    }
}

impl<T> TicketMutex<T> {
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawTicket::new(), value)
    }
}

pub trait RawLock {
    fn raw_lock(&self);
    fn raw_try_lock(&self) -> bool;
    /// Snapshot of the lock state; stale as soon as it is returned.
    fn raw_is_locked(&self) -> bool;
}

pub trait RawUnlock {
    /// # Safety
    /// The caller must currently hold the lock.
    unsafe fn raw_unlock(&self);
}
