//! # Kernel synchronization primitives
//!
//! Spin locks for state shared between cores, and the interrupt-masking
//! seam ([`InterruptMask`]) for state shared with interrupt handlers. A
//! handler that spins on a lock its own core already holds never returns,
//! so such state is always taken with [`Mutex::lock_masked`].

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

pub mod irq;
mod mutex;
mod once;

pub use irq::{CpuInterrupts, InterruptMask, IrqGuard, IrqMutex};
pub use mutex::{Mutex, MutexGuard, RawLock, RawSpin};
pub use once::SyncOnceCell;

/// A [`Mutex`] over a test-and-set spin lock.
pub type SpinMutex<T> = Mutex<T, RawSpin>;

impl<T> SpinMutex<T> {
    pub const fn new(value: T) -> Self {
        Self::from_raw(RawSpin::new(), value)
    }
}
