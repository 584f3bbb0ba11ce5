//! # Local Interrupt Flag Control
//!
//! State shared between normal kernel code and an interrupt handler on the
//! same core cannot be protected by a spin lock alone: if the handler
//! interrupts a holder and then spins on the same lock, the core deadlocks.
//! Such state is touched only with `RFLAGS.IF` cleared.
//!
//! ## Building Blocks
//!
//! | Item                     | Role                                            |
//! |--------------------------|-------------------------------------------------|
//! | [`InterruptMask`]        | save/disable/restore seam                       |
//! | [`CpuInterrupts`]        | the real flag (`pushfq`, `cli`, `sti`)          |
//! | [`IrqGuard`]             | masked section, restored on drop                |
//! | [`Mutex::lock_masked`]   | masked section around a locked [`Mutex`]        |
//! | [`IrqMutex`]             | guard returned by `lock_masked`                 |
//!
//! ## Nesting
//!
//! [`InterruptMask::save_and_disable`] reports whether interrupts were on.
//! Only a guard that turned them off turns them back on, so an inner guard
//! inside an outer one leaves interrupts masked until the outer guard drops.
//!
//! ```text
//! IF=1  outer = with_mask()   IF=0, restores true
//! IF=0    inner = with_mask() IF=0, restores false
//! IF=0    drop(inner)         IF=0
//! IF=0  drop(outer)           IF=1
//! ```
//!
//! ## Testing
//!
//! `cli`/`sti` fault outside ring 0, so every consumer is generic over
//! `M: InterruptMask` with [`CpuInterrupts`] as the default. Host tests plug
//! in a mask that records its sections:
//!
//! ```
//! use core::cell::Cell;
//! use kernel_sync::{InterruptMask, SpinMutex};
//!
//! thread_local! {
//!     static DEPTH: Cell<u32> = const { Cell::new(0) };
//! }
//!
//! struct Recording;
//!
//! impl InterruptMask for Recording {
//!     fn save_and_disable() -> bool {
//!         DEPTH.with(|d| d.set(d.get() + 1));
//!         true
//!     }
//!
//!     fn restore(_were_enabled: bool) {
//!         DEPTH.with(|d| d.set(d.get() - 1));
//!     }
//! }
//!
//! let counter = SpinMutex::new(0u32);
//! {
//!     let mut n = counter.lock_masked::<Recording>();
//!     *n += 1;
//!     assert_eq!(DEPTH.with(Cell::get), 1);
//! }
//! assert_eq!(DEPTH.with(Cell::get), 0);
//! ```
//!
//! # Platform
//!
//! [`CpuInterrupts`] targets `x86_64` and requires CPL 0.

use crate::{Mutex, MutexGuard, RawLock};
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};

/// `RFLAGS.IF`
const RFLAGS_IF: u64 = 1 << 9;

/// Save/disable/restore of the local interrupt flag.
///
/// The kernel uses [`CpuInterrupts`]. Host tests substitute masks that only
/// count how often they were engaged, since `cli`/`sti` fault outside ring 0.
pub trait InterruptMask {
    /// Disables interrupts and returns whether they were enabled before.
    fn save_and_disable() -> bool;

    /// Re-enables interrupts if `were_enabled` is set.
    fn restore(were_enabled: bool);
}

/// The local CPU's interrupt flag. Requires CPL 0.
#[derive(Debug, Copy, Clone, Default)]
pub struct CpuInterrupts;

impl InterruptMask for CpuInterrupts {
    #[inline]
    fn save_and_disable() -> bool {
        let enabled = interrupts_enabled();
        if enabled {
            disable_interrupts();
        }
        enabled
    }

    #[inline]
    fn restore(were_enabled: bool) {
        if were_enabled {
            enable_interrupts();
        }
    }
}

/// `cli`
#[inline]
pub fn disable_interrupts() {
    // SAFETY: only clears IF; the kernel runs at CPL 0.
    unsafe { core::arch::asm!("cli", options(nomem, nostack, preserves_flags)) }
}

/// `sti`
#[inline]
pub fn enable_interrupts() {
    // SAFETY: only sets IF; the kernel runs at CPL 0.
    unsafe { core::arch::asm!("sti", options(nomem, nostack, preserves_flags)) }
}

/// Whether `RFLAGS.IF` is set.
#[inline]
#[must_use]
pub fn interrupts_enabled() -> bool {
    let rflags: u64;
    // SAFETY: reads RFLAGS through the stack and restores RSP.
    unsafe {
        core::arch::asm!("pushfq", "pop {}", out(reg) rflags, options(preserves_flags));
    }
    rflags & RFLAGS_IF != 0
}

/// Critical section of mask `M`, left when dropped.
///
/// Only a guard that actually disabled interrupts re-enables them, so
/// nested guards restore the outermost state.
///
/// ```no_run
/// use kernel_sync::{CpuInterrupts, IrqGuard};
///
/// let _cs = IrqGuard::<CpuInterrupts>::with_mask();
/// // no interrupt handler runs on this core until `_cs` drops
/// ```
#[must_use = "interrupts are restored as soon as the guard is dropped"]
pub struct IrqGuard<M: InterruptMask = CpuInterrupts> {
    were_enabled: bool,
    _mask: PhantomData<*const M>,
}

impl<M: InterruptMask> IrqGuard<M> {
    #[inline]
    pub fn with_mask() -> Self {
        Self {
            were_enabled: M::save_and_disable(),
            _mask: PhantomData,
        }
    }
}

impl<M: InterruptMask> Drop for IrqGuard<M> {
    fn drop(&mut self) {
        M::restore(self.were_enabled);
    }
}

/// A [`MutexGuard`] taken inside an [`IrqGuard`].
pub struct IrqMutex<'a, T, R: RawLock, M: InterruptMask = CpuInterrupts> {
    // Declaration order is drop order: unlock, then unmask.
    guard: MutexGuard<'a, T, R>,
    _irq: IrqGuard<M>,
}

impl<T, R: RawLock, M: InterruptMask> Deref for IrqMutex<'_, T, R, M> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T, R: RawLock, M: InterruptMask> DerefMut for IrqMutex<'_, T, R, M> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T, R: RawLock> Mutex<T, R> {
    /// Masks interrupts with `M`, then locks.
    #[inline]
    pub fn lock_masked<M: InterruptMask>(&self) -> IrqMutex<'_, T, R, M> {
        let irq = IrqGuard::<M>::with_mask();
        IrqMutex {
            guard: self.lock(),
            _irq: irq,
        }
    }
}
