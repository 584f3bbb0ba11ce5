//! # Halting

use core::fmt;
use kernel_sync::irq::disable_interrupts;

/// Logs `args` at `error` and halts the machine.
///
/// Reserved for boot-environment failures and unresponsive hardware; every
/// other failure is handled where it happens.
#[cold]
pub fn fatal(args: fmt::Arguments<'_>) -> ! {
    log::error!("FATAL: {args}");
    halt()
}

/// Masks interrupts and halts forever.
pub fn halt() -> ! {
    disable_interrupts();
    loop {
        // SAFETY: `hlt` at CPL 0 with interrupts masked only parks the CPU.
        unsafe { core::arch::asm!("hlt", options(nomem, nostack, preserves_flags)) };
    }
}
