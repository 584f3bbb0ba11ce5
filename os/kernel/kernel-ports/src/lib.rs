//! # x86 I/O Port Access
//!
//! Thin wrappers around the `in`/`out` instructions plus the [`PortIo`] seam
//! that every port-mapped driver in the kernel is written against.
//!
//! ## Overview
//!
//! Drivers never issue `in`/`out` themselves. They take a `PortIo`
//! implementation, which on hardware is [`RawPorts`] and in host-side tests is
//! a simulated device model. This keeps register protocols (ATA, PCI,
//! Bochs display, VGA CRTC, 16550 UART) testable off-target.
//!
//! ### I/O Port Space Characteristics
//! * **16-bit addressing**: ports `0x0000..=0xFFFF`, separate from physical
//!   memory.
//! * **Width matters**: a byte, word or dword access to the same port number
//!   can reach different registers. PCI mechanism #1 uses this for sub-dword
//!   configuration writes at `0xCFC..=0xCFF`.
//! * **Side effects on read**: status registers may acknowledge or clear
//!   state when read, so an access is never elided or repeated.
//! * **Privilege**: gated by CPL, `RFLAGS.IOPL` and the TSS I/O bitmap.
//!
//! ### Common Port Ranges
//! ```text
//! 0x0060, 0x0064  PS/2 controller data / status
//! 0x0170-0x0177   Secondary IDE command block
//! 0x01CE-0x01CF   Bochs/QEMU display interface (index/data)
//! 0x01F0-0x01F7   Primary IDE command block
//! 0x0376          Secondary IDE control block
//! 0x03D4-0x03D5   VGA CRT controller (index/data)
//! 0x03F6          Primary IDE control block
//! 0x03F8-0x03FF   Serial Port #1
//! 0x0402          QEMU debug console
//! 0x0CF8-0x0CFF   PCI configuration address/data
//! ```
//!
//! ## Available Operations
//!
//! | Width | Read                  | Write                  |
//! |-------|-----------------------|------------------------|
//! | 8     | [`PortIo::read8`]     | [`PortIo::write8`]     |
//! | 16    | [`PortIo::read16`]    | [`PortIo::write16`]    |
//! | 32    | [`PortIo::read32`]    | [`PortIo::write32`]    |
//!
//! `&mut P` forwards to `P`, so a driver can borrow a port space instead of
//! owning a clone.
//!
//! ## Usage Example
//! ```no_run
//! use kernel_ports::{PortIo, RawPorts};
//!
//! // SAFETY: running at CPL 0.
//! let mut ports = unsafe { RawPorts::new() };
//!
//! // Line status of COM1: bit 5 is "transmit holding register empty".
//! if ports.read8(0x3FD) & 0x20 != 0 {
//!     ports.write8(0x3F8, b'!');
//! }
//! ```
//!
//! In tests the same driver code runs against a model:
//! ```
//! use kernel_ports::PortIo;
//!
//! /// A bus where nothing answers.
//! struct Floating;
//!
//! impl PortIo for Floating {
//!     fn read8(&mut self, _port: u16) -> u8 { 0xFF }
//!     fn read16(&mut self, _port: u16) -> u16 { 0xFFFF }
//!     fn read32(&mut self, _port: u16) -> u32 { 0xFFFF_FFFF }
//!     fn write8(&mut self, _port: u16, _value: u8) {}
//!     fn write16(&mut self, _port: u16, _value: u16) {}
//!     fn write32(&mut self, _port: u16, _value: u32) {}
//! }
//!
//! assert_eq!(Floating.read8(0x1F7), 0xFF);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

/// Access to the 16-bit I/O port address space.
///
/// Methods take `&mut self`: a register protocol is a sequence of accesses
/// that must not be interleaved with a second user of the same device.
pub trait PortIo {
    fn read8(&mut self, port: u16) -> u8;
    fn read16(&mut self, port: u16) -> u16;
    fn read32(&mut self, port: u16) -> u32;
    fn write8(&mut self, port: u16, value: u8);
    fn write16(&mut self, port: u16, value: u16);
    fn write32(&mut self, port: u16, value: u32);
}

impl<P: PortIo + ?Sized> PortIo for &mut P {
    #[inline]
    fn read8(&mut self, port: u16) -> u8 {
        (**self).read8(port)
    }

    #[inline]
    fn read16(&mut self, port: u16) -> u16 {
        (**self).read16(port)
    }

    #[inline]
    fn read32(&mut self, port: u16) -> u32 {
        (**self).read32(port)
    }

    #[inline]
    fn write8(&mut self, port: u16, value: u8) {
        (**self).write8(port, value);
    }

    #[inline]
    fn write16(&mut self, port: u16, value: u16) {
        (**self).write16(port, value);
    }

    #[inline]
    fn write32(&mut self, port: u16, value: u32) {
        (**self).write32(port, value);
    }
}

/// The real port space, driven by `in`/`out`.
///
/// A `RawPorts` value is a capability: holding one means the holder is
/// allowed to touch any port. It can only be created through the unsafe
/// [`RawPorts::new`]. Clones carry the same capability.
#[derive(Debug, Clone)]
pub struct RawPorts {
    _private: (),
}

impl RawPorts {
    /// Creates a handle to the hardware port space.
    ///
    /// # Safety
    /// - The caller must execute at CPL0, or IOPL/the I/O permission bitmap
    ///   must grant access to every port the handle is used with.
    /// - Only `x86/x86_64` with an I/O port bus.
    /// - Drivers sharing a device must be serialized by the caller; the
    ///   handle performs no locking of its own.
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl PortIo for RawPorts {
    #[inline]
    fn read8(&mut self, port: u16) -> u8 {
        // SAFETY: construction of `RawPorts` carries the privilege contract.
        unsafe { inb(port) }
    }

    #[inline]
    fn read16(&mut self, port: u16) -> u16 {
        // SAFETY: see `read8`.
        unsafe { inw(port) }
    }

    #[inline]
    fn read32(&mut self, port: u16) -> u32 {
        // SAFETY: see `read8`.
        unsafe { inl(port) }
    }

    #[inline]
    fn write8(&mut self, port: u16, value: u8) {
        // SAFETY: see `read8`.
        unsafe { outb(port, value) }
    }

    #[inline]
    fn write16(&mut self, port: u16, value: u16) {
        // SAFETY: see `read8`.
        unsafe { outw(port, value) }
    }

    #[inline]
    fn write32(&mut self, port: u16, value: u32) {
        // SAFETY: see `read8`.
        unsafe { outl(port, value) }
    }
}

/// Write one byte to an I/O port (`out dx, al`).
///
/// # Safety
/// - **Privilege:** CPL0 or an I/O permission that covers `port`, otherwise `#GP`.
/// - **Correct port:** writing the wrong register can wedge the device or the
///   system.
/// - **Ordering:** `out` orders with other I/O instructions but is not a
///   general memory fence.
#[inline]
pub unsafe fn outb(port: u16, val: u8) {
    unsafe {
        core::arch::asm!("out dx, al", in("dx") port, in("al") val, options(nomem, nostack, preserves_flags));
    }
}

/// Write one 16-bit word to an I/O port (`out dx, ax`).
///
/// # Safety
/// Same contract as [`outb`].
#[inline]
pub unsafe fn outw(port: u16, val: u16) {
    unsafe {
        core::arch::asm!("out dx, ax", in("dx") port, in("ax") val, options(nomem, nostack, preserves_flags));
    }
}

/// Write one 32-bit dword to an I/O port (`out dx, eax`).
///
/// # Safety
/// Same contract as [`outb`].
#[inline]
pub unsafe fn outl(port: u16, val: u32) {
    unsafe {
        core::arch::asm!("out dx, eax", in("dx") port, in("eax") val, options(nomem, nostack, preserves_flags));
    }
}

/// Read one byte from an I/O port (`in al, dx`).
///
/// # Safety
/// - **Privilege:** CPL0 or an I/O permission that covers `port`, otherwise `#GP`.
/// - **Side effects:** some registers change device state on read (e.g. the
///   ATA status register acknowledges a pending interrupt).
#[inline]
pub unsafe fn inb(port: u16) -> u8 {
    let mut v: u8;
    unsafe {
        core::arch::asm!("in al, dx", in("dx") port, out("al") v, options(nomem, nostack, preserves_flags));
    }
    v
}

/// Read one 16-bit word from an I/O port (`in ax, dx`).
///
/// # Safety
/// Same contract as [`inb`].
#[inline]
pub unsafe fn inw(port: u16) -> u16 {
    let mut v: u16;
    unsafe {
        core::arch::asm!("in ax, dx", in("dx") port, out("ax") v, options(nomem, nostack, preserves_flags));
    }
    v
}

/// Read one 32-bit dword from an I/O port (`in eax, dx`).
///
/// # Safety
/// Same contract as [`inb`].
#[inline]
pub unsafe fn inl(port: u16) -> u32 {
    let mut v: u32;
    unsafe {
        core::arch::asm!("in eax, dx", in("dx") port, out("eax") v, options(nomem, nostack, preserves_flags));
    }
    v
}
