//! # Kernel Hardware Description
//!
//! The normalized picture of the machine that the boot path hands to every
//! driver, independent of whether control arrived through Multiboot2 or UEFI.
//!
//! ## Overview
//!
//! Both boot protocols describe the same kinds of facts in incompatible
//! layouts. The boot loader crate translates whichever one it received into
//! a [`HardwareDescription`](hardware::HardwareDescription):
//!
//! * **Memory map**: an ordered, fixed-capacity table of
//!   `{base, length, kind}` regions ([`memory::MemoryMap`]). Region kinds of
//!   both protocols are folded into one [`memory::MemoryKind`] enumeration.
//! * **Framebuffer**: an optional linear framebuffer already set up by
//!   firmware or the boot loader ([`hardware::FramebufferDescriptor`]).
//! * **ACPI**: the optional physical address of the RSDP.
//! * **Ramdisk**: the optional physical range of the first boot module.
//! * **ELF sections**: the optional kernel section header table, kept for
//!   symbolic backtraces.
//!
//! The description is assembled once through a
//! [`HardwareBuilder`](hardware::HardwareBuilder) and is read-only afterwards.
//!
//! ## Configuration
//!
//! Compile-time tunables shared by the device layer live in [`config`].

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod config;
pub mod hardware;
pub mod memory;
