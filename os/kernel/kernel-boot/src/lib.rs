//! # Boot Information Loader
//!
//! Turns whatever the boot environment handed over into one
//! [`HardwareDescription`](kernel_info::hardware::HardwareDescription).
//!
//! ## Boot Paths
//!
//! The kernel entry receives three registers worth of arguments and
//! [`BootHandoff::identify`] decides which protocol delivered them:
//!
//! * **Multiboot2**: the boot loader magic `0x36d7_6289` plus the physical
//!   address of a tag list. [`multiboot2::parse`] walks it.
//! * **UEFI**: an image handle and a system table pointer. With the `uefi`
//!   feature the `firmware` module queries the Graphics Output Protocol,
//!   the configuration table and the memory map, then leaves boot services.
//!
//! Both paths only ever fill a
//! [`HardwareBuilder`](kernel_info::hardware::HardwareBuilder); nothing
//! downstream can tell which one ran.
//!
//! ## Display Modes
//!
//! Picking a firmware display mode is a pure function, [`gop::select_mode`],
//! so it can be checked without firmware.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod error;
#[cfg(feature = "uefi")]
pub mod firmware;
pub mod gop;
mod handoff;
pub mod multiboot2;

pub use error::{BootInfoError, FirmwareBootError};
pub use handoff::{BootHandoff, MULTIBOOT2_BOOTLOADER_MAGIC};
