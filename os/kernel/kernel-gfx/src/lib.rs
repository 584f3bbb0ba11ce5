//! # Graphics Backends and Terminal
//!
//! A fixed cascade picks at most one pixel output device:
//!
//! 1. [`BackendKind::FirmwareGraphics`]: the framebuffer UEFI GOP (or the
//!    Multiboot2 loader) already set up, wrapped as is.
//! 2. [`BackendKind::LegacyChipsetGraphics`]: the Bochs/QEMU display
//!    interface, detected and programmed through its own registers.
//! 3. [`BackendKind::TextFallback`]: nothing came up; the [`Terminal`] keeps
//!    writing 80x25 VGA text cells.
//!
//! On a pixel device the terminal rasterizes a PSF2 bitmap [`Font`], by
//! default the built-in 8x8 one.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod backend;
pub mod bga;
mod builtin;
mod color;
mod font;
mod framebuffer;
mod terminal;
pub mod vga;

pub use backend::{
    BackendKind, BackendProbe, FirmwareProbe, GraphicsDevice, IdentityMapper, MapFlags,
    PhysMapper, select_backend,
};
pub use bga::BgaProbe;
pub use builtin::BUILTIN_PSF2;
pub use color::Color;
pub use font::{Font, FontError, PSF2_MAGIC};
pub use framebuffer::Framebuffer;
pub use terminal::Terminal;
pub use vga::{TextBuffer, VGA_TEXT_PHYS};
