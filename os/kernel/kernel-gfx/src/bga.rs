//! # Bochs Graphics Adapter
//!
//! The QEMU/Bochs "DISPI" register file behind index port `0x1CE` and data
//! port `0x1CF`. Registers are selected by writing their index, then read or
//! written through the data port as 16-bit values.

use crate::backend::{BackendKind, BackendProbe, GraphicsDevice, PhysMapper, map_framebuffer};
use bitflags::bitflags;
use kernel_info::hardware::PixelFormat;
use kernel_pci::{ConfigSpace, PciBus, PciCursor};
use kernel_ports::PortIo;
use log::{debug, warn};

pub const BGA_INDEX_PORT: u16 = 0x01CE;
pub const BGA_DATA_PORT: u16 = 0x01CF;

/// Oldest and newest interface revisions reported in the ID register.
pub const BGA_ID_RANGE: core::ops::RangeInclusive<u16> = 0xB0C0..=0xB0C5;

/// PCI vendor/device of the QEMU standard VGA adapter.
pub const BGA_PCI_ID: (u16, u16) = (0x1234, 0x1111);

/// Linear framebuffer address used when no PCI adapter is found.
pub const BGA_DEFAULT_LFB: u64 = 0xE000_0000;

pub mod index {
    pub const ID: u16 = 0x0;
    pub const XRES: u16 = 0x1;
    pub const YRES: u16 = 0x2;
    pub const BPP: u16 = 0x3;
    pub const ENABLE: u16 = 0x4;
    pub const BANK: u16 = 0x5;
    pub const VIRT_WIDTH: u16 = 0x6;
    pub const VIRT_HEIGHT: u16 = 0x7;
    pub const X_OFFSET: u16 = 0x8;
    pub const Y_OFFSET: u16 = 0x9;
}

bitflags! {
    /// Value of the `ENABLE` register.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Enable: u16 {
        const ENABLED = 0x01;
        const LFB_ENABLED = 0x40;
        const NO_CLEAR_MEM = 0x80;
    }
}

/// Register-level access to the adapter.
pub struct Bga<P> {
    ports: P,
}

impl<P: PortIo> Bga<P> {
    pub const fn new(ports: P) -> Self {
        Self { ports }
    }

    pub fn into_inner(self) -> P {
        self.ports
    }

    pub fn read(&mut self, index: u16) -> u16 {
        self.ports.write16(BGA_INDEX_PORT, index);
        self.ports.read16(BGA_DATA_PORT)
    }

    pub fn write(&mut self, index: u16, value: u16) {
        self.ports.write16(BGA_INDEX_PORT, index);
        self.ports.write16(BGA_DATA_PORT, value);
    }

    /// Interface revision, or `None` when no adapter answers.
    pub fn version(&mut self) -> Option<u16> {
        let id = self.read(index::ID);
        BGA_ID_RANGE.contains(&id).then_some(id)
    }

    /// Programs a linear framebuffer mode. The display is disabled while the
    /// geometry changes.
    pub fn set_mode(&mut self, width: u16, height: u16, bpp: u16) {
        self.write(index::ENABLE, 0);
        self.write(index::XRES, width);
        self.write(index::YRES, height);
        self.write(index::BPP, bpp);
        self.write(index::VIRT_WIDTH, width);
        self.write(index::VIRT_HEIGHT, height);
        self.write(index::X_OFFSET, 0);
        self.write(index::Y_OFFSET, 0);
        self.write(index::BANK, 0);
        self.write(index::ENABLE, (Enable::ENABLED | Enable::LFB_ENABLED).bits());
    }

    /// `(width, height, bpp)` as currently programmed.
    pub fn mode(&mut self) -> (u16, u16, u16) {
        (
            self.read(index::XRES),
            self.read(index::YRES),
            self.read(index::BPP),
        )
    }
}

/// Linear framebuffer base: BAR0 of the QEMU VGA adapter, else the
/// fixed Bochs default.
pub fn lfb_base<C: ConfigSpace>(bus: &mut PciBus<C>) -> u64 {
    let (vendor, device) = BGA_PCI_ID;
    let mut cursor = PciCursor::new();
    let base = bus
        .find_by_id(vendor, device, &mut cursor)
        .and_then(|addr| bus.bar(addr, 0))
        .and_then(|bar| bar.memory_base())
        .filter(|&base| base != 0);

    base.unwrap_or_else(|| {
        debug!("GFX: no {vendor:04x}:{device:04x} adapter, assuming LFB at {BGA_DEFAULT_LFB:#x}");
        BGA_DEFAULT_LFB
    })
}

/// The chipset step of the cascade.
pub struct BgaProbe<P> {
    bga: Bga<P>,
    lfb: u64,
    mode: (u16, u16, u16),
}

impl<P: PortIo> BgaProbe<P> {
    /// `mode` is `(width, height, bpp)`; only 32 bpp is rendered.
    pub const fn new(ports: P, lfb: u64, mode: (u16, u16, u16)) -> Self {
        Self {
            bga: Bga::new(ports),
            lfb,
            mode,
        }
    }
}

impl<P: PortIo> BackendProbe for BgaProbe<P> {
    fn kind(&self) -> BackendKind {
        BackendKind::LegacyChipsetGraphics
    }

    fn probe(&mut self, mapper: &mut dyn PhysMapper) -> Option<GraphicsDevice<'static>> {
        let version = self.bga.version()?;
        let (width, height, bpp) = self.mode;
        if bpp != 32 {
            warn!("GFX: BGA mode with {bpp} bpp requested, need 32");
            return None;
        }

        self.bga.set_mode(width, height, bpp);
        let actual = self.bga.mode();
        if actual != self.mode {
            warn!("GFX: BGA {version:#06x} rejected {width}x{height}x{bpp}, has {actual:?}");
            return None;
        }

        let (w, h) = (usize::from(width), usize::from(height));
        let framebuffer = map_framebuffer(mapper, self.lfb, w, h, w, PixelFormat::Bgr)?;
        Some(GraphicsDevice::new(
            BackendKind::LegacyChipsetGraphics,
            "Bochs VBE",
            32,
            framebuffer,
        ))
    }
}
