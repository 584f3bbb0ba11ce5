use crate::PciAddress;
use bitfield_struct::bitfield;
use core::marker::PhantomData;
use kernel_ports::PortIo;
use kernel_sync::{CpuInterrupts, InterruptMask, IrqGuard};

/// Configuration mechanism #1 address port.
pub const CONFIG_ADDRESS_PORT: u16 = 0xCF8;

/// Configuration mechanism #1 data port.
pub const CONFIG_DATA_PORT: u16 = 0xCFC;

/// Width of a configuration register access.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccessWidth {
    Byte,
    Word,
    Dword,
}

impl AccessWidth {
    #[must_use]
    pub const fn bytes(self) -> u8 {
        match self {
            Self::Byte => 1,
            Self::Word => 2,
            Self::Dword => 4,
        }
    }

    pub(crate) const fn mask(self) -> u32 {
        match self {
            Self::Byte => 0xFF,
            Self::Word => 0xFFFF,
            Self::Dword => 0xFFFF_FFFF,
        }
    }
}

/// Access to PCI configuration space.
///
/// Reads are dword granular: `offset` is dword aligned when called from
/// [`crate::PciBus`], and an address with no function behind it reads as all
/// ones. Writes also come in byte and word widths, since neighbouring
/// registers may hold write-one-to-clear bits (the status register shares
/// a dword with the command register).
pub trait ConfigSpace {
    fn read_dword(&mut self, addr: PciAddress, offset: u8) -> u32;
    fn write_dword(&mut self, addr: PciAddress, offset: u8, value: u32);

    /// Writes only the `width` bytes of the register at `offset`, which is
    /// aligned to `width`. `value` holds the register in its low bits.
    fn write_narrow(&mut self, addr: PciAddress, offset: u8, width: AccessWidth, value: u32);
}

impl<C: ConfigSpace + ?Sized> ConfigSpace for &mut C {
    fn read_dword(&mut self, addr: PciAddress, offset: u8) -> u32 {
        (**self).read_dword(addr, offset)
    }

    fn write_dword(&mut self, addr: PciAddress, offset: u8, value: u32) {
        (**self).write_dword(addr, offset, value);
    }

    fn write_narrow(&mut self, addr: PciAddress, offset: u8, width: AccessWidth, value: u32) {
        (**self).write_narrow(addr, offset, width, value);
    }
}

/// `CONFIG_ADDRESS` register layout.
#[bitfield(u32, order = Lsb)]
pub(crate) struct ConfigAddress {
    /// Dword-aligned register offset; bits 0-1 must be zero.
    pub register: u8,

    #[bits(3)]
    pub function: u8,

    #[bits(5)]
    pub device: u8,

    pub bus: u8,

    #[bits(7, default = 0)]
    _reserved: u8,

    /// Set to make the data port perform a configuration cycle.
    pub enable: bool,
}

impl ConfigAddress {
    pub(crate) fn for_register(addr: PciAddress, offset: u8) -> Self {
        Self::new()
            .with_enable(true)
            .with_bus(addr.bus())
            .with_device(addr.device())
            .with_function(addr.function())
            .with_register(offset & 0xFC)
    }
}

/// Mechanism #1 over the legacy address/data port pair.
///
/// The two ports are a machine-global resource: each access selects an
/// address and then touches the data port, with interrupts masked across
/// the pair so a handler cannot retarget `CONFIG_ADDRESS` in between.
pub struct PortConfigSpace<P: PortIo, M: InterruptMask = CpuInterrupts> {
    ports: P,
    _mask: PhantomData<fn() -> M>,
}

impl<P: PortIo> PortConfigSpace<P> {
    pub const fn new(ports: P) -> Self {
        Self::with_mask(ports)
    }
}

impl<P: PortIo, M: InterruptMask> PortConfigSpace<P, M> {
    pub const fn with_mask(ports: P) -> Self {
        Self {
            ports,
            _mask: PhantomData,
        }
    }

    pub fn into_inner(self) -> P {
        self.ports
    }
}

impl<P: PortIo, M: InterruptMask> ConfigSpace for PortConfigSpace<P, M> {
    fn read_dword(&mut self, addr: PciAddress, offset: u8) -> u32 {
        let selector = ConfigAddress::for_register(addr, offset).into_bits();
        let _irq = IrqGuard::<M>::with_mask();
        self.ports.write32(CONFIG_ADDRESS_PORT, selector);
        self.ports.read32(CONFIG_DATA_PORT)
    }

    fn write_dword(&mut self, addr: PciAddress, offset: u8, value: u32) {
        let selector = ConfigAddress::for_register(addr, offset).into_bits();
        let _irq = IrqGuard::<M>::with_mask();
        self.ports.write32(CONFIG_ADDRESS_PORT, selector);
        self.ports.write32(CONFIG_DATA_PORT, value);
    }

    /// Byte and word cycles go to the matching lane of the data port
    /// (`0xCFC + offset % 4`).
    fn write_narrow(&mut self, addr: PciAddress, offset: u8, width: AccessWidth, value: u32) {
        let selector = ConfigAddress::for_register(addr, offset).into_bits();
        let lane = u16::from(offset & 0x3);
        let [b0, b1, ..] = value.to_le_bytes();
        let _irq = IrqGuard::<M>::with_mask();
        self.ports.write32(CONFIG_ADDRESS_PORT, selector);
        match width {
            AccessWidth::Byte => self.ports.write8(CONFIG_DATA_PORT + lane, b0),
            AccessWidth::Word => self
                .ports
                .write16(CONFIG_DATA_PORT + (lane & 0x2), u16::from_le_bytes([b0, b1])),
            AccessWidth::Dword => self.ports.write32(CONFIG_DATA_PORT, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_config_address() {
        let addr = PciAddress::new(1, 2, 3).unwrap();
        let raw = ConfigAddress::for_register(addr, 0x10).into_bits();
        assert_eq!(raw, 0x8001_1310);
    }

    #[test]
    fn drops_unaligned_offset_bits() {
        let addr = PciAddress::new(0, 31, 7).unwrap();
        let raw = ConfigAddress::for_register(addr, 0x3F).into_bits();
        assert_eq!(raw, 0x8000_FF3C);
    }
}
