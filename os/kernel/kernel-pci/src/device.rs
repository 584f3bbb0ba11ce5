use crate::PciAddress;
use bitflags::bitflags;

/// Offsets into the common configuration header.
pub mod offsets {
    pub const VENDOR_ID: u8 = 0x00;
    pub const DEVICE_ID: u8 = 0x02;
    pub const COMMAND: u8 = 0x04;
    pub const STATUS: u8 = 0x06;
    pub const REVISION: u8 = 0x08;
    pub const PROG_IF: u8 = 0x09;
    pub const SUBCLASS: u8 = 0x0A;
    pub const CLASS: u8 = 0x0B;
    pub const HEADER_TYPE: u8 = 0x0E;
    /// First base address register of a type 0 header.
    pub const BAR0: u8 = 0x10;
    /// Last base address register of a type 0 header.
    pub const BAR5: u8 = 0x24;
    pub const INTERRUPT_LINE: u8 = 0x3C;
}

bitflags! {
    /// Bits of the command register.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct CommandFlags: u16 {
        const IO_SPACE = 1 << 0;
        const MEMORY_SPACE = 1 << 1;
        const BUS_MASTER = 1 << 2;
        const INTERRUPT_DISABLE = 1 << 10;
    }
}

/// Identity of a present function, read fresh from configuration space.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PciDeviceRecord {
    pub address: PciAddress,
    pub vendor_id: u16,
    pub device_id: u16,
    pub class: u8,
    pub subclass: u8,
    pub prog_if: u8,
    pub revision: u8,
    /// Raw header type byte, multifunction bit included.
    pub header_type: u8,
}

impl PciDeviceRecord {
    pub const MULTIFUNCTION: u8 = 0x80;

    /// Decodes the record from the first four header dwords.
    pub(crate) const fn from_header(address: PciAddress, id: u32, class: u32, bist: u32) -> Self {
        let [v0, v1, d0, d1] = id.to_le_bytes();
        let [revision, prog_if, subclass, class_code] = class.to_le_bytes();
        Self {
            address,
            vendor_id: u16::from_le_bytes([v0, v1]),
            device_id: u16::from_le_bytes([d0, d1]),
            class: class_code,
            subclass,
            prog_if,
            revision,
            header_type: bist.to_le_bytes()[2],
        }
    }

    /// Header layout: 0 = device, 1 = PCI-to-PCI bridge, 2 = CardBus bridge.
    #[must_use]
    pub const fn layout(&self) -> u8 {
        self.header_type & !Self::MULTIFUNCTION
    }

    #[must_use]
    pub const fn is_multifunction(&self) -> bool {
        self.header_type & Self::MULTIFUNCTION != 0
    }
}

/// A decoded base address register.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Bar {
    /// Memory BAR; `wide` BARs also consumed the following register.
    Memory {
        base: u64,
        prefetchable: bool,
        wide: bool,
    },
    Io {
        port: u16,
    },
}

impl Bar {
    /// Decodes a BAR from its low dword and, for 64-bit memory BARs, the
    /// following dword. Returns `None` for an unimplemented (zero) BAR.
    #[must_use]
    pub fn decode(low: u32, high: impl FnOnce() -> u32) -> Option<Self> {
        if low & 1 == 1 {
            let port = u16::try_from(low & 0xFFFC).ok()?;
            return (port != 0).then_some(Self::Io { port });
        }

        let prefetchable = low & 0x8 != 0;
        let (base, wide) = match (low >> 1) & 0b11 {
            0b10 => ((u64::from(high()) << 32) | u64::from(low & 0xFFFF_FFF0), true),
            _ => (u64::from(low & 0xFFFF_FFF0), false),
        };
        (base != 0).then_some(Self::Memory {
            base,
            prefetchable,
            wide,
        })
    }

    /// Memory base address, if this is a memory BAR.
    #[must_use]
    pub const fn memory_base(self) -> Option<u64> {
        match self {
            Self::Memory { base, .. } => Some(base),
            Self::Io { .. } => None,
        }
    }

    /// I/O port base, if this is an I/O BAR.
    #[must_use]
    pub const fn io_port(self) -> Option<u16> {
        match self {
            Self::Io { port } => Some(port),
            Self::Memory { .. } => None,
        }
    }
}
