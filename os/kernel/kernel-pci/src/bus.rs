use crate::config::{AccessWidth, ConfigSpace};
use crate::device::{Bar, CommandFlags, PciDeviceRecord, offsets};
use crate::{NO_DEVICE, PciAddress, PciCursor};
use log::{debug, info};

/// Lazy enumerator over a configuration space.
pub struct PciBus<C: ConfigSpace> {
    space: C,
}

impl<C: ConfigSpace> PciBus<C> {
    /// Takes ownership of the access mechanism. No enumeration happens here.
    pub fn init(space: C) -> Self {
        info!("PCI: configuration access ready");
        Self { space }
    }

    pub fn into_inner(self) -> C {
        self.space
    }

    /// Reads a register of `width` at `offset`.
    ///
    /// `offset` must be aligned to `width`; the value is zero-extended.
    pub fn read_config(&mut self, addr: PciAddress, offset: u8, width: AccessWidth) -> u32 {
        debug_assert_eq!(offset % width.bytes(), 0, "unaligned config read");
        let dword = self.space.read_dword(addr, offset & 0xFC);
        let shift = u32::from(offset & 0x3) * 8;
        (dword >> shift) & width.mask()
    }

    /// Writes a register of `width` at `offset`.
    ///
    /// Only the addressed bytes are written; the rest of the containing
    /// dword sees no cycle.
    pub fn write_config(&mut self, addr: PciAddress, offset: u8, width: AccessWidth, value: u32) {
        debug_assert_eq!(offset % width.bytes(), 0, "unaligned config write");
        match width {
            AccessWidth::Dword => self.space.write_dword(addr, offset & 0xFC, value),
            narrow => self.space.write_narrow(addr, offset, narrow, value & narrow.mask()),
        }
    }

    /// Reads the identity of the function at `addr`, or `None` if absent.
    pub fn record(&mut self, addr: PciAddress) -> Option<PciDeviceRecord> {
        let id = self.space.read_dword(addr, offsets::VENDOR_ID);
        if id & 0xFFFF == u32::from(NO_DEVICE) {
            return None;
        }
        let class = self.space.read_dword(addr, offsets::REVISION);
        let bist = self.space.read_dword(addr, 0x0C);
        Some(PciDeviceRecord::from_header(addr, id, class, bist))
    }

    /// Next function after `cursor` with the given class and subclass.
    pub fn find_by_class(
        &mut self,
        class: u8,
        subclass: u8,
        cursor: &mut PciCursor,
    ) -> Option<PciAddress> {
        self.scan(cursor, |r| r.class == class && r.subclass == subclass)
            .map(|r| r.address)
    }

    /// Next function after `cursor` with the given vendor and device id.
    pub fn find_by_id(
        &mut self,
        vendor: u16,
        device: u16,
        cursor: &mut PciCursor,
    ) -> Option<PciAddress> {
        self.scan(cursor, |r| r.vendor_id == vendor && r.device_id == device)
            .map(|r| r.address)
    }

    /// Every present function, in enumeration order.
    pub const fn devices(&mut self) -> Devices<'_, C> {
        Devices {
            bus: self,
            cursor: PciCursor::new(),
        }
    }

    /// Decodes BAR `index` (0-5) of a type 0 header.
    ///
    /// A 64-bit memory BAR consumes register `index + 1` as its upper half.
    pub fn bar(&mut self, addr: PciAddress, index: u8) -> Option<Bar> {
        if index > 5 {
            return None;
        }
        let offset = offsets::BAR0 + index * 4;
        let low = self.read_config(addr, offset, AccessWidth::Dword);
        let next = offset + 4;
        Bar::decode(low, || {
            if next <= offsets::BAR5 {
                self.read_config(addr, next, AccessWidth::Dword)
            } else {
                0
            }
        })
    }

    /// Sets `flags` in the command register, leaving other bits unchanged.
    pub fn enable(&mut self, addr: PciAddress, flags: CommandFlags) {
        let command = self.read_config(addr, offsets::COMMAND, AccessWidth::Word);
        let updated = command | u32::from(flags.bits());
        if updated != command {
            self.write_config(addr, offsets::COMMAND, AccessWidth::Word, updated);
        }
    }

    /// Walks forward from `cursor` to the first present function accepted by
    /// `matches`, advancing the cursor past it. Marks the cursor exhausted
    /// once the end of configuration space is reached.
    fn scan(
        &mut self,
        cursor: &mut PciCursor,
        mut matches: impl FnMut(&PciDeviceRecord) -> bool,
    ) -> Option<PciDeviceRecord> {
        let mut next = cursor.start();

        while let Some(addr) = next {
            if let Some(record) = self.record(addr) {
                if matches(&record) {
                    cursor.advance(addr);
                    return Some(record);
                }
                next = addr.successor();
            } else if addr.function() == 0 && self.skips_functions_of_absent(addr) {
                next = addr.next_device();
            } else {
                next = addr.successor();
            }
        }

        cursor.finish();
        None
    }

    /// Whether an absent function 0 also rules out functions 1-7: only when
    /// its header type byte lacks the multifunction bit.
    fn skips_functions_of_absent(&mut self, addr: PciAddress) -> bool {
        let header = self.read_config(addr, offsets::HEADER_TYPE, AccessWidth::Byte);
        let skip = header & u32::from(PciDeviceRecord::MULTIFUNCTION) == 0;
        if skip {
            debug!("PCI: {addr} absent, skipping its functions");
        }
        skip
    }
}

/// Iterator returned by [`PciBus::devices`].
pub struct Devices<'a, C: ConfigSpace> {
    bus: &'a mut PciBus<C>,
    cursor: PciCursor,
}

impl<C: ConfigSpace> Iterator for Devices<'_, C> {
    type Item = PciDeviceRecord;

    fn next(&mut self) -> Option<Self::Item> {
        self.bus.scan(&mut self.cursor, |_| true)
    }
}
