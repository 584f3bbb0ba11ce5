use kernel_pci::{
    AccessWidth, Bar, CONFIG_ADDRESS_PORT, CONFIG_DATA_PORT, CommandFlags, ConfigSpace, PciAddress,
    PciBus, PciCursor, PortConfigSpace, offsets,
};
use kernel_ports::PortIo;
use kernel_sync::InterruptMask;
use std::cell::Cell;
use std::collections::BTreeMap;

/// Configuration space with 64 dwords per present function; anything else
/// reads as all ones.
#[derive(Default)]
struct SimulatedConfigSpace {
    functions: BTreeMap<PciAddress, [u32; 64]>,
}

impl SimulatedConfigSpace {
    fn add(&mut self, addr: PciAddress, vendor: u16, device: u16, class: u8, subclass: u8, header: u8) {
        let mut regs = [0u32; 64];
        regs[0] = u32::from(vendor) | (u32::from(device) << 16);
        regs[2] = (u32::from(class) << 24) | (u32::from(subclass) << 16);
        regs[3] = u32::from(header) << 16;
        self.functions.insert(addr, regs);
    }

    fn set(&mut self, addr: PciAddress, offset: u8, value: u32) {
        self.functions.get_mut(&addr).unwrap()[usize::from(offset / 4)] = value;
    }
}

impl ConfigSpace for SimulatedConfigSpace {
    fn read_dword(&mut self, addr: PciAddress, offset: u8) -> u32 {
        assert_eq!(offset % 4, 0);
        self.functions
            .get(&addr)
            .map_or(0xFFFF_FFFF, |regs| regs[usize::from(offset / 4)])
    }

    fn write_dword(&mut self, addr: PciAddress, offset: u8, value: u32) {
        assert_eq!(offset % 4, 0);
        if let Some(regs) = self.functions.get_mut(&addr) {
            regs[usize::from(offset / 4)] = value;
        }
    }

    fn write_narrow(&mut self, addr: PciAddress, offset: u8, width: AccessWidth, value: u32) {
        assert_eq!(offset % width.bytes(), 0);
        if let Some(regs) = self.functions.get_mut(&addr) {
            let shift = u32::from(offset % 4) * 8;
            let mask = match width {
                AccessWidth::Byte => 0xFF,
                AccessWidth::Word => 0xFFFF,
                AccessWidth::Dword => 0xFFFF_FFFF,
            } << shift;
            let reg = &mut regs[usize::from(offset / 4)];
            *reg = (*reg & !mask) | ((value << shift) & mask);
        }
    }
}

fn bdf(bus: u8, device: u8, function: u8) -> PciAddress {
    PciAddress::new(bus, device, function).unwrap()
}

fn all_by_class(bus: &mut PciBus<SimulatedConfigSpace>, class: u8, subclass: u8) -> Vec<PciAddress> {
    let mut cursor = PciCursor::new();
    let found: Vec<_> = std::iter::from_fn(|| bus.find_by_class(class, subclass, &mut cursor)).collect();
    assert!(cursor.is_exhausted());
    // An exhausted cursor stays exhausted.
    assert_eq!(bus.find_by_class(class, subclass, &mut cursor), None);
    found
}

fn sample_bus() -> PciBus<SimulatedConfigSpace> {
    let mut space = SimulatedConfigSpace::default();
    // Host bridge
    space.add(bdf(0, 0, 0), 0x8086, 0x1237, 0x06, 0x00, 0x00);
    // Multifunction PIIX: ISA bridge, IDE, ACPI
    space.add(bdf(0, 1, 0), 0x8086, 0x7000, 0x06, 0x01, 0x80);
    space.add(bdf(0, 1, 1), 0x8086, 0x7010, 0x01, 0x01, 0x00);
    space.add(bdf(0, 1, 3), 0x8086, 0x7113, 0x06, 0x80, 0x00);
    // Bochs display
    space.add(bdf(0, 2, 0), 0x1234, 0x1111, 0x03, 0x00, 0x00);
    // A second IDE controller behind another bus
    space.add(bdf(3, 4, 0), 0x8086, 0x7010, 0x01, 0x01, 0x00);
    PciBus::init(space)
}

#[test]
fn no_match_returns_none_and_exhausts() {
    let mut bus = sample_bus();
    assert!(all_by_class(&mut bus, 0x0C, 0x03).is_empty());
}

#[test]
fn single_match() {
    let mut bus = sample_bus();
    assert_eq!(all_by_class(&mut bus, 0x03, 0x00), vec![bdf(0, 2, 0)]);
}

#[test]
fn multiple_matches_in_ascending_order_including_nonzero_functions() {
    let mut bus = sample_bus();
    assert_eq!(all_by_class(&mut bus, 0x01, 0x01), vec![bdf(0, 1, 1), bdf(3, 4, 0)]);
    assert_eq!(all_by_class(&mut bus, 0x06, 0x80), vec![bdf(0, 1, 3)]);
}

#[test]
fn find_by_id_visits_each_match_once() {
    let mut bus = sample_bus();
    let mut cursor = PciCursor::new();
    assert_eq!(bus.find_by_id(0x8086, 0x7010, &mut cursor), Some(bdf(0, 1, 1)));
    assert_eq!(bus.find_by_id(0x8086, 0x7010, &mut cursor), Some(bdf(3, 4, 0)));
    assert_eq!(bus.find_by_id(0x8086, 0x7010, &mut cursor), None);

    let mut cursor = PciCursor::after(bdf(0, 1, 1));
    assert_eq!(bus.find_by_id(0x8086, 0x7010, &mut cursor), Some(bdf(3, 4, 0)));
}

#[test]
fn devices_lists_every_present_function() {
    let mut bus = sample_bus();
    let found: Vec<_> = bus.devices().map(|r| r.address).collect();
    assert_eq!(
        found,
        vec![bdf(0, 0, 0), bdf(0, 1, 0), bdf(0, 1, 1), bdf(0, 1, 3), bdf(0, 2, 0), bdf(3, 4, 0)]
    );
}

#[test]
fn function_behind_absent_function_zero_is_still_found() {
    // Absent function 0 reads a header type of 0xFF, multifunction bit set.
    let mut space = SimulatedConfigSpace::default();
    space.add(bdf(0, 5, 2), 0x10EC, 0x8139, 0x02, 0x00, 0x00);
    let mut bus = PciBus::init(space);
    assert_eq!(all_by_class(&mut bus, 0x02, 0x00), vec![bdf(0, 5, 2)]);
}

/// Absent function 0 with a zero header byte: functions 1-7 are skipped.
struct ZeroHeaderSpace(SimulatedConfigSpace);

impl ConfigSpace for ZeroHeaderSpace {
    fn read_dword(&mut self, addr: PciAddress, offset: u8) -> u32 {
        if addr.function() == 0 && offset == 0x0C && !self.0.functions.contains_key(&addr) {
            return 0xFF00_FFFF;
        }
        self.0.read_dword(addr, offset)
    }

    fn write_dword(&mut self, addr: PciAddress, offset: u8, value: u32) {
        self.0.write_dword(addr, offset, value);
    }

    fn write_narrow(&mut self, addr: PciAddress, offset: u8, width: AccessWidth, value: u32) {
        self.0.write_narrow(addr, offset, width, value);
    }
}

#[test]
fn absent_single_function_header_skips_remaining_functions() {
    let mut inner = SimulatedConfigSpace::default();
    inner.add(bdf(0, 5, 2), 0x10EC, 0x8139, 0x02, 0x00, 0x00);
    let mut bus = PciBus::init(ZeroHeaderSpace(inner));
    let mut cursor = PciCursor::new();
    assert_eq!(bus.find_by_class(0x02, 0x00, &mut cursor), None);
}

#[test]
fn config_round_trips_per_width() {
    let mut bus = sample_bus();
    let addr = bdf(0, 2, 0);

    bus.write_config(addr, 0x40, AccessWidth::Dword, 0xAABB_CCDD);
    assert_eq!(bus.read_config(addr, 0x40, AccessWidth::Dword), 0xAABB_CCDD);
    assert_eq!(bus.read_config(addr, 0x40, AccessWidth::Word), 0xCCDD);
    assert_eq!(bus.read_config(addr, 0x42, AccessWidth::Word), 0xAABB);
    assert_eq!(bus.read_config(addr, 0x40, AccessWidth::Byte), 0xDD);
    assert_eq!(bus.read_config(addr, 0x41, AccessWidth::Byte), 0xCC);
    assert_eq!(bus.read_config(addr, 0x42, AccessWidth::Byte), 0xBB);
    assert_eq!(bus.read_config(addr, 0x43, AccessWidth::Byte), 0xAA);

    bus.write_config(addr, 0x42, AccessWidth::Word, 0x1234);
    assert_eq!(bus.read_config(addr, 0x42, AccessWidth::Word), 0x1234);
    assert_eq!(bus.read_config(addr, 0x40, AccessWidth::Dword), 0x1234_CCDD);

    bus.write_config(addr, 0x41, AccessWidth::Byte, 0x77);
    assert_eq!(bus.read_config(addr, 0x41, AccessWidth::Byte), 0x77);
    assert_eq!(bus.read_config(addr, 0x40, AccessWidth::Dword), 0x1234_77DD);
}

#[test]
fn records_are_read_fresh() {
    let mut bus = sample_bus();
    let addr = bdf(0, 2, 0);
    assert_eq!(bus.record(addr).unwrap().class, 0x03);

    bus.write_config(addr, offsets::CLASS, AccessWidth::Byte, 0x04);
    assert_eq!(bus.record(addr).unwrap().class, 0x04);
    assert!(bus.record(bdf(0, 9, 0)).is_none());
}

#[test]
fn decodes_bars_and_sets_command_bits() {
    let mut space = SimulatedConfigSpace::default();
    let addr = bdf(0, 2, 0);
    space.add(addr, 0x1234, 0x1111, 0x03, 0x00, 0x00);
    space.set(addr, 0x10, 0xFD00_0008);
    space.set(addr, 0x14, 0x0000_0004);
    space.set(addr, 0x18, 0x0000_0001);
    space.set(addr, 0x20, 0x0000_C001);
    space.set(addr, 0x04, 0x0280_0000);
    let mut bus = PciBus::init(space);

    assert_eq!(bus.bar(addr, 0).and_then(Bar::memory_base), Some(0xFD00_0000));
    // 64-bit BAR at index 1 takes index 2 as its upper half.
    assert_eq!(
        bus.bar(addr, 1),
        Some(Bar::Memory {
            base: 0x0000_0001_0000_0000,
            prefetchable: false,
            wide: true
        })
    );
    assert_eq!(bus.bar(addr, 4).and_then(Bar::io_port), Some(0xC000));
    assert_eq!(bus.bar(addr, 5), None);
    assert_eq!(bus.bar(addr, 6), None);

    bus.enable(addr, CommandFlags::IO_SPACE | CommandFlags::BUS_MASTER);
    assert_eq!(bus.read_config(addr, offsets::COMMAND, AccessWidth::Word), 0x0005);
    // Status word untouched by the command write.
    assert_eq!(bus.read_config(addr, offsets::STATUS, AccessWidth::Word), 0x0280);
}

thread_local! {
    static MASKED: Cell<bool> = const { Cell::new(false) };
}

struct TestMask;

impl InterruptMask for TestMask {
    fn save_and_disable() -> bool {
        MASKED.with(|m| !m.replace(true))
    }

    fn restore(were_enabled: bool) {
        if were_enabled {
            MASKED.with(|m| m.set(false));
        }
    }
}

/// Records port traffic and answers data-port reads with the selector.
#[derive(Default)]
struct RecordingPorts {
    log: Vec<(u16, u32, bool)>,
    selected: u32,
}

impl PortIo for RecordingPorts {
    fn read8(&mut self, _port: u16) -> u8 {
        unreachable!()
    }

    fn read16(&mut self, _port: u16) -> u16 {
        unreachable!()
    }

    fn read32(&mut self, port: u16) -> u32 {
        assert_eq!(port, CONFIG_DATA_PORT);
        assert!(MASKED.with(Cell::get), "data access outside masked section");
        self.selected
    }

    fn write8(&mut self, _port: u16, _value: u8) {
        unreachable!()
    }

    fn write16(&mut self, _port: u16, _value: u16) {
        unreachable!()
    }

    fn write32(&mut self, port: u16, value: u32) {
        let masked = MASKED.with(Cell::get);
        if port == CONFIG_ADDRESS_PORT {
            self.selected = value;
        }
        self.log.push((port, value, masked));
    }
}

#[test]
fn port_mechanism_selects_then_accesses_under_mask() {
    let mut space = PortConfigSpace::<_, TestMask>::with_mask(RecordingPorts::default());
    let addr = bdf(1, 2, 3);

    assert_eq!(space.read_dword(addr, 0x10), 0x8001_1310);
    space.write_dword(addr, 0x3C, 0x0B);
    assert!(!MASKED.with(Cell::get));

    let ports = space.into_inner();
    assert_eq!(
        ports.log,
        vec![
            (CONFIG_ADDRESS_PORT, 0x8001_1310, true),
            (CONFIG_ADDRESS_PORT, 0x8001_133C, true),
            (CONFIG_DATA_PORT, 0x0B, true),
        ]
    );
}

/// One function whose command/status dword behaves like hardware: the
/// status half is write-one-to-clear, and the data port takes byte, word
/// and dword cycles on its four lanes.
struct StatusLatchPorts {
    selector: u32,
    command: u16,
    status: u16,
    cycles: Vec<(u16, u32)>,
}

impl StatusLatchPorts {
    fn with_status(status: u16) -> Self {
        Self {
            selector: 0,
            command: 0,
            status,
            cycles: Vec::new(),
        }
    }

    fn register(&self) -> u8 {
        self.selector.to_le_bytes()[0]
    }

    fn write_lane(&mut self, lane: u16, value: u16) {
        assert_eq!(self.register(), offsets::COMMAND);
        match lane {
            0 => self.command = value,
            2 => self.status &= !value,
            _ => unreachable!("unaligned word cycle"),
        }
    }
}

impl PortIo for StatusLatchPorts {
    fn read8(&mut self, _port: u16) -> u8 {
        unreachable!()
    }

    fn read16(&mut self, _port: u16) -> u16 {
        unreachable!()
    }

    fn read32(&mut self, port: u16) -> u32 {
        assert_eq!(port, CONFIG_DATA_PORT);
        if self.selector & 0x7FFF_FF00 != 0 {
            return 0xFFFF_FFFF;
        }
        match self.register() {
            0x00 => 0x7010_8086,
            0x04 => u32::from(self.command) | (u32::from(self.status) << 16),
            _ => 0,
        }
    }

    fn write8(&mut self, _port: u16, _value: u8) {
        unreachable!()
    }

    fn write16(&mut self, port: u16, value: u16) {
        self.cycles.push((port, u32::from(value)));
        self.write_lane(port - CONFIG_DATA_PORT, value);
    }

    fn write32(&mut self, port: u16, value: u32) {
        if port == CONFIG_ADDRESS_PORT {
            self.selector = value;
            return;
        }
        self.cycles.push((port, value));
        let [c0, c1, s0, s1] = value.to_le_bytes();
        self.write_lane(0, u16::from_le_bytes([c0, c1]));
        self.write_lane(2, u16::from_le_bytes([s0, s1]));
    }
}

const RECEIVED_MASTER_ABORT: u16 = 1 << 13;

#[test]
fn enabling_command_bits_leaves_latched_status_alone() {
    let ports = StatusLatchPorts::with_status(RECEIVED_MASTER_ABORT);
    let mut bus = PciBus::init(PortConfigSpace::<_, TestMask>::with_mask(ports));
    let addr = bdf(0, 0, 0);

    bus.enable(addr, CommandFlags::IO_SPACE);

    assert_eq!(bus.read_config(addr, offsets::COMMAND, AccessWidth::Word), 0x0001);
    assert_eq!(
        bus.read_config(addr, offsets::STATUS, AccessWidth::Word),
        u32::from(RECEIVED_MASTER_ABORT)
    );
    let ports = bus.into_inner().into_inner();
    assert_eq!(ports.cycles, vec![(CONFIG_DATA_PORT, 0x0001)]);
}

#[test]
fn status_word_write_clears_only_the_written_ones() {
    let ports = StatusLatchPorts::with_status(RECEIVED_MASTER_ABORT | 0x0010);
    let mut bus = PciBus::init(PortConfigSpace::<_, TestMask>::with_mask(ports));
    let addr = bdf(0, 0, 0);

    bus.write_config(addr, offsets::STATUS, AccessWidth::Word, u32::from(RECEIVED_MASTER_ABORT));

    assert_eq!(bus.read_config(addr, offsets::STATUS, AccessWidth::Word), 0x0010);
    let ports = bus.into_inner().into_inner();
    assert_eq!(
        ports.cycles,
        vec![(CONFIG_DATA_PORT + 2, u32::from(RECEIVED_MASTER_ABORT))]
    );
}
