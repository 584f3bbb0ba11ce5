use kernel_ata::{AtaController, AtaError, DeviceKind, Drive, IdeChannel, SECTOR_SIZE};
use kernel_ports::PortIo;
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

const BSY: u8 = 0x80;
const DRDY: u8 = 0x40;
const DRQ: u8 = 0x08;
const ERR: u8 = 0x01;

const ABRT: u8 = 0x04;
const IDNF: u8 = 0x10;
const UNC: u8 = 0x40;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Model {
    Ata,
    Atapi,
}

struct SimDrive {
    model: Model,
    name: &'static str,
    sectors: u64,
    lba: bool,
    lba48: bool,
    storage: BTreeMap<u64, [u8; SECTOR_SIZE]>,
    /// Never leaves BSY once a command arrives.
    hang: bool,
    /// Reading this sector fails with an uncorrectable error.
    bad_sector: Option<u64>,
    /// Status reads that report BSY after this drive is selected.
    select_delay: u32,
    commands: Vec<u8>,
}

impl SimDrive {
    fn disk(name: &'static str, sectors: u64) -> Self {
        Self {
            model: Model::Ata,
            name,
            sectors,
            lba: true,
            lba48: false,
            storage: BTreeMap::new(),
            hang: false,
            bad_sector: None,
            select_delay: 0,
            commands: Vec::new(),
        }
    }

    fn optical() -> Self {
        Self {
            model: Model::Atapi,
            ..Self::disk("QEMU DVD-ROM", 0)
        }
    }

    fn identify_block(&self) -> Vec<u16> {
        let mut words = vec![0u16; 256];
        words[0] = if self.model == Model::Atapi { 0x85C0 } else { 0x0040 };
        if self.lba {
            words[49] = 1 << 9;
        }
        let lba28 = self.sectors.min(0x0FFF_FFFF);
        words[60] = (lba28 & 0xFFFF) as u16;
        words[61] = (lba28 >> 16) as u16;
        if self.lba48 {
            words[83] = 1 << 10;
            for i in 0..4 {
                words[100 + i] = (self.sectors >> (16 * i)) as u16;
            }
        }
        let mut name = [b' '; 40];
        name[..self.name.len()].copy_from_slice(self.name.as_bytes());
        for (i, pair) in name.chunks_exact(2).enumerate() {
            words[27 + i] = u16::from_be_bytes([pair[0], pair[1]]);
        }
        words
    }

    fn sector(&self, lba: u64) -> [u8; SECTOR_SIZE] {
        self.storage.get(&lba).copied().unwrap_or([0; SECTOR_SIZE])
    }
}

enum Pending {
    None,
    Identify,
    Read { lba: u64, remaining: u64 },
    Write { lba: u64, remaining: u64, words: Vec<u16> },
}

/// Task file register: writes shift the current value into `previous`.
#[derive(Default, Clone, Copy)]
struct Fifo {
    current: u8,
    previous: u8,
}

impl Fifo {
    fn push(&mut self, v: u8) {
        self.previous = self.current;
        self.current = v;
    }
}

struct SimChannel {
    io_base: u16,
    control: u16,
    drives: [Option<SimDrive>; 2],
    selected: usize,
    select_reg: u8,
    count: Fifo,
    lba: [Fifo; 3],
    status: u8,
    error: u8,
    data: VecDeque<u16>,
    pending: Pending,
    control_writes: Vec<u8>,
    busy_reads: u32,
}

impl SimChannel {
    fn new(io_base: u16, control: u16, master: Option<SimDrive>, slave: Option<SimDrive>) -> Self {
        Self {
            io_base,
            control,
            drives: [master, slave],
            selected: 0,
            select_reg: 0xA0,
            count: Fifo::default(),
            lba: [Fifo::default(); 3],
            status: DRDY,
            error: 0,
            data: VecDeque::new(),
            pending: Pending::None,
            control_writes: Vec::new(),
            busy_reads: 0,
        }
    }

    fn floating(&self) -> bool {
        self.drives.iter().all(Option::is_none)
    }

    fn drive(&mut self) -> Option<&mut SimDrive> {
        self.drives[self.selected].as_mut()
    }

    fn read_status(&mut self) -> u8 {
        if self.floating() {
            return 0xFF;
        }
        if self.busy_reads > 0 {
            self.busy_reads -= 1;
            return BSY;
        }
        match self.drives[self.selected].as_ref() {
            None => 0,
            Some(d) if d.hang => BSY,
            Some(_) => self.status,
        }
    }

    fn abort(&mut self, error: u8) {
        self.status = DRDY | ERR;
        self.error = error;
        self.pending = Pending::None;
        self.data.clear();
    }

    fn load_sector(&mut self, lba: u64) {
        let Some(drive) = self.drives[self.selected].as_ref() else {
            return;
        };
        if drive.bad_sector == Some(lba) {
            self.abort(UNC);
            return;
        }
        let sector = drive.sector(lba);
        self.data.extend(sector.chunks_exact(2).map(|p| u16::from_le_bytes([p[0], p[1]])));
        self.status = DRDY | DRQ;
    }

    fn transfer_args(&self, ext: bool) -> (u64, u64) {
        if ext {
            let lba = [
                self.lba[0].current,
                self.lba[1].current,
                self.lba[2].current,
                self.lba[0].previous,
                self.lba[1].previous,
                self.lba[2].previous,
                0,
                0,
            ];
            let count = u64::from(u16::from_le_bytes([self.count.current, self.count.previous]));
            (u64::from_le_bytes(lba), if count == 0 { 65_536 } else { count })
        } else {
            let lba = u64::from(self.lba[0].current)
                | (u64::from(self.lba[1].current) << 8)
                | (u64::from(self.lba[2].current) << 16)
                | (u64::from(self.select_reg & 0x0F) << 24);
            let count = u64::from(self.count.current);
            (lba, if count == 0 { 256 } else { count })
        }
    }

    fn execute(&mut self, cmd: u8) {
        let Some(drive) = self.drive() else {
            return;
        };
        drive.commands.push(cmd);
        if drive.hang {
            return;
        }
        let (model, sectors, lba48) = (drive.model, drive.sectors, drive.lba48);

        match cmd {
            0xEC if model == Model::Ata => {
                let block = drive.identify_block();
                self.data = block.into();
                self.pending = Pending::Identify;
                self.status = DRDY | DRQ;
            }
            0xEC => {
                self.lba[1].push(0x14);
                self.lba[2].push(0xEB);
                self.abort(ABRT);
            }
            0xA1 if model == Model::Atapi => {
                let block = drive.identify_block();
                self.data = block.into();
                self.pending = Pending::Identify;
                self.status = DRDY | DRQ;
            }
            0x20 | 0x24 | 0x30 | 0x34 => {
                let ext = cmd & 0x04 != 0;
                if ext && !lba48 {
                    self.abort(ABRT);
                    return;
                }
                let (lba, count) = self.transfer_args(ext);
                if lba + count > sectors {
                    self.abort(IDNF);
                    return;
                }
                if cmd & 0x10 != 0 {
                    self.pending = Pending::Write {
                        lba,
                        remaining: count,
                        words: Vec::new(),
                    };
                    self.status = DRDY | DRQ;
                } else {
                    self.pending = Pending::Read {
                        lba,
                        remaining: count,
                    };
                    self.load_sector(lba);
                }
            }
            0xE7 | 0xEA => self.status = DRDY,
            _ => self.abort(ABRT),
        }
    }

    fn read_data(&mut self) -> u16 {
        let word = self.data.pop_front().unwrap_or(0);
        if !self.data.is_empty() {
            return word;
        }
        match self.pending {
            Pending::Read { lba, remaining } if remaining > 1 => {
                self.pending = Pending::Read {
                    lba: lba + 1,
                    remaining: remaining - 1,
                };
                self.load_sector(lba + 1);
            }
            _ => {
                self.pending = Pending::None;
                self.status = DRDY;
            }
        }
        word
    }

    fn write_data(&mut self, word: u16) {
        let Pending::Write {
            lba,
            remaining,
            words,
        } = &mut self.pending
        else {
            return;
        };
        words.push(word);
        if words.len() < SECTOR_SIZE / 2 {
            return;
        }
        let mut sector = [0u8; SECTOR_SIZE];
        for (dst, w) in sector.chunks_exact_mut(2).zip(words.drain(..)) {
            dst.copy_from_slice(&w.to_le_bytes());
        }
        let (at, left) = (*lba, *remaining - 1);
        *lba += 1;
        *remaining = left;
        if left == 0 {
            self.pending = Pending::None;
            self.status = DRDY;
        }
        if let Some(d) = self.drive() {
            d.storage.insert(at, sector);
        }
    }
}

struct SimBus {
    channels: [SimChannel; 2],
}

impl SimBus {
    fn new(primary: [Option<SimDrive>; 2], secondary: [Option<SimDrive>; 2]) -> Self {
        let [pm, ps] = primary;
        let [sm, ss] = secondary;
        Self {
            channels: [
                SimChannel::new(0x1F0, 0x3F6, pm, ps),
                SimChannel::new(0x170, 0x376, sm, ss),
            ],
        }
    }

    fn route(&mut self, port: u16) -> (&mut SimChannel, Option<u16>) {
        for ch in &mut self.channels {
            if port == ch.control {
                return (ch, None);
            }
            if (ch.io_base..ch.io_base + 8).contains(&port) {
                let reg = port - ch.io_base;
                return (ch, Some(reg));
            }
        }
        panic!("unexpected port {port:#x}");
    }

    fn drive(&self, channel: usize, slave: usize) -> &SimDrive {
        self.channels[channel].drives[slave].as_ref().unwrap()
    }
}

#[derive(Clone)]
struct SimPorts(Rc<RefCell<SimBus>>);

impl PortIo for SimPorts {
    fn read8(&mut self, port: u16) -> u8 {
        let mut bus = self.0.borrow_mut();
        let (ch, reg) = bus.route(port);
        match reg {
            None | Some(7) => ch.read_status(),
            Some(1) => ch.error,
            Some(2) => ch.count.current,
            Some(r @ 3..=5) => ch.lba[usize::from(r - 3)].current,
            Some(6) => ch.select_reg,
            Some(r) => panic!("byte read of register {r}"),
        }
    }

    fn read16(&mut self, port: u16) -> u16 {
        let mut bus = self.0.borrow_mut();
        let (ch, reg) = bus.route(port);
        assert_eq!(reg, Some(0), "word read outside the data register");
        ch.read_data()
    }

    fn read32(&mut self, port: u16) -> u32 {
        panic!("dword read of port {port:#x}");
    }

    fn write8(&mut self, port: u16, value: u8) {
        let mut bus = self.0.borrow_mut();
        let (ch, reg) = bus.route(port);
        if matches!(reg, Some(2..=5 | 7)) {
            assert_eq!(ch.busy_reads, 0, "register {reg:?} written while the drive is busy");
        }
        match reg {
            None => ch.control_writes.push(value),
            Some(1) => {}
            Some(2) => ch.count.push(value),
            Some(r @ 3..=5) => ch.lba[usize::from(r - 3)].push(value),
            Some(6) => {
                ch.select_reg = value;
                ch.selected = usize::from(value & 0x10 != 0);
                ch.busy_reads = ch.drives[ch.selected].as_ref().map_or(0, |d| d.select_delay);
            }
            Some(7) => ch.execute(value),
            Some(r) => panic!("byte write of register {r}"),
        }
    }

    fn write16(&mut self, port: u16, value: u16) {
        let mut bus = self.0.borrow_mut();
        let (ch, reg) = bus.route(port);
        assert_eq!(reg, Some(0), "word write outside the data register");
        ch.write_data(value);
    }

    fn write32(&mut self, port: u16, _value: u32) {
        panic!("dword write of port {port:#x}");
    }
}

fn controller(bus: SimBus) -> (AtaController<SimPorts>, Rc<RefCell<SimBus>>) {
    let shared = Rc::new(RefCell::new(bus));
    let ctrl = AtaController::init(SimPorts(Rc::clone(&shared)), IdeChannel::legacy_pair());
    (ctrl, shared)
}

fn pattern(sectors: usize, seed: u8) -> Vec<u8> {
    (0..sectors * SECTOR_SIZE)
        .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed) ^ ((i / SECTOR_SIZE) as u8))
        .collect()
}

#[test]
fn probes_all_slots_and_survives_unresponsive_drive() {
    let mut hung = SimDrive::disk("STUCK", 100);
    hung.hang = true;
    let (ctrl, bus) = controller(SimBus::new(
        [Some(SimDrive::disk("QEMU HARDDISK", 4096)), None],
        [Some(SimDrive::optical()), Some(hung)],
    ));

    let disk = ctrl.device(0).unwrap();
    assert_eq!(disk.kind, DeviceKind::Ata);
    assert_eq!(disk.drive, Drive::Master);
    assert_eq!(disk.model(), "QEMU HARDDISK");
    assert_eq!(disk.sectors(), 4096);
    assert_eq!(disk.identity.signature, 0x0040);

    assert!(ctrl.device(1).is_none());

    let optical = ctrl.device(2).unwrap();
    assert_eq!(optical.kind, DeviceKind::Atapi);
    assert_eq!(optical.model(), "QEMU DVD-ROM");

    assert!(ctrl.device(3).is_none(), "timed-out slot is absent");
    assert_eq!(ctrl.devices().count(), 2);

    // Interrupts end up masked on both channels.
    let bus = bus.borrow();
    for ch in &bus.channels {
        assert_eq!(ch.control_writes.last(), Some(&0x02));
    }
    assert_eq!(bus.drive(1, 0).commands, vec![0xEC, 0xA1]);
}

#[test]
fn floating_channels_report_nothing() {
    let (ctrl, _) = controller(SimBus::new([None, None], [None, None]));
    assert_eq!(ctrl.devices().count(), 0);
}

#[test]
fn round_trips_single_multi_and_full_device_transfers() {
    const SECTORS: u64 = 600;
    let (mut ctrl, bus) = controller(SimBus::new(
        [Some(SimDrive::disk("DISK", SECTORS)), None],
        [None, None],
    ));

    // 1 sector, 257 sectors (crosses the 256-per-command split), whole device.
    for (count, lba) in [(1u32, 7u64), (257, 100), (SECTORS as u32, 0)] {
        let data = pattern(count as usize, count as u8);
        ctrl.write_sectors(0, count, lba, &data).unwrap();

        let mut back = vec![0u8; data.len()];
        ctrl.read_sectors(0, count, lba, &mut back).unwrap();
        assert!(back == data, "mismatch for {count} sectors at {lba}");
    }

    let bus = bus.borrow();
    let cmds: Vec<u8> = bus.drive(0, 0).commands[1..].to_vec();
    assert_eq!(
        cmds,
        vec![
            0x30, 0xE7, 0x20, // 1 sector
            0x30, 0xE7, 0x30, 0xE7, 0x20, 0x20, // 257 = 256 + 1
            0x30, 0xE7, 0x30, 0xE7, 0x30, 0xE7, 0x20, 0x20, 0x20, // 600 = 256 + 256 + 88
        ]
    );
}

#[test]
fn switches_to_lba48_only_past_28_bits() {
    let mut big = SimDrive::disk("BIG", (1 << 28) + 64);
    big.lba48 = true;
    let (mut ctrl, bus) = controller(SimBus::new([None, Some(big)], [None, None]));
    assert_eq!(ctrl.device(1).unwrap().sectors(), (1 << 28) + 64);

    let data = pattern(4, 9);
    let lba = (1 << 28) - 2;
    ctrl.write_sectors(1, 4, lba, &data).unwrap();
    let mut back = vec![0u8; data.len()];
    ctrl.read_sectors(1, 4, lba, &mut back).unwrap();
    assert_eq!(back, data);

    ctrl.write_sectors(1, 1, 10, &data[..SECTOR_SIZE]).unwrap();

    let bus = bus.borrow();
    let drive = bus.drive(0, 1);
    assert_eq!(drive.commands[1..], [0x34, 0xEA, 0x24, 0x30, 0xE7]);
    assert_eq!(drive.storage[&((1 << 28) + 1)], data[3 * SECTOR_SIZE..]);
}

#[test]
fn rejects_invalid_requests_with_negative_codes() {
    let (mut ctrl, _) = controller(SimBus::new(
        [Some(SimDrive::disk("DISK", 16)), None],
        [Some(SimDrive::optical()), None],
    ));
    let mut buf = vec![0u8; 4 * SECTOR_SIZE];

    let cases = [
        (ctrl.read_sectors(1, 1, 0, &mut buf), AtaError::InvalidDevice(1), -1),
        (ctrl.read_sectors(9, 1, 0, &mut buf), AtaError::InvalidDevice(9), -1),
        (ctrl.read_sectors(0, 0, 0, &mut buf), AtaError::ZeroLength, -2),
        (
            ctrl.read_sectors(0, 5, 0, &mut buf),
            AtaError::BufferTooSmall {
                have: 4 * SECTOR_SIZE,
                need: 5 * SECTOR_SIZE,
            },
            -7,
        ),
        (
            ctrl.read_sectors(0, 2, 15, &mut buf),
            AtaError::OutOfRange {
                lba: 15,
                end: 17,
                sectors: 16,
            },
            -6,
        ),
        (ctrl.read_sectors(2, 1, 0, &mut buf), AtaError::Unsupported, -8),
    ];

    for (result, expected, code) in cases {
        let err = result.unwrap_err();
        assert_eq!(err, expected);
        assert_eq!(err.code(), code);
    }
    assert!(ctrl.device(0).unwrap().last_error.is_none());
}

#[test]
fn chs_only_drive_is_listed_but_not_transferable() {
    let mut old = SimDrive::disk("OLD", 32);
    old.lba = false;
    let (mut ctrl, _) = controller(SimBus::new([Some(old), None], [None, None]));
    let mut buf = vec![0u8; SECTOR_SIZE];
    assert_eq!(ctrl.read_sectors(0, 1, 0, &mut buf), Err(AtaError::Unsupported));
}

#[test]
fn drive_error_stops_transfer_and_is_recorded() {
    let mut disk = SimDrive::disk("DISK", 64);
    disk.bad_sector = Some(12);
    for lba in 0..64 {
        disk.storage.insert(lba, [lba as u8; SECTOR_SIZE]);
    }
    let (mut ctrl, bus) = controller(SimBus::new([Some(disk), None], [None, None]));

    let mut buf = vec![0xEEu8; 8 * SECTOR_SIZE];
    let err = ctrl.read_sectors(0, 8, 10, &mut buf).unwrap_err();
    assert_eq!(err, AtaError::DriveError(UNC));
    assert_eq!(err.code(), -3);
    assert_eq!(ctrl.device(0).unwrap().last_error, Some(AtaError::DriveError(UNC)));

    // Sectors before the bad one arrived; nothing after it was touched.
    assert!(buf[..SECTOR_SIZE].iter().all(|&b| b == 10));
    assert!(buf[SECTOR_SIZE..2 * SECTOR_SIZE].iter().all(|&b| b == 11));
    assert!(buf[2 * SECTOR_SIZE..].iter().all(|&b| b == 0xEE));

    // Not retried: exactly one read command was issued.
    let reads = bus.borrow().drive(0, 0).commands.iter().filter(|&&c| c == 0x20).count();
    assert_eq!(reads, 1);
}

#[test]
fn unresponsive_transfer_times_out() {
    let (mut ctrl, bus) = controller(SimBus::new(
        [Some(SimDrive::disk("DISK", 64)), None],
        [None, None],
    ));
    bus.borrow_mut().channels[0].drives[0].as_mut().unwrap().hang = true;

    let mut buf = vec![0u8; SECTOR_SIZE];
    assert_eq!(ctrl.read_sectors(0, 1, 0, &mut buf), Err(AtaError::Timeout));
    assert_eq!(ctrl.device(0).unwrap().last_error, Some(AtaError::Timeout));
}

#[test]
fn waits_for_a_newly_selected_drive_before_programming_it() {
    let (mut ctrl, bus) = controller(SimBus::new(
        [Some(SimDrive::disk("MASTER", 32)), Some(SimDrive::disk("SLAVE", 32))],
        [None, None],
    ));
    bus.borrow_mut().channels[0].drives[1].as_mut().unwrap().select_delay = 20;

    let data = pattern(1, 3);
    ctrl.write_sectors(0, 1, 0, &data).unwrap();
    ctrl.write_sectors(1, 1, 5, &data).unwrap();
    let mut back = vec![0u8; SECTOR_SIZE];
    ctrl.read_sectors(1, 1, 5, &mut back).unwrap();
    assert_eq!(back, data);

    let bus = bus.borrow();
    assert_eq!(bus.drive(0, 1).commands[1..], [0x30, 0xE7, 0x20]);
    assert_eq!(bus.drive(0, 1).storage[&5], data[..]);
}
