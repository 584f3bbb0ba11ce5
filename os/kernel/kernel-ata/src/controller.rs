use crate::channel::{ChannelId, IdeChannel};
use crate::device::{DeviceKind, Drive, IdeDevice};
use crate::identify::IdentifyData;
use crate::regs::{ATAPI_SIGNATURES, DeviceControl, DriveSelect, Status, command, command_block};
use crate::{AtaError, SECTOR_SIZE};
use kernel_info::config::ATA_POLL_BUDGET;
use kernel_ports::PortIo;
use log::{debug, info, warn};

/// Sectors moved by one command; a sector count byte of 0 encodes 256.
const MAX_SECTORS_PER_COMMAND: u64 = 256;

/// First LBA that no longer fits into 28 bits.
const LBA28_LIMIT: u64 = 1 << 28;

enum Payload<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

/// Everything a transfer needs to know about its target.
#[derive(Copy, Clone)]
struct Target {
    channel: IdeChannel,
    slave: bool,
    lba48: bool,
}

/// Up to four probed drives behind the two IDE channels.
pub struct AtaController<P: PortIo> {
    ports: P,
    channels: [IdeChannel; 2],
    devices: [Option<IdeDevice>; 4],
}

impl<P: PortIo> AtaController<P> {
    /// Resets and probes both channels, master then slave.
    pub fn init(mut ports: P, channels: [IdeChannel; 2]) -> Self {
        let mut devices = [None, None, None, None];

        for id in ChannelId::BOTH {
            let channel = channels[id.index()];
            if !reset_channel(&channel, &mut ports) {
                info!("ATA: {id:?} channel: nothing attached");
                continue;
            }

            for drive in Drive::BOTH {
                let Some((kind, identity)) = identify(&channel, &mut ports, drive) else {
                    debug!("ATA: {id:?}/{drive:?}: absent");
                    continue;
                };

                let device = IdeDevice {
                    channel: id,
                    drive,
                    kind,
                    identity,
                    last_error: None,
                };
                info!(
                    "ATA: {id:?}/{drive:?}: {kind:?} \"{}\", {} sectors",
                    device.model(),
                    device.sectors()
                );
                let slot = device.slot();
                devices[slot] = Some(device);
            }
        }

        Self {
            ports,
            channels,
            devices,
        }
    }

    #[must_use]
    pub const fn channels(&self) -> &[IdeChannel; 2] {
        &self.channels
    }

    /// The device in `slot` (`0..4`), if one was found there.
    #[must_use]
    pub fn device(&self, slot: usize) -> Option<&IdeDevice> {
        self.devices.get(slot).and_then(Option::as_ref)
    }

    pub fn devices(&self) -> impl Iterator<Item = &IdeDevice> {
        self.devices.iter().flatten()
    }

    /// Reads `count` sectors starting at `lba` into `buffer`.
    pub fn read_sectors(
        &mut self,
        device: usize,
        count: u32,
        lba: u64,
        buffer: &mut [u8],
    ) -> Result<(), AtaError> {
        self.transfer(device, count, lba, Payload::Read(buffer))
    }

    /// Writes `count` sectors starting at `lba` from `buffer`, flushing the
    /// drive's write cache after each command.
    pub fn write_sectors(
        &mut self,
        device: usize,
        count: u32,
        lba: u64,
        buffer: &[u8],
    ) -> Result<(), AtaError> {
        self.transfer(device, count, lba, Payload::Write(buffer))
    }

    fn transfer(
        &mut self,
        slot: usize,
        count: u32,
        lba: u64,
        payload: Payload<'_>,
    ) -> Result<(), AtaError> {
        let target = self.validate(slot, count, lba, &payload)?;
        let result = run(&mut self.ports, target, u64::from(count), lba, payload);

        if let Err(e) = result {
            warn!("ATA: slot {slot}: transfer at LBA {lba} failed: {e}");
            if let Some(dev) = self.devices.get_mut(slot).and_then(Option::as_mut) {
                dev.last_error = Some(e);
            }
        }
        result
    }

    fn validate(
        &self,
        slot: usize,
        count: u32,
        lba: u64,
        payload: &Payload<'_>,
    ) -> Result<Target, AtaError> {
        let dev = self.device(slot).ok_or(AtaError::InvalidDevice(slot))?;
        if count == 0 {
            return Err(AtaError::ZeroLength);
        }

        let need = usize::try_from(count)
            .unwrap_or(usize::MAX)
            .saturating_mul(SECTOR_SIZE);
        let have = match payload {
            Payload::Read(b) => b.len(),
            Payload::Write(b) => b.len(),
        };
        if have < need {
            return Err(AtaError::BufferTooSmall { have, need });
        }

        if dev.kind != DeviceKind::Ata || !dev.identity.supports_lba() {
            return Err(AtaError::Unsupported);
        }

        let end = lba.saturating_add(u64::from(count));
        if end > dev.sectors() {
            return Err(AtaError::OutOfRange {
                lba,
                end,
                sectors: dev.sectors(),
            });
        }

        let lba48 = end > LBA28_LIMIT;
        if lba48 && !dev.identity.supports_lba48() {
            return Err(AtaError::Unsupported);
        }

        Ok(Target {
            channel: self.channels[dev.channel.index()],
            slave: dev.drive.is_slave(),
            lba48,
        })
    }
}

/// Soft-resets a channel and masks its interrupts.
///
/// Returns `false` for a floating bus or a channel that stays busy.
fn reset_channel<P: PortIo>(channel: &IdeChannel, ports: &mut P) -> bool {
    let control = if channel.interrupts_disabled {
        DeviceControl::NIEN
    } else {
        DeviceControl::empty()
    };

    ports.write8(channel.control, (control | DeviceControl::SRST).bits());
    channel.settle(ports);
    ports.write8(channel.control, control.bits());
    channel.settle(ports);

    if channel.alt_status(ports) == Status::FLOATING {
        return false;
    }
    channel.wait_not_busy(ports).is_some()
}

/// Runs IDENTIFY (falling back to IDENTIFY PACKET) against one drive slot.
fn identify<P: PortIo>(
    channel: &IdeChannel,
    ports: &mut P,
    drive: Drive,
) -> Option<(DeviceKind, IdentifyData)> {
    let select = DriveSelect::new().with_slave(drive.is_slave());
    channel.write_reg(ports, command_block::DRIVE_SELECT, select.into_bits());
    channel.settle(ports);

    for reg in [
        command_block::SECTOR_COUNT,
        command_block::LBA_LOW,
        command_block::LBA_MID,
        command_block::LBA_HIGH,
    ] {
        channel.write_reg(ports, reg, 0);
    }
    channel.write_reg(ports, command_block::STATUS, command::IDENTIFY);
    channel.settle(ports);

    if channel.status(ports).is_empty() {
        return None;
    }
    let status = channel.wait_not_busy(ports)?;

    let signature = (
        channel.read_reg(ports, command_block::LBA_MID),
        channel.read_reg(ports, command_block::LBA_HIGH),
    );
    let kind = if ATAPI_SIGNATURES.contains(&signature) {
        channel.write_reg(ports, command_block::STATUS, command::IDENTIFY_PACKET);
        channel.settle(ports);
        channel.wait_not_busy(ports)?;
        DeviceKind::Atapi
    } else if status.contains(Status::ERR) || signature != (0, 0) {
        debug!("ATA: IDENTIFY aborted, signature {signature:02x?}");
        return None;
    } else {
        DeviceKind::Ata
    };

    wait_data(channel, ports).ok()?;
    let mut block = [0u16; 256];
    for word in &mut block {
        *word = ports.read16(channel.io_base + command_block::DATA);
    }

    let identity = IdentifyData::parse(&block);
    if identity.is_none() {
        warn!("ATA: {drive:?}: malformed identification block");
    }
    identity.map(|id| (kind, id))
}

/// Polls until the selected drive is idle with DRDY set.
fn wait_ready<P: PortIo>(channel: &IdeChannel, ports: &mut P) -> Result<(), AtaError> {
    for _ in 0..ATA_POLL_BUDGET {
        let status = channel.status(ports);
        if status.contains(Status::BSY) {
            continue;
        }
        if status.contains(Status::DF) {
            return Err(AtaError::DeviceFault);
        }
        if status.contains(Status::DRDY) {
            return Ok(());
        }
    }
    Err(AtaError::Timeout)
}

/// Polls until the drive requests data, or reports why it will not.
fn wait_data<P: PortIo>(channel: &IdeChannel, ports: &mut P) -> Result<(), AtaError> {
    for _ in 0..ATA_POLL_BUDGET {
        let status = channel.status(ports);
        if status.contains(Status::BSY) {
            continue;
        }
        if status.contains(Status::ERR) {
            return Err(AtaError::DriveError(
                channel.read_reg(ports, command_block::ERROR),
            ));
        }
        if status.contains(Status::DF) {
            return Err(AtaError::DeviceFault);
        }
        if status.contains(Status::DRQ) {
            return Ok(());
        }
    }
    Err(AtaError::Timeout)
}

fn run<P: PortIo>(
    ports: &mut P,
    target: Target,
    count: u64,
    lba: u64,
    mut payload: Payload<'_>,
) -> Result<(), AtaError> {
    let channel = target.channel;
    let data_port = channel.io_base + command_block::DATA;
    let mut done = 0u64;

    while done < count {
        let sectors = (count - done).min(MAX_SECTORS_PER_COMMAND);
        let op = match (&payload, target.lba48) {
            (Payload::Read(_), false) => command::READ_SECTORS,
            (Payload::Read(_), true) => command::READ_SECTORS_EXT,
            (Payload::Write(_), false) => command::WRITE_SECTORS,
            (Payload::Write(_), true) => command::WRITE_SECTORS_EXT,
        };
        issue(ports, target, lba + done, sectors, op)?;

        for sector in done..done + sectors {
            channel.settle(ports);
            wait_data(&channel, ports)?;

            let offset = usize::try_from(sector).unwrap_or(usize::MAX) * SECTOR_SIZE;
            match &mut payload {
                Payload::Read(buf) => {
                    for pair in buf[offset..offset + SECTOR_SIZE].chunks_exact_mut(2) {
                        pair.copy_from_slice(&ports.read16(data_port).to_le_bytes());
                    }
                }
                Payload::Write(buf) => {
                    for pair in buf[offset..offset + SECTOR_SIZE].chunks_exact(2) {
                        ports.write16(data_port, u16::from_le_bytes([pair[0], pair[1]]));
                    }
                }
            }
        }

        if matches!(payload, Payload::Write(_)) {
            flush(ports, target)?;
        }
        done += sectors;
    }

    Ok(())
}

/// Programs drive select, count and address registers and issues `op`.
fn issue<P: PortIo>(
    ports: &mut P,
    target: Target,
    lba: u64,
    sectors: u64,
    op: u8,
) -> Result<(), AtaError> {
    let channel = target.channel;
    // Drive select is ignored while the channel is busy.
    channel.wait_not_busy(ports).ok_or(AtaError::Timeout)?;

    let [l0, l1, l2, l3, l4, l5, _, _] = lba.to_le_bytes();
    let [c0, c1, ..] = sectors.to_le_bytes();

    let mut select = DriveSelect::new().with_lba(true).with_slave(target.slave);
    if !target.lba48 {
        select = select.with_lba_high(l3 & 0x0F);
    }
    channel.write_reg(ports, command_block::DRIVE_SELECT, select.into_bits());
    channel.settle(ports);
    wait_ready(&channel, ports)?;

    if target.lba48 {
        // High-order bytes first; the registers are two-deep FIFOs.
        channel.write_reg(ports, command_block::SECTOR_COUNT, c1);
        channel.write_reg(ports, command_block::LBA_LOW, l3);
        channel.write_reg(ports, command_block::LBA_MID, l4);
        channel.write_reg(ports, command_block::LBA_HIGH, l5);
    }
    channel.write_reg(ports, command_block::SECTOR_COUNT, c0);
    channel.write_reg(ports, command_block::LBA_LOW, l0);
    channel.write_reg(ports, command_block::LBA_MID, l1);
    channel.write_reg(ports, command_block::LBA_HIGH, l2);
    channel.write_reg(ports, command_block::STATUS, op);
    Ok(())
}

fn flush<P: PortIo>(ports: &mut P, target: Target) -> Result<(), AtaError> {
    let channel = target.channel;
    let op = if target.lba48 {
        command::CACHE_FLUSH_EXT
    } else {
        command::CACHE_FLUSH
    };
    channel.write_reg(ports, command_block::STATUS, op);
    channel.settle(ports);

    let status = channel.wait_not_busy(ports).ok_or(AtaError::Timeout)?;
    if status.contains(Status::ERR) {
        return Err(AtaError::DriveError(
            channel.read_reg(ports, command_block::ERROR),
        ));
    }
    if status.contains(Status::DF) {
        return Err(AtaError::DeviceFault);
    }
    Ok(())
}
