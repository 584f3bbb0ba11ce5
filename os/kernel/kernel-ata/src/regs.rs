//! # ATA Register Layout

use bitfield_struct::bitfield;
use bitflags::bitflags;

/// Offsets from a channel's command block base.
pub mod command_block {
    pub const DATA: u16 = 0;
    /// Error on read, features on write.
    pub const ERROR: u16 = 1;
    pub const SECTOR_COUNT: u16 = 2;
    pub const LBA_LOW: u16 = 3;
    pub const LBA_MID: u16 = 4;
    pub const LBA_HIGH: u16 = 5;
    pub const DRIVE_SELECT: u16 = 6;
    /// Status on read, command on write.
    pub const STATUS: u16 = 7;
}

/// Command opcodes.
pub mod command {
    pub const READ_SECTORS: u8 = 0x20;
    pub const READ_SECTORS_EXT: u8 = 0x24;
    pub const WRITE_SECTORS: u8 = 0x30;
    pub const WRITE_SECTORS_EXT: u8 = 0x34;
    pub const IDENTIFY_PACKET: u8 = 0xA1;
    pub const CACHE_FLUSH: u8 = 0xE7;
    pub const CACHE_FLUSH_EXT: u8 = 0xEA;
    pub const IDENTIFY: u8 = 0xEC;
}

bitflags! {
    /// Status register (also mirrored by alternate status).
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct Status: u8 {
        const ERR = 1 << 0;
        const IDX = 1 << 1;
        const CORR = 1 << 2;
        const DRQ = 1 << 3;
        const SRV = 1 << 4;
        const DF = 1 << 5;
        const DRDY = 1 << 6;
        const BSY = 1 << 7;
    }
}

impl Status {
    /// Value read from a channel with nothing attached (pulled-up bus).
    pub const FLOATING: Self = Self::all();
}

bitflags! {
    /// Device control register (write side of alternate status).
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct DeviceControl: u8 {
        /// Disable device interrupts.
        const NIEN = 1 << 1;
        /// Software reset of both drives.
        const SRST = 1 << 2;
        /// Read back the previously written high-order LBA48 bytes.
        const HOB = 1 << 7;
    }
}

/// Drive/head register.
#[bitfield(u8, order = Lsb)]
pub struct DriveSelect {
    /// LBA bits 24-27 in LBA28 mode.
    #[bits(4)]
    pub lba_high: u8,

    /// `false` = master, `true` = slave.
    pub slave: bool,

    #[bits(default = true)]
    _obsolete5: bool,

    /// Address in LBA rather than CHS.
    pub lba: bool,

    #[bits(default = true)]
    _obsolete7: bool,
}

/// LBA mid/high after reset or an aborted IDENTIFY on a packet device.
pub const ATAPI_SIGNATURES: [(u8, u8); 2] = [(0x14, 0xEB), (0x69, 0x96)];
