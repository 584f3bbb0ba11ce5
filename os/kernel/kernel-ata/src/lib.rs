//! # ATA/IDE PIO Driver
//!
//! Polled, programmed-I/O access to up to four drives on the two legacy IDE
//! channels.
//!
//! ## Probing
//!
//! [`AtaController::init`] walks each channel through
//! `Reset → Identify Master → Identify Slave`. A slot that does not answer,
//! times out, or returns a malformed identification block stays empty and
//! probing moves on.
//!
//! ## Transfers
//!
//! [`AtaController::read_sectors`] and [`AtaController::write_sectors`] use
//! LBA28 commands, switching to LBA48 only when a request reaches past the
//! 28-bit range on a drive that supports it. Requests are split into
//! commands of at most 256 sectors. A drive-reported error aborts the request
//! immediately; nothing is retried.
//!
//! All status polling is bounded by
//! [`ATA_POLL_BUDGET`](kernel_info::config::ATA_POLL_BUDGET) reads.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod channel;
mod controller;
mod device;
mod error;
mod identify;
pub mod regs;

pub use channel::{ChannelId, IdeChannel};
pub use controller::AtaController;
pub use device::{DeviceKind, Drive, IdeDevice};
pub use error::AtaError;
pub use identify::{IdentifyData, MODEL_LEN};

/// Bytes per sector.
pub const SECTOR_SIZE: usize = 512;
