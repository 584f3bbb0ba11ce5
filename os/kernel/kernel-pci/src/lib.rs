//! # PCI Bus Enumerator
//!
//! Configuration-space access through mechanism #1 (ports `0xCF8`/`0xCFC`)
//! and lazy, cursor-driven enumeration of present functions.
//!
//! Nothing is cached: every [`PciDeviceRecord`] is re-read from
//! configuration space when asked for.
//!
//! ```no_run
//! use kernel_pci::{PciBus, PciCursor, PortConfigSpace};
//! use kernel_ports::RawPorts;
//!
//! let mut bus = PciBus::init(PortConfigSpace::new(unsafe { RawPorts::new() }));
//! let mut cursor = PciCursor::new();
//! while let Some(addr) = bus.find_by_class(0x01, 0x01, &mut cursor) {
//!     // every IDE controller, in ascending (bus, device, function) order
//! #   let _ = addr;
//! }
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod address;
mod bus;
mod config;
mod device;

pub use address::{PciAddress, PciCursor};
pub use bus::{Devices, PciBus};
pub use config::{AccessWidth, CONFIG_ADDRESS_PORT, CONFIG_DATA_PORT, ConfigSpace, PortConfigSpace};
pub use device::{Bar, CommandFlags, PciDeviceRecord, offsets};

/// Vendor id read from an address with no function behind it.
pub const NO_DEVICE: u16 = 0xFFFF;
