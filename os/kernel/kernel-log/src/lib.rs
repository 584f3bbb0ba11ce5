//! # Serial Logging
//!
//! A [`log`] backend for the kernel. Every record is formatted as
//!
//! ```text
//! [LEVEL] target: message
//! ```
//!
//! straight into the COM1 16550 UART, without allocating. With the `qemu`
//! feature (on by default) the same text is mirrored to QEMU's debug
//! console port `0x402`, which `-debugcon stdio` shows on the host.
//!
//! ## Setup
//!
//! ```rust,no_run
//! use kernel_log::SerialLogger;
//! use kernel_ports::RawPorts;
//! use log::{LevelFilter, info};
//!
//! // SAFETY: ring 0, nothing else drives COM1.
//! let ports = unsafe { RawPorts::new() };
//! SerialLogger::new(ports, LevelFilter::Info)
//!     .init()
//!     .expect("logger installed once");
//! info!("serial console up");
//! ```
//!
//! The UART is programmed for 115200 baud, 8 data bits, no parity, one stop
//! bit. Output waits a bounded time for the transmitter, so a machine
//! without a serial port does not stall.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod logger;
mod uart;

pub use logger::SerialLogger;
pub use uart::{BAUD_RATE, COM1, QEMU_DEBUGCON, TX_SPIN_BUDGET, Uart16550};
