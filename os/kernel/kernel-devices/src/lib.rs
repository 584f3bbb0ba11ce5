//! # Device Context
//!
//! Owns every driver the device layer brings up and wires them together in
//! a fixed order:
//!
//! 1. **PCI**: the configuration space is opened and every present
//!    function is logged.
//! 2. **Graphics**: the backend cascade runs before the terminal prints
//!    anything, so the first line already lands on the final output.
//! 3. **Storage**: the IDE channel ports come from the PCI IDE controller
//!    when there is one, then all four drive slots are probed.
//! 4. **Input**: the keyboard and mouse ring buffers are created empty.
//!
//! A device that does not come up is left out and logged; nothing here
//! halts. Instead of global singletons the kernel holds one
//! [`DeviceContext`] and hands out references to its parts.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod context;

pub use context::{DeviceContext, KeyboardRing, MouseRing};
