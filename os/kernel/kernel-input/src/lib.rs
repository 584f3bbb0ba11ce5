//! # Input Event Buffers
//!
//! Interrupt handlers for the keyboard and mouse controllers push events
//! into fixed-capacity [`RingBuffer`]s; kernel code polls them.
//!
//! * A full buffer evicts its oldest entry; `push` never blocks or fails.
//! * Both sides mutate indices only inside a short interrupt-masked spin
//!   lock section, so a nested interrupt cannot observe a half-updated ring
//!   and a second core serializes on the lock.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod event;
mod mouse;
mod ring;

pub use event::{KeyCode, MouseButtons, MouseEvent};
pub use mouse::MousePacketDecoder;
pub use ring::RingBuffer;

use kernel_info::config::{KEYBOARD_BUFFER_CAPACITY, MOUSE_BUFFER_CAPACITY};

/// Keycodes from the keyboard ISR.
pub type KeyboardBuffer = RingBuffer<KeyCode, KEYBOARD_BUFFER_CAPACITY>;

/// Decoded packets from the mouse ISR.
pub type MouseBuffer = RingBuffer<MouseEvent, MOUSE_BUFFER_CAPACITY>;
