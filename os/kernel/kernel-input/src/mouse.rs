use crate::event::{MouseButtons, MouseEvent};
use bitflags::bitflags;

bitflags! {
    /// First byte of a standard PS/2 mouse packet.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    struct PacketFlags: u8 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const MIDDLE = 1 << 2;
        const ALWAYS_ONE = 1 << 3;
        const X_SIGN = 1 << 4;
        const Y_SIGN = 1 << 5;
        const X_OVERFLOW = 1 << 6;
        const Y_OVERFLOW = 1 << 7;
    }
}

/// Reassembles 3-byte PS/2 mouse packets from the byte stream the mouse ISR
/// reads off port 0x60.
#[derive(Debug, Default)]
pub struct MousePacketDecoder {
    bytes: [u8; 3],
    index: usize,
}

impl MousePacketDecoder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            bytes: [0; 3],
            index: 0,
        }
    }

    /// Feeds one byte; returns an event once a packet is complete.
    ///
    /// A first byte without the always-one bit cannot start a packet and is
    /// discarded, which resynchronizes the stream after a lost byte.
    pub fn feed(&mut self, byte: u8) -> Option<MouseEvent> {
        if self.index == 0 && byte & PacketFlags::ALWAYS_ONE.bits() == 0 {
            log::trace!("mouse: dropping unaligned byte {byte:#04x}");
            return None;
        }

        self.bytes[self.index] = byte;
        self.index += 1;
        if self.index < self.bytes.len() {
            return None;
        }

        self.index = 0;
        Some(Self::decode(self.bytes))
    }

    fn decode([flags, x, y]: [u8; 3]) -> MouseEvent {
        let flags = PacketFlags::from_bits_retain(flags);
        let buttons = MouseButtons::from_bits_truncate(flags.bits());

        if flags.intersects(PacketFlags::X_OVERFLOW | PacketFlags::Y_OVERFLOW) {
            return MouseEvent {
                dx: 0,
                dy: 0,
                buttons,
            };
        }

        MouseEvent {
            dx: sign_extend(x, flags.contains(PacketFlags::X_SIGN)),
            dy: sign_extend(y, flags.contains(PacketFlags::Y_SIGN)),
            buttons,
        }
    }
}

/// Applies the 9th (sign) bit carried in the flags byte.
fn sign_extend(value: u8, negative: bool) -> i16 {
    let v = i16::from(value);
    if negative { v - 0x100 } else { v }
}
