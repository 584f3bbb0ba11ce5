use bitflags::bitflags;

/// A raw scancode byte as delivered by the keyboard controller (set 1).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct KeyCode(pub u8);

impl KeyCode {
    /// Prefix byte announcing an extended key.
    pub const EXTENDED_PREFIX: u8 = 0xE0;

    /// Break codes have bit 7 set.
    #[must_use]
    pub const fn is_release(self) -> bool {
        self.0 & 0x80 != 0 && !self.is_extended_prefix()
    }

    #[must_use]
    pub const fn is_extended_prefix(self) -> bool {
        self.0 == Self::EXTENDED_PREFIX
    }

    /// The make code with the release bit stripped.
    #[must_use]
    pub const fn make_code(self) -> u8 {
        self.0 & 0x7F
    }
}

bitflags! {
    /// Buttons held during a mouse packet.
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
    pub struct MouseButtons: u8 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const MIDDLE = 1 << 2;
    }
}

/// Relative motion and button state of one mouse packet.
///
/// `dy` is positive when the mouse moves away from the user.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct MouseEvent {
    pub dx: i16,
    pub dy: i16,
    pub buttons: MouseButtons,
}
