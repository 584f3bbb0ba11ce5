/// The 16-colour VGA text palette, shared by the pixel and text paths.
///
/// The discriminant is the VGA attribute nibble.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGray = 7,
    DarkGray = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    Pink = 13,
    Yellow = 14,
    White = 15,
}

impl Color {
    /// RGB value of the colour as a VGA DAC shows it by default.
    #[must_use]
    pub const fn rgb(self) -> (u8, u8, u8) {
        match self {
            Self::Black => (0x00, 0x00, 0x00),
            Self::Blue => (0x00, 0x00, 0xAA),
            Self::Green => (0x00, 0xAA, 0x00),
            Self::Cyan => (0x00, 0xAA, 0xAA),
            Self::Red => (0xAA, 0x00, 0x00),
            Self::Magenta => (0xAA, 0x00, 0xAA),
            Self::Brown => (0xAA, 0x55, 0x00),
            Self::LightGray => (0xAA, 0xAA, 0xAA),
            Self::DarkGray => (0x55, 0x55, 0x55),
            Self::LightBlue => (0x55, 0x55, 0xFF),
            Self::LightGreen => (0x55, 0xFF, 0x55),
            Self::LightCyan => (0x55, 0xFF, 0xFF),
            Self::LightRed => (0xFF, 0x55, 0x55),
            Self::Pink => (0xFF, 0x55, 0xFF),
            Self::Yellow => (0xFF, 0xFF, 0x55),
            Self::White => (0xFF, 0xFF, 0xFF),
        }
    }

    /// VGA attribute byte: background in the high nibble.
    #[must_use]
    pub const fn attribute(fg: Self, bg: Self) -> u8 {
        ((bg as u8) << 4) | (fg as u8)
    }
}
