//! # VGA Text Mode
//!
//! 80x25 cells at physical `0xB8000`, each cell a `u16` of
//! `character | attribute << 8`, plus the CRT controller's cursor location
//! registers.

use crate::color::Color;
use kernel_ports::PortIo;

/// Physical address of the colour text buffer.
pub const VGA_TEXT_PHYS: u64 = 0xB8000;

pub const VGA_COLUMNS: usize = 80;
pub const VGA_ROWS: usize = 25;

/// CRT controller index register.
const CRTC_INDEX: u16 = 0x3D4;
/// CRT controller data register.
const CRTC_DATA: u16 = 0x3D5;
const CURSOR_LOCATION_HIGH: u8 = 0x0E;
const CURSOR_LOCATION_LOW: u8 = 0x0F;

/// Encodes a text cell.
#[must_use]
pub const fn cell(ch: u8, fg: Color, bg: Color) -> u16 {
    u16::from_le_bytes([ch, Color::attribute(fg, bg)])
}

/// The fixed-size text cell array.
pub struct TextBuffer<'a> {
    cells: &'a mut [u16],
}

impl<'a> TextBuffer<'a> {
    /// Wraps at least `80 * 25` cells; `None` if `cells` is shorter.
    #[must_use]
    pub fn new(cells: &'a mut [u16]) -> Option<Self> {
        let cells = cells.get_mut(..VGA_COLUMNS * VGA_ROWS)?;
        Some(Self { cells })
    }

    /// Wraps the text buffer at its physical alias.
    ///
    /// # Safety
    /// `0xB8000` must be mapped at `virt`, and nothing else may access the
    /// text buffer for `'a`.
    #[allow(unsafe_code)]
    #[must_use]
    pub unsafe fn at(virt: u64) -> Self {
        let cells = unsafe {
            core::slice::from_raw_parts_mut(virt as *mut u16, VGA_COLUMNS * VGA_ROWS)
        };
        Self { cells }
    }

    #[inline]
    pub fn write(&mut self, col: usize, row: usize, value: u16) {
        self.cells[row * VGA_COLUMNS + col] = value;
    }

    #[inline]
    #[must_use]
    pub fn read(&self, col: usize, row: usize) -> u16 {
        self.cells[row * VGA_COLUMNS + col]
    }

    /// Block-moves rows `src..src + count` to `dst`.
    pub fn move_rows(&mut self, src: usize, dst: usize, count: usize) {
        self.cells
            .copy_within(src * VGA_COLUMNS..(src + count) * VGA_COLUMNS, dst * VGA_COLUMNS);
    }

    pub fn fill_rows(&mut self, first: usize, count: usize, value: u16) {
        self.cells[first * VGA_COLUMNS..(first + count) * VGA_COLUMNS].fill(value);
    }
}

/// The CRTC hardware cursor.
pub struct VgaCursor<P> {
    ports: P,
}

impl<P: PortIo> VgaCursor<P> {
    pub const fn new(ports: P) -> Self {
        Self { ports }
    }

    /// Moves the blinking cursor to linear cell `position`.
    pub fn set(&mut self, position: u16) {
        let [low, high] = position.to_le_bytes();
        self.ports.write8(CRTC_INDEX, CURSOR_LOCATION_HIGH);
        self.ports.write8(CRTC_DATA, high);
        self.ports.write8(CRTC_INDEX, CURSOR_LOCATION_LOW);
        self.ports.write8(CRTC_DATA, low);
    }

    pub fn into_inner(self) -> P {
        self.ports
    }
}
