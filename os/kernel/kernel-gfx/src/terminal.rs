use crate::backend::{self, BackendKind, BackendProbe, GraphicsDevice, PhysMapper};
use crate::color::Color;
use crate::font::Font;
use crate::vga::{self, TextBuffer, VGA_COLUMNS, VGA_ROWS, VgaCursor};
use kernel_info::config::TAB_WIDTH;
use kernel_ports::PortIo;
use log::warn;

/// Character-cell console over whichever backend is active.
///
/// Until [`Terminal::select_backend`] finds a pixel device, output goes to
/// VGA text memory and the CRTC cursor follows it.
pub struct Terminal<'a, P> {
    font: Option<Font<'a>>,
    device: Option<GraphicsDevice<'a>>,
    text: TextBuffer<'a>,
    cursor: VgaCursor<P>,
    selected: bool,
    col: usize,
    row: usize,
    cols: usize,
    rows: usize,
    fg: Color,
    bg: Color,
}

impl<'a, P: PortIo> Terminal<'a, P> {
    /// A text-mode terminal. Without a `font` no pixel backend can be used.
    pub const fn new(font: Option<Font<'a>>, text: TextBuffer<'a>, cursor_ports: P) -> Self {
        Self {
            font,
            device: None,
            text,
            cursor: VgaCursor::new(cursor_ports),
            selected: false,
            col: 0,
            row: 0,
            cols: VGA_COLUMNS,
            rows: VGA_ROWS,
            fg: Color::LightGray,
            bg: Color::Black,
        }
    }

    /// Runs the backend cascade once. Later calls return the outcome of the
    /// first without probing again.
    ///
    /// Selecting a device resizes the terminal to the device's character
    /// grid and clears it.
    pub fn select_backend(
        &mut self,
        probes: &mut [&mut dyn BackendProbe],
        mapper: &mut dyn PhysMapper,
    ) -> Option<&GraphicsDevice<'a>> {
        if self.selected {
            return self.device.as_ref();
        }
        self.selected = true;

        let Some(font) = self.font else {
            warn!("GFX: no font, staying in text mode");
            return None;
        };
        let device = backend::select_backend(probes, mapper)?;

        let cols = device.width() / font.width();
        let rows = device.height() / font.height();
        if cols == 0 || rows == 0 {
            warn!(
                "GFX: {}x{} display cannot hold a {}x{} glyph",
                device.width(),
                device.height(),
                font.width(),
                font.height()
            );
            return None;
        }

        self.device = Some(device);
        self.cols = cols;
        self.rows = rows;
        self.clear();
        self.device.as_ref()
    }

    #[must_use]
    pub fn backend(&self) -> BackendKind {
        self.device
            .as_ref()
            .map_or(BackendKind::TextFallback, GraphicsDevice::kind)
    }

    #[must_use]
    pub const fn device(&self) -> Option<&GraphicsDevice<'a>> {
        self.device.as_ref()
    }

    #[must_use]
    pub const fn text_buffer(&self) -> &TextBuffer<'a> {
        &self.text
    }

    /// `(columns, rows)` of the character grid.
    #[must_use]
    pub const fn dimensions(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    /// `(column, row)` the next character goes to.
    #[must_use]
    pub const fn position(&self) -> (usize, usize) {
        (self.col, self.row)
    }

    pub const fn set_colors(&mut self, fg: Color, bg: Color) {
        self.fg = fg;
        self.bg = bg;
    }

    /// Blanks the screen in the background colour and homes the cursor.
    pub fn clear(&mut self) {
        self.blank_rows(0, self.rows);
        self.col = 0;
        self.row = 0;
        self.update_cursor();
    }

    /// Renders `c` into cell `(col, row)` without moving the cursor.
    ///
    /// On a pixel device each glyph bit becomes a foreground (set) or
    /// background (clear) pixel, most significant bit leftmost.
    pub fn draw_char(&mut self, c: u8, col: usize, row: usize) {
        let (fg, bg) = (self.fg, self.bg);
        match (self.device.as_mut(), self.font.as_ref()) {
            (Some(device), Some(font)) => {
                let fb = device.framebuffer_mut();
                let (on, off) = (fb.pack_color(fg), fb.pack_color(bg));

                let (x0, y0) = (col * font.width(), row * font.height());
                for y in 0..font.height() {
                    for x in 0..font.width() {
                        let packed = if font.is_set(c, x, y) { on } else { off };
                        fb.put(x0 + x, y0 + y, packed);
                    }
                }
            }
            _ => self.text.write(col, row, vga::cell(c, fg, bg)),
        }
    }

    /// Writes one byte, interpreting `\n`, `\r` and `\t`.
    pub fn put_byte(&mut self, b: u8) {
        match b {
            b'\n' => {
                self.col = 0;
                self.row += 1;
            }
            b'\r' => self.col = 0,
            b'\t' => self.col += TAB_WIDTH,
            _ => {
                self.draw_char(b, self.col, self.row);
                self.col += 1;
            }
        }

        if self.col >= self.cols {
            self.col = 0;
            self.row += 1;
        }
        if self.row >= self.rows {
            let excess = self.row + 1 - self.rows;
            self.scroll(isize::try_from(excess).unwrap_or(isize::MAX));
            self.row = self.rows - 1;
        }
        self.update_cursor();
    }

    /// Moves the contents up by `n` rows (down for negative `n`), blanking
    /// the rows that scroll in. `|n|` of at least the row count clears.
    pub fn scroll(&mut self, n: isize) {
        let count = n.unsigned_abs();
        if count == 0 {
            return;
        }
        if count >= self.rows {
            self.blank_rows(0, self.rows);
            return;
        }

        let kept = self.rows - count;
        let (src, dst, blank) = if n > 0 {
            (count, 0, kept)
        } else {
            (0, count, 0)
        };
        self.move_rows(src, dst, kept);
        self.blank_rows(blank, count);
    }

    fn move_rows(&mut self, src: usize, dst: usize, count: usize) {
        match (self.device.as_mut(), self.font.as_ref()) {
            (Some(device), Some(font)) => {
                let h = font.height();
                device.framebuffer_mut().move_lines(src * h, dst * h, count * h);
            }
            _ => self.text.move_rows(src, dst, count),
        }
    }

    fn blank_rows(&mut self, first: usize, count: usize) {
        let (fg, bg) = (self.fg, self.bg);
        match (self.device.as_mut(), self.font.as_ref()) {
            (Some(device), Some(font)) => {
                let h = font.height();
                let fb = device.framebuffer_mut();
                let packed = fb.pack_color(bg);
                fb.fill_lines(first * h, count * h, packed);
            }
            _ => self.text.fill_rows(first, count, vga::cell(b' ', fg, bg)),
        }
    }

    fn update_cursor(&mut self) {
        if self.device.is_none() {
            let linear = self.row * VGA_COLUMNS + self.col;
            self.cursor.set(u16::try_from(linear).unwrap_or_default());
        }
    }
}

impl<P: PortIo> core::fmt::Write for Terminal<'_, P> {
    /// Non-ASCII characters are shown as `?`.
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for c in s.chars() {
            let b = u8::try_from(c).ok().filter(u8::is_ascii).unwrap_or(b'?');
            self.put_byte(b);
        }
        Ok(())
    }
}
