use crate::color::Color;
use kernel_info::hardware::PixelFormat;

/// A 32-bit linear framebuffer.
///
/// Pixel `(x, y)` lives at index `y * stride + x` of `pixels`.
pub struct Framebuffer<'a> {
    pixels: &'a mut [u32],
    width: usize,
    height: usize,
    stride: usize,
    format: PixelFormat,
}

impl core::fmt::Debug for Framebuffer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Framebuffer")
            .field("base", &self.pixels.as_ptr())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .field("format", &self.format)
            .finish()
    }
}

impl<'a> Framebuffer<'a> {
    /// Wraps `pixels`; `None` if it cannot hold `stride * height` pixels or
    /// the stride is narrower than a row.
    #[must_use]
    pub fn new(
        pixels: &'a mut [u32],
        width: usize,
        height: usize,
        stride: usize,
        format: PixelFormat,
    ) -> Option<Self> {
        if width == 0 || height == 0 || stride < width {
            return None;
        }
        let len = stride.checked_mul(height)?;
        let pixels = pixels.get_mut(..len)?;
        Some(Self {
            pixels,
            width,
            height,
            stride,
            format,
        })
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    #[must_use]
    pub const fn format(&self) -> PixelFormat {
        self.format
    }

    /// Packs a colour for this framebuffer's byte order.
    #[inline]
    #[must_use]
    pub fn pack(&self, r: u8, g: u8, b: u8) -> u32 {
        self.format.pack(r, g, b)
    }

    #[inline]
    #[must_use]
    pub fn pack_color(&self, color: Color) -> u32 {
        let (r, g, b) = color.rgb();
        self.format.pack(r, g, b)
    }

    /// Writes one pixel. No clipping: `x < width` and `y < height` are the
    /// caller's to uphold, and a coordinate past the end of the buffer panics.
    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, r: u8, g: u8, b: u8) {
        let packed = self.format.pack(r, g, b);
        self.put(x, y, packed);
    }

    #[inline]
    pub(crate) fn put(&mut self, x: usize, y: usize, packed: u32) {
        self.pixels[y * self.stride + x] = packed;
    }

    /// Packed value at `(x, y)`.
    #[must_use]
    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * self.stride + x]
    }

    /// Moves scanlines `src..src + count` to start at `dst` in one block
    /// copy. Ranges may overlap.
    pub fn move_lines(&mut self, src: usize, dst: usize, count: usize) {
        let start = src * self.stride;
        let end = (src + count) * self.stride;
        self.pixels.copy_within(start..end, dst * self.stride);
    }

    /// Fills scanlines `first..first + count` with `packed`.
    pub fn fill_lines(&mut self, first: usize, count: usize, packed: u32) {
        self.pixels[first * self.stride..(first + count) * self.stride].fill(packed);
    }
}
