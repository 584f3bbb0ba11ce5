//! # PC Screen Font v2
//!
//! ```text
//! offset  field            (all u32, little endian)
//! 0x00    magic            0x864A_B572
//! 0x04    version          0
//! 0x08    header size      offset of the first glyph
//! 0x0C    flags            bit 0: a unicode table follows the glyphs
//! 0x10    glyph count
//! 0x14    bytes per glyph  height * ceil(width / 8)
//! 0x18    height
//! 0x1C    width
//! ```
//!
//! Glyph bitmaps are row-major, each row padded to whole bytes, most
//! significant bit leftmost. Glyphs are indexed by character code; the
//! unicode table is not consulted.

/// First four bytes of every PSF2 file.
pub const PSF2_MAGIC: u32 = 0x864A_B572;

/// Size of the fixed header.
pub const PSF2_HEADER_LEN: usize = 32;

#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FontError {
    #[error("not a PSF2 font (magic {0:#010x})")]
    BadMagic(u32),
    #[error("unsupported PSF2 version {0}")]
    UnsupportedVersion(u32),
    #[error("inconsistent PSF2 header")]
    BadHeader,
    #[error("font truncated: {have} bytes, {need} required")]
    Truncated { have: usize, need: usize },
}

/// A parsed, borrowed bitmap font.
#[derive(Debug, Copy, Clone)]
pub struct Font<'a> {
    glyphs: &'a [u8],
    count: usize,
    bytes_per_glyph: usize,
    bytes_per_row: usize,
    width: usize,
    height: usize,
}

fn header_word(data: &[u8], index: usize) -> u32 {
    let at = index * 4;
    u32::from_le_bytes(data[at..at + 4].try_into().unwrap_or_default())
}

fn to_usize(v: u32) -> Result<usize, FontError> {
    usize::try_from(v).map_err(|_| FontError::BadHeader)
}

impl<'a> Font<'a> {
    /// Validates the header and borrows the glyph table from `data`.
    pub fn parse(data: &'a [u8]) -> Result<Self, FontError> {
        if data.len() < PSF2_HEADER_LEN {
            return Err(FontError::Truncated {
                have: data.len(),
                need: PSF2_HEADER_LEN,
            });
        }

        let magic = header_word(data, 0);
        if magic != PSF2_MAGIC {
            return Err(FontError::BadMagic(magic));
        }
        let version = header_word(data, 1);
        if version != 0 {
            return Err(FontError::UnsupportedVersion(version));
        }

        let header_len = to_usize(header_word(data, 2))?;
        let count = to_usize(header_word(data, 4))?;
        let bytes_per_glyph = to_usize(header_word(data, 5))?;
        let height = to_usize(header_word(data, 6))?;
        let width = to_usize(header_word(data, 7))?;

        let bytes_per_row = width.div_ceil(8);
        if header_len < PSF2_HEADER_LEN
            || count == 0
            || width == 0
            || height == 0
            || bytes_per_glyph != bytes_per_row * height
        {
            return Err(FontError::BadHeader);
        }

        let need = count
            .checked_mul(bytes_per_glyph)
            .and_then(|n| n.checked_add(header_len))
            .ok_or(FontError::BadHeader)?;
        if data.len() < need {
            return Err(FontError::Truncated {
                have: data.len(),
                need,
            });
        }

        Ok(Self {
            glyphs: &data[header_len..need],
            count,
            bytes_per_glyph,
            bytes_per_row,
            width,
            height,
        })
    }

    /// Glyph width in pixels.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Glyph height in pixels.
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub const fn glyph_count(&self) -> usize {
        self.count
    }

    /// Bitmap of `code`, or of glyph 0 when the font has no such glyph.
    #[must_use]
    pub fn glyph(&self, code: u8) -> &'a [u8] {
        let index = usize::from(code);
        let index = if index < self.count { index } else { 0 };
        let at = index * self.bytes_per_glyph;
        &self.glyphs[at..at + self.bytes_per_glyph]
    }

    /// Whether pixel `(x, y)` of `code`'s glyph is set.
    #[must_use]
    pub fn is_set(&self, code: u8, x: usize, y: usize) -> bool {
        let row = &self.glyph(code)[y * self.bytes_per_row..];
        row[x / 8] & (0x80 >> (x % 8)) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A two-glyph 10x2 font: glyph 1 has its first and tenth column set.
    fn wide_font() -> Vec<u8> {
        let mut data = Vec::new();
        for word in [PSF2_MAGIC, 0, 32, 0, 2, 4, 2, 10] {
            data.extend_from_slice(&u32::to_le_bytes(word));
        }
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(&[0b1000_0000, 0b0100_0000, 0, 0]);
        data
    }

    #[test]
    fn reads_multi_byte_rows_msb_first() {
        let data = wide_font();
        let font = Font::parse(&data).unwrap();
        assert_eq!((font.width(), font.height(), font.glyph_count()), (10, 2, 2));

        let set: Vec<usize> = (0..10).filter(|&x| font.is_set(1, x, 0)).collect();
        assert_eq!(set, vec![0, 9]);
        assert!((0..10).all(|x| !font.is_set(1, x, 1)));
    }

    #[test]
    fn unknown_codes_fall_back_to_glyph_zero() {
        let data = wide_font();
        let font = Font::parse(&data).unwrap();
        assert_eq!(font.glyph(200), font.glyph(0));
        assert_ne!(font.glyph(1), font.glyph(0));
    }

    #[test]
    fn rejects_foreign_and_damaged_files() {
        let mut data = wide_font();
        assert_eq!(
            Font::parse(&data[..20]).unwrap_err(),
            FontError::Truncated { have: 20, need: 32 }
        );
        assert_eq!(
            Font::parse(&data[..38]).unwrap_err(),
            FontError::Truncated { have: 38, need: 40 }
        );

        data[20] = 3; // bytes per glyph no longer matches 2 rows of 2 bytes
        assert_eq!(Font::parse(&data).unwrap_err(), FontError::BadHeader);

        data[4] = 1;
        assert_eq!(Font::parse(&data).unwrap_err(), FontError::UnsupportedVersion(1));

        let psf1 = [0x36, 0x04, 0x02, 0x08];
        let mut blob = psf1.to_vec();
        blob.resize(64, 0);
        assert_eq!(Font::parse(&blob).unwrap_err(), FontError::BadMagic(0x0802_0436));
    }
}
