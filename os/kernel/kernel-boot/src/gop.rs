//! # Display Mode Selection

use kernel_info::config::GOP_MAX_HORIZONTAL_RESOLUTION;
use kernel_info::hardware::PixelFormat;

/// One display mode as reported by firmware.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ModeCandidate {
    /// Firmware mode number.
    pub index: usize,
    pub width: usize,
    pub height: usize,
    /// `Some` for the 32-bit RGB-reserved and BGR-reserved layouts; `None`
    /// for bitmask and blit-only modes.
    pub format: Option<PixelFormat>,
}

impl ModeCandidate {
    const fn acceptable(&self) -> bool {
        self.format.is_some()
            && self.width > 0
            && self.height > 0
            && self.width <= GOP_MAX_HORIZONTAL_RESOLUTION
    }
}

/// Picks the widest acceptable mode no wider than
/// [`GOP_MAX_HORIZONTAL_RESOLUTION`].
///
/// Equal widths go to the taller mode; fully equal resolutions to the lower
/// mode number.
pub fn select_mode<I>(modes: I) -> Option<ModeCandidate>
where
    I: IntoIterator<Item = ModeCandidate>,
{
    modes
        .into_iter()
        .filter(ModeCandidate::acceptable)
        .max_by(|a, b| {
            (a.width, a.height)
                .cmp(&(b.width, b.height))
                .then_with(|| b.index.cmp(&a.index))
        })
}
