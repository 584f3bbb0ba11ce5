/// Why a transfer was refused or failed.
///
/// [`AtaError::code`] gives each variant a stable negative code for callers
/// that report errors numerically.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AtaError {
    #[error("no device in slot {0}")]
    InvalidDevice(usize),
    #[error("zero-length request")]
    ZeroLength,
    #[error("drive reported an error (error register {0:#04x})")]
    DriveError(u8),
    #[error("drive fault")]
    DeviceFault,
    #[error("drive did not respond in time")]
    Timeout,
    #[error("sectors {lba}..{end} beyond the end of a {sectors}-sector device")]
    OutOfRange { lba: u64, end: u64, sectors: u64 },
    #[error("buffer holds {have} bytes, {need} required")]
    BufferTooSmall { have: usize, need: usize },
    #[error("operation not supported by this device")]
    Unsupported,
}

impl AtaError {
    #[must_use]
    pub const fn code(&self) -> i32 {
        match self {
            Self::InvalidDevice(_) => -1,
            Self::ZeroLength => -2,
            Self::DriveError(_) => -3,
            Self::DeviceFault => -4,
            Self::Timeout => -5,
            Self::OutOfRange { .. } => -6,
            Self::BufferTooSmall { .. } => -7,
            Self::Unsupported => -8,
        }
    }
}
