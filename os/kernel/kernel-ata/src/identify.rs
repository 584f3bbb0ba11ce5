/// Length of the model string in bytes.
pub const MODEL_LEN: usize = 40;

mod words {
    pub const GENERAL_CONFIG: usize = 0;
    pub const MODEL: usize = 27;
    pub const CAPABILITIES: usize = 49;
    pub const LBA28_SECTORS: usize = 60;
    pub const COMMAND_SETS: usize = 82;
    pub const LBA48_SECTORS: usize = 100;
}

/// Capabilities (word 49): LBA supported.
const CAP_LBA: u16 = 1 << 9;

/// Command sets (words 82-83, word 83 in the upper half): 48-bit addressing.
const CMD_LBA48: u32 = 1 << (16 + 10);

/// Fields extracted from a 256-word IDENTIFY (PACKET) DEVICE block.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct IdentifyData {
    /// General configuration, word 0.
    pub signature: u16,
    /// Capabilities, word 49.
    pub capabilities: u16,
    /// Supported command sets, word 82 in bits 0-15 and word 83 in bits 16-31.
    pub command_sets: u32,
    /// Addressable sectors.
    pub sectors: u64,
    /// Model string, ASCII, space padded.
    pub model: [u8; MODEL_LEN],
}

impl IdentifyData {
    /// Parses an identification block.
    ///
    /// Returns `None` for a block of all zeros or all ones, which is what a
    /// slot that never really answered leaves behind.
    #[must_use]
    pub fn parse(block: &[u16; 256]) -> Option<Self> {
        if block.iter().all(|&w| w == 0) || block.iter().all(|&w| w == 0xFFFF) {
            return None;
        }

        let command_sets = u32::from(block[words::COMMAND_SETS])
            | (u32::from(block[words::COMMAND_SETS + 1]) << 16);

        let sectors = if command_sets & CMD_LBA48 != 0 {
            block[words::LBA48_SECTORS..words::LBA48_SECTORS + 4]
                .iter()
                .rev()
                .fold(0u64, |acc, &w| (acc << 16) | u64::from(w))
        } else {
            u64::from(block[words::LBA28_SECTORS])
                | (u64::from(block[words::LBA28_SECTORS + 1]) << 16)
        };

        // Each word carries two characters, first one in the high byte.
        let mut model = [0u8; MODEL_LEN];
        for (pair, &word) in model
            .chunks_exact_mut(2)
            .zip(&block[words::MODEL..words::MODEL + MODEL_LEN / 2])
        {
            pair.copy_from_slice(&word.to_be_bytes());
        }

        Some(Self {
            signature: block[words::GENERAL_CONFIG],
            capabilities: block[words::CAPABILITIES],
            command_sets,
            sectors,
            model,
        })
    }

    #[must_use]
    pub const fn supports_lba(&self) -> bool {
        self.capabilities & CAP_LBA != 0
    }

    #[must_use]
    pub const fn supports_lba48(&self) -> bool {
        self.command_sets & CMD_LBA48 != 0
    }

    /// The model with trailing padding removed.
    #[must_use]
    pub fn model_str(&self) -> &str {
        let s = core::str::from_utf8(&self.model).unwrap_or_default();
        s.trim_end_matches([' ', '\0'])
    }
}
