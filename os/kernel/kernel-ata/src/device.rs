use crate::AtaError;
use crate::channel::ChannelId;
use crate::identify::IdentifyData;

/// Drive position on a channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Drive {
    Master,
    Slave,
}

impl Drive {
    pub const BOTH: [Self; 2] = [Self::Master, Self::Slave];

    #[must_use]
    pub const fn is_slave(self) -> bool {
        matches!(self, Self::Slave)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DeviceKind {
    /// Plain ATA disk.
    Ata,
    /// Packet device (typically optical).
    Atapi,
}

/// A drive that answered IDENTIFY during probing.
#[derive(Debug, Clone)]
pub struct IdeDevice {
    pub channel: ChannelId,
    pub drive: Drive,
    pub kind: DeviceKind,
    pub identity: IdentifyData,
    /// Error of the last failed transfer, if any.
    pub last_error: Option<AtaError>,
}

impl IdeDevice {
    /// Slot index `0..4`: channel-major, master before slave.
    #[must_use]
    pub fn slot(&self) -> usize {
        self.channel.index() * 2 + usize::from(self.drive.is_slave())
    }

    #[must_use]
    pub const fn sectors(&self) -> u64 {
        self.identity.sectors
    }

    #[must_use]
    pub fn model(&self) -> &str {
        self.identity.model_str()
    }
}
