/// Value a Multiboot2 loader leaves in `eax` when it enters the kernel.
pub const MULTIBOOT2_BOOTLOADER_MAGIC: u32 = 0x36d7_6289;

/// How control reached the kernel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BootHandoff {
    /// A Multiboot2 loader; `info` is the physical address of the tag list.
    Multiboot2 { info: u64 },
    /// UEFI firmware.
    Uefi { image_handle: u64, system_table: u64 },
}

impl BootHandoff {
    /// Classifies the entry arguments.
    ///
    /// The Multiboot2 magic selects the legacy path with `arg0` as the info
    /// address; otherwise a non-null `(arg0, arg1)` pair is taken as
    /// `(image_handle, system_table)`. Anything else is `None`.
    #[must_use]
    pub const fn identify(magic: u32, arg0: u64, arg1: u64) -> Option<Self> {
        if magic == MULTIBOOT2_BOOTLOADER_MAGIC {
            if arg0 == 0 || !arg0.is_multiple_of(8) {
                return None;
            }
            return Some(Self::Multiboot2 { info: arg0 });
        }

        if arg0 != 0 && arg1 != 0 {
            return Some(Self::Uefi {
                image_handle: arg0,
                system_table: arg1,
            });
        }
        None
    }

    #[must_use]
    pub const fn protocol(&self) -> &'static str {
        match self {
            Self::Multiboot2 { .. } => "Multiboot2",
            Self::Uefi { .. } => "UEFI",
        }
    }
}
