//! # Hardware Description

use crate::memory::{MemoryMap, MemoryRegion};

/// Byte order of a 32-bit framebuffer pixel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PixelFormat {
    /// Bytes R, G, B, reserved from low to high address.
    Rgb,
    /// Bytes B, G, R, reserved from low to high address.
    Bgr,
}

impl PixelFormat {
    /// Packs a color into the little-endian `u32` stored in the framebuffer.
    #[inline]
    #[must_use]
    pub fn pack(self, r: u8, g: u8, b: u8) -> u32 {
        let (lo, hi) = match self {
            Self::Rgb => (r, b),
            Self::Bgr => (b, r),
        };
        u32::from(lo) | (u32::from(g) << 8) | (u32::from(hi) << 16)
    }
}

/// Who established the framebuffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FramebufferSource {
    /// UEFI Graphics Output Protocol, mode chosen by the kernel.
    UefiGop,
    /// Multiboot2 framebuffer tag, mode chosen by the boot loader.
    Multiboot,
}

/// A linear framebuffer set up before the kernel took over.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FramebufferDescriptor {
    /// Physical base address.
    pub base: u64,
    /// Size of the mapping in bytes.
    pub size: u64,
    /// Visible width in pixels.
    pub width: u32,
    /// Visible height in pixels.
    pub height: u32,
    /// Pixels per scanline; `>= width`.
    pub stride: u32,
    pub bits_per_pixel: u8,
    pub format: PixelFormat,
    pub source: FramebufferSource,
}

impl FramebufferDescriptor {
    /// Bytes covered by `stride * height` 32-bit pixels.
    #[must_use]
    pub fn required_bytes(&self) -> u64 {
        u64::from(self.stride) * u64::from(self.height) * 4
    }
}

/// Physical range of the initial ramdisk (first boot module).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RamdiskRegion {
    pub base: u64,
    pub length: u64,
}

/// The kernel's ELF section header table, as reported by Multiboot2.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ElfSections {
    /// Number of section headers.
    pub count: u32,
    /// Size of one section header in bytes.
    pub entry_size: u32,
    /// Index of the section name string table.
    pub string_table_index: u32,
    /// Physical address of the first section header.
    pub headers: u64,
}

const BOOT_STRING_CAPACITY: usize = 128;

/// A short string copied out of boot information (command line, loader name).
///
/// Longer input is truncated at a character boundary.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct BootString {
    bytes: [u8; BOOT_STRING_CAPACITY],
    len: usize,
}

impl BootString {
    /// Copies `bytes` up to the first NUL.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let raw = bytes.split(|&b| b == 0).next().unwrap_or_default();
        let raw = &raw[..raw.len().min(BOOT_STRING_CAPACITY)];
        let valid = match core::str::from_utf8(raw) {
            Ok(s) => s.len(),
            Err(e) => e.valid_up_to(),
        };

        let mut out = Self {
            bytes: [0; BOOT_STRING_CAPACITY],
            len: valid,
        };
        out.bytes[..valid].copy_from_slice(&raw[..valid]);
        out
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        core::str::from_utf8(&self.bytes[..self.len]).unwrap_or_default()
    }
}

impl core::fmt::Debug for BootString {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(self.as_str(), f)
    }
}

/// What the boot path learned about the machine. Read-only once built.
#[derive(Debug, Clone)]
pub struct HardwareDescription {
    memory_map: MemoryMap,
    framebuffer: Option<FramebufferDescriptor>,
    rsdp: Option<u64>,
    ramdisk: Option<RamdiskRegion>,
    elf_sections: Option<ElfSections>,
    command_line: Option<BootString>,
    bootloader_name: Option<BootString>,
}

impl HardwareDescription {
    #[must_use]
    pub const fn memory_map(&self) -> &MemoryMap {
        &self.memory_map
    }

    /// Memory regions that did not fit into the map.
    #[must_use]
    pub const fn dropped_regions(&self) -> usize {
        self.memory_map.dropped()
    }

    #[must_use]
    pub fn usable_bytes(&self) -> u64 {
        self.memory_map.usable_bytes()
    }

    #[must_use]
    pub const fn framebuffer(&self) -> Option<&FramebufferDescriptor> {
        self.framebuffer.as_ref()
    }

    /// Physical address of the ACPI RSDP.
    #[must_use]
    pub const fn rsdp(&self) -> Option<u64> {
        self.rsdp
    }

    #[must_use]
    pub const fn ramdisk(&self) -> Option<RamdiskRegion> {
        self.ramdisk
    }

    #[must_use]
    pub const fn elf_sections(&self) -> Option<ElfSections> {
        self.elf_sections
    }

    #[must_use]
    pub fn command_line(&self) -> Option<&str> {
        self.command_line.as_ref().map(BootString::as_str)
    }

    #[must_use]
    pub fn bootloader_name(&self) -> Option<&str> {
        self.bootloader_name.as_ref().map(BootString::as_str)
    }
}

/// Assembles a [`HardwareDescription`] while boot information is parsed.
#[derive(Debug, Clone, Default)]
pub struct HardwareBuilder {
    memory_map: MemoryMap,
    framebuffer: Option<FramebufferDescriptor>,
    rsdp: Option<u64>,
    rsdp_is_v2: bool,
    ramdisk: Option<RamdiskRegion>,
    elf_sections: Option<ElfSections>,
    command_line: Option<BootString>,
    bootloader_name: Option<BootString>,
}

impl HardwareBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            memory_map: MemoryMap::new(),
            framebuffer: None,
            rsdp: None,
            rsdp_is_v2: false,
            ramdisk: None,
            elf_sections: None,
            command_line: None,
            bootloader_name: None,
        }
    }

    /// Appends a memory region; returns `false` if it was dropped.
    pub fn push_region(&mut self, region: MemoryRegion) -> bool {
        self.memory_map.push(region)
    }

    pub const fn set_framebuffer(&mut self, fb: FramebufferDescriptor) {
        self.framebuffer = Some(fb);
    }

    /// Records the RSDP. An ACPI 2.0+ pointer is never replaced by a 1.0 one.
    pub const fn set_rsdp(&mut self, addr: u64, is_v2: bool) {
        if is_v2 || !self.rsdp_is_v2 {
            self.rsdp = Some(addr);
            self.rsdp_is_v2 = is_v2;
        }
    }

    /// Records the ramdisk; only the first module counts.
    pub const fn set_ramdisk(&mut self, ramdisk: RamdiskRegion) {
        if self.ramdisk.is_none() {
            self.ramdisk = Some(ramdisk);
        }
    }

    pub const fn set_elf_sections(&mut self, sections: ElfSections) {
        self.elf_sections = Some(sections);
    }

    pub fn set_command_line(&mut self, bytes: &[u8]) {
        self.command_line = Some(BootString::from_bytes(bytes));
    }

    pub fn set_bootloader_name(&mut self, bytes: &[u8]) {
        self.bootloader_name = Some(BootString::from_bytes(bytes));
    }

    #[must_use]
    pub fn build(self) -> HardwareDescription {
        HardwareDescription {
            memory_map: self.memory_map,
            framebuffer: self.framebuffer,
            rsdp: self.rsdp,
            ramdisk: self.ramdisk,
            elf_sections: self.elf_sections,
            command_line: self.command_line,
            bootloader_name: self.bootloader_name,
        }
    }
}
