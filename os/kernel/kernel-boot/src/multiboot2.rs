//! # Multiboot2 Boot Information
//!
//! The information block is a `{total_size: u32, reserved: u32}` header
//! followed by tags, each starting on an 8-byte boundary with a
//! `{type: u32, size: u32}` header. `size` covers the tag header but not the
//! padding to the next tag. A tag of type 0 and size 8 ends the list.
//!
//! All fields are little-endian and read through byte-offset accessors, so
//! the block needs no particular alignment in memory. Physical addresses of
//! structures the kernel keeps referring to (RSDP copies, ELF section
//! headers) are derived from the block's physical base.
//!
//! Recognised tags:
//!
//! | Type | Content                  | Recorded as                        |
//! |------|--------------------------|------------------------------------|
//! | 1    | command line             | `command_line`                     |
//! | 2    | boot loader name         | `bootloader_name`                  |
//! | 3    | module                   | ramdisk (first module only)        |
//! | 6    | memory map               | memory regions                     |
//! | 8    | framebuffer (RGB only)   | framebuffer descriptor             |
//! | 9    | ELF section headers      | `elf_sections`                     |
//! | 14   | ACPI 1.0 RSDP copy       | RSDP, unless a 2.0 one is present  |
//! | 15   | ACPI 2.0 RSDP copy       | RSDP                               |
//!
//! Anything else is skipped.

use crate::error::BootInfoError;
use kernel_info::hardware::{
    ElfSections, FramebufferDescriptor, FramebufferSource, HardwareBuilder, HardwareDescription,
    PixelFormat, RamdiskRegion,
};
use kernel_info::memory::{MemoryKind, MemoryRegion};
use log::{debug, trace, warn};

/// Tag type numbers.
pub mod tag {
    pub const END: u32 = 0;
    pub const CMDLINE: u32 = 1;
    pub const BOOTLOADER_NAME: u32 = 2;
    pub const MODULE: u32 = 3;
    pub const MMAP: u32 = 6;
    pub const FRAMEBUFFER: u32 = 8;
    pub const ELF_SECTIONS: u32 = 9;
    pub const ACPI_OLD: u32 = 14;
    pub const ACPI_NEW: u32 = 15;
}

/// Bytes of the `{total_size, reserved}` header.
pub const INFO_HEADER_LEN: usize = 8;

/// Bytes of a tag's `{type, size}` header.
pub const TAG_HEADER_LEN: usize = 8;

const MMAP_HEADER_LEN: usize = 16;
const MMAP_ENTRY_MIN: u32 = 24;

const FRAMEBUFFER_COMMON_LEN: usize = 32;
const FRAMEBUFFER_RGB_LEN: usize = FRAMEBUFFER_COMMON_LEN + 6;
const FRAMEBUFFER_TYPE_RGB: u8 = 1;

const ELF_HEADERS_OFFSET: usize = 20;

const RSDP_V1_LEN: usize = 20;
const RSDP_V2_LEN: usize = 36;

/// Parses the information block at physical address `phys`.
///
/// # Errors
/// See [`parse`].
///
/// # Safety
/// `phys` must be identity-mapped and point to a complete Multiboot2
/// information block that stays untouched while it is parsed.
#[allow(unsafe_code)]
pub unsafe fn parse_at(phys: u64) -> Result<HardwareDescription, BootInfoError> {
    if phys == 0 || !phys.is_multiple_of(8) {
        return Err(BootInfoError::Misaligned { addr: phys });
    }
    let addr = usize::try_from(phys).map_err(|_| BootInfoError::Misaligned { addr: phys })?;
    let base = core::ptr::with_exposed_provenance::<u8>(addr);

    // SAFETY: the caller guarantees a readable, 8-byte aligned header.
    let total = unsafe { base.cast::<u32>().read() };
    let len = usize::try_from(total).unwrap_or(0);

    // SAFETY: the header states how many bytes the block spans.
    let info = unsafe { core::slice::from_raw_parts(base, len) };
    parse(info, phys)
}

/// Parses an information block held in `info`, which was found at physical
/// address `phys_base`.
///
/// # Errors
/// Any structural problem with the block: a total size smaller than a
/// header plus end tag or larger than `info`, a tag whose size is below 8
/// or runs past the end, a tag too short for its type, an unusable memory
/// map entry size, or a missing end tag.
pub fn parse(info: &[u8], phys_base: u64) -> Result<HardwareDescription, BootInfoError> {
    if !phys_base.is_multiple_of(8) {
        return Err(BootInfoError::Misaligned { addr: phys_base });
    }

    let total = read_u32(info, 0).unwrap_or(0);
    let len = usize::try_from(total).unwrap_or(usize::MAX);
    if len < INFO_HEADER_LEN + TAG_HEADER_LEN || len > info.len() {
        return Err(BootInfoError::BadTotalSize {
            total,
            available: info.len(),
        });
    }
    let info = &info[..len];

    let mut builder = HardwareBuilder::new();
    let mut offset = INFO_HEADER_LEN;
    loop {
        let (Some(kind), Some(size)) = (read_u32(info, offset), read_u32(info, offset + 4)) else {
            return Err(BootInfoError::MissingEndTag);
        };

        let bad = BootInfoError::BadTag { offset, kind, size };
        let tag_len = usize::try_from(size).map_err(|_| bad)?;
        if tag_len < TAG_HEADER_LEN {
            return Err(bad);
        }
        let end = offset.checked_add(tag_len).ok_or(bad)?;
        let bytes = info.get(offset..end).ok_or(bad)?;

        if kind == tag::END {
            if tag_len != TAG_HEADER_LEN {
                return Err(bad);
            }
            break;
        }

        let tag = Tag {
            kind,
            offset,
            bytes,
        };
        tag.apply(phys_base, &mut builder)?;

        offset = end.next_multiple_of(8);
    }

    let description = builder.build();
    if description.dropped_regions() > 0 {
        warn!(
            "MB2: memory map overflow, {} regions dropped",
            description.dropped_regions()
        );
    }
    Ok(description)
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw = bytes.get(at..at.checked_add(4)?)?;
    raw.try_into().ok().map(u32::from_le_bytes)
}

/// One tag, header included.
struct Tag<'a> {
    kind: u32,
    offset: usize,
    bytes: &'a [u8],
}

impl Tag<'_> {
    fn truncated(&self, need: usize) -> BootInfoError {
        BootInfoError::TruncatedTag {
            kind: self.kind,
            size: self.bytes.len(),
            need,
        }
    }

    fn require(&self, need: usize) -> Result<(), BootInfoError> {
        if self.bytes.len() < need {
            return Err(self.truncated(need));
        }
        Ok(())
    }

    fn field<const N: usize>(&self, at: usize) -> Result<[u8; N], BootInfoError> {
        at.checked_add(N)
            .and_then(|end| self.bytes.get(at..end))
            .and_then(|raw| raw.try_into().ok())
            .ok_or_else(|| self.truncated(at.saturating_add(N)))
    }

    fn u8(&self, at: usize) -> Result<u8, BootInfoError> {
        self.field::<1>(at).map(|[b]| b)
    }

    fn u32(&self, at: usize) -> Result<u32, BootInfoError> {
        self.field(at).map(u32::from_le_bytes)
    }

    fn u64(&self, at: usize) -> Result<u64, BootInfoError> {
        self.field(at).map(u64::from_le_bytes)
    }

    /// Bytes from `at` to the end of the tag.
    fn tail(&self, at: usize) -> &[u8] {
        self.bytes.get(at..).unwrap_or_default()
    }

    /// Physical address of byte `at` of this tag.
    fn phys(&self, base: u64, at: usize) -> u64 {
        let offset = u64::try_from(self.offset + at).unwrap_or(u64::MAX);
        base.saturating_add(offset)
    }

    fn apply(&self, phys_base: u64, builder: &mut HardwareBuilder) -> Result<(), BootInfoError> {
        match self.kind {
            tag::CMDLINE => builder.set_command_line(self.tail(TAG_HEADER_LEN)),
            tag::BOOTLOADER_NAME => builder.set_bootloader_name(self.tail(TAG_HEADER_LEN)),
            tag::MODULE => self.module(builder)?,
            tag::MMAP => self.memory_map(builder)?,
            tag::FRAMEBUFFER => self.framebuffer(builder)?,
            tag::ELF_SECTIONS => {
                self.require(ELF_HEADERS_OFFSET)?;
                builder.set_elf_sections(ElfSections {
                    count: self.u32(8)?,
                    entry_size: self.u32(12)?,
                    string_table_index: self.u32(16)?,
                    headers: self.phys(phys_base, ELF_HEADERS_OFFSET),
                });
            }
            tag::ACPI_OLD => {
                self.require(TAG_HEADER_LEN + RSDP_V1_LEN)?;
                builder.set_rsdp(self.phys(phys_base, TAG_HEADER_LEN), false);
            }
            tag::ACPI_NEW => {
                self.require(TAG_HEADER_LEN + RSDP_V2_LEN)?;
                builder.set_rsdp(self.phys(phys_base, TAG_HEADER_LEN), true);
            }
            other => trace!("MB2: skipping tag type {other}"),
        }
        Ok(())
    }

    fn module(&self, builder: &mut HardwareBuilder) -> Result<(), BootInfoError> {
        let start = self.u32(8)?;
        let end = self.u32(12)?;
        if end < start {
            return Err(BootInfoError::BadTag {
                offset: self.offset,
                kind: self.kind,
                size: u32::try_from(self.bytes.len()).unwrap_or(u32::MAX),
            });
        }
        debug!("MB2: module {start:#x}..{end:#x}");
        builder.set_ramdisk(RamdiskRegion {
            base: u64::from(start),
            length: u64::from(end - start),
        });
        Ok(())
    }

    fn memory_map(&self, builder: &mut HardwareBuilder) -> Result<(), BootInfoError> {
        self.require(MMAP_HEADER_LEN)?;
        let entry_size = self.u32(8)?;
        if entry_size < MMAP_ENTRY_MIN || !entry_size.is_multiple_of(8) {
            return Err(BootInfoError::MalformedMemoryMap { entry_size });
        }
        let stride = usize::try_from(entry_size)
            .map_err(|_| BootInfoError::MalformedMemoryMap { entry_size })?;

        let mut at = MMAP_HEADER_LEN;
        while at + stride <= self.bytes.len() {
            let base = self.u64(at)?;
            let length = self.u64(at + 8)?;
            let kind = MemoryKind::from_multiboot(self.u32(at + 16)?);
            builder.push_region(MemoryRegion::new(base, length, kind));
            at += stride;
        }
        Ok(())
    }

    fn framebuffer(&self, builder: &mut HardwareBuilder) -> Result<(), BootInfoError> {
        self.require(FRAMEBUFFER_COMMON_LEN)?;
        let base = self.u64(8)?;
        let pitch = self.u32(16)?;
        let width = self.u32(20)?;
        let height = self.u32(24)?;
        let bits_per_pixel = self.u8(28)?;
        let ty = self.u8(29)?;

        if ty != FRAMEBUFFER_TYPE_RGB {
            debug!("MB2: framebuffer type {ty} is not direct RGB, ignored");
            return Ok(());
        }
        self.require(FRAMEBUFFER_RGB_LEN)?;

        // {position, mask size} per channel.
        let red = (self.u8(32)?, self.u8(33)?);
        let green = (self.u8(34)?, self.u8(35)?);
        let blue = (self.u8(36)?, self.u8(37)?);
        let format = match (red, green, blue) {
            ((0, 8), (8, 8), (16, 8)) => PixelFormat::Rgb,
            ((16, 8), (8, 8), (0, 8)) => PixelFormat::Bgr,
            _ => {
                warn!(
                    "MB2: framebuffer channel layout r={red:?} g={green:?} b={blue:?} unsupported"
                );
                return Ok(());
            }
        };

        let bytes_per_pixel = u32::from(bits_per_pixel).div_ceil(8);
        if bytes_per_pixel == 0 || width == 0 || height == 0 {
            warn!("MB2: framebuffer {width}x{height}x{bits_per_pixel} ignored");
            return Ok(());
        }

        builder.set_framebuffer(FramebufferDescriptor {
            base,
            size: u64::from(pitch) * u64::from(height),
            width,
            height,
            stride: pitch / bytes_per_pixel,
            bits_per_pixel,
            format,
            source: FramebufferSource::Multiboot,
        });
        Ok(())
    }
}
