use kernel_boot::BootInfoError;
use kernel_boot::multiboot2::{self, tag};
use kernel_info::config::MAX_MEMORY_REGIONS;
use kernel_info::hardware::{FramebufferSource, PixelFormat};
use kernel_info::memory::MemoryKind;

const PHYS: u64 = 0x0010_0000;

/// Assembles an information block tag by tag.
struct InfoBlock {
    bytes: Vec<u8>,
}

impl InfoBlock {
    fn new() -> Self {
        Self {
            bytes: vec![0; multiboot2::INFO_HEADER_LEN],
        }
    }

    /// Appends a tag and returns its offset in the block.
    fn tag(&mut self, kind: u32, body: &[u8]) -> usize {
        let offset = self.bytes.len();
        let size = u32::try_from(8 + body.len()).unwrap();
        self.bytes.extend_from_slice(&kind.to_le_bytes());
        self.bytes.extend_from_slice(&size.to_le_bytes());
        self.bytes.extend_from_slice(body);
        self.bytes.resize(self.bytes.len().next_multiple_of(8), 0);
        offset
    }

    fn finish(mut self) -> Vec<u8> {
        self.tag(tag::END, &[]);
        let total = u32::try_from(self.bytes.len()).unwrap();
        self.bytes[..4].copy_from_slice(&total.to_le_bytes());
        self.bytes
    }
}

fn cstr(s: &str) -> Vec<u8> {
    let mut v = s.as_bytes().to_vec();
    v.push(0);
    v
}

fn module(start: u32, end: u32, name: &str) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&start.to_le_bytes());
    v.extend_from_slice(&end.to_le_bytes());
    v.extend_from_slice(&cstr(name));
    v
}

fn memory_map(entries: &[(u64, u64, u32)]) -> Vec<u8> {
    let mut v = Vec::new();
    v.extend_from_slice(&24u32.to_le_bytes());
    v.extend_from_slice(&0u32.to_le_bytes());
    for &(base, length, ty) in entries {
        v.extend_from_slice(&base.to_le_bytes());
        v.extend_from_slice(&length.to_le_bytes());
        v.extend_from_slice(&ty.to_le_bytes());
        v.extend_from_slice(&0u32.to_le_bytes());
    }
    v
}

/// A direct-RGB framebuffer tag body with the given channel positions.
fn framebuffer(width: u32, height: u32, bpp: u8, positions: (u8, u8, u8)) -> Vec<u8> {
    let pitch = width * u32::from(bpp) / 8;
    let mut v = Vec::new();
    v.extend_from_slice(&0xFD00_0000u64.to_le_bytes());
    v.extend_from_slice(&pitch.to_le_bytes());
    v.extend_from_slice(&width.to_le_bytes());
    v.extend_from_slice(&height.to_le_bytes());
    v.push(bpp);
    v.push(1);
    v.extend_from_slice(&0u16.to_le_bytes());
    let (r, g, b) = positions;
    v.extend_from_slice(&[r, 8, g, 8, b, 8]);
    v
}

fn elf_sections() -> Vec<u8> {
    let mut v = Vec::new();
    for word in [12u32, 64, 11] {
        v.extend_from_slice(&word.to_le_bytes());
    }
    v.extend_from_slice(&[0; 64]);
    v
}

#[test]
fn full_block_populates_every_field() {
    let mut info = InfoBlock::new();
    info.tag(tag::CMDLINE, &cstr("console=serial"));
    info.tag(tag::BOOTLOADER_NAME, &cstr("GRUB 2.12"));
    info.tag(tag::MODULE, &module(0x20_0000, 0x21_0000, "initrd"));
    info.tag(tag::MODULE, &module(0x30_0000, 0x30_1000, "second"));
    info.tag(
        tag::MMAP,
        &memory_map(&[
            (0, 0x9_F000, 1),
            (0x9_F000, 0x1000, 2),
            (0x10_0000, 0x7EF_0000, 1),
            (0x7FF_0000, 0x1_0000, 3),
        ]),
    );
    info.tag(tag::FRAMEBUFFER, &framebuffer(1024, 768, 32, (16, 8, 0)));
    let elf = info.tag(tag::ELF_SECTIONS, &elf_sections());
    let new_rsdp = info.tag(tag::ACPI_NEW, &[0; 36]);
    info.tag(tag::ACPI_OLD, &[0; 20]);
    let bytes = info.finish();

    let hw = multiboot2::parse(&bytes, PHYS).unwrap();

    assert_eq!(hw.command_line(), Some("console=serial"));
    assert_eq!(hw.bootloader_name(), Some("GRUB 2.12"));

    let ramdisk = hw.ramdisk().unwrap();
    assert_eq!((ramdisk.base, ramdisk.length), (0x20_0000, 0x1_0000));

    let kinds: Vec<MemoryKind> = hw.memory_map().regions().iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        [
            MemoryKind::Usable,
            MemoryKind::Reserved,
            MemoryKind::Usable,
            MemoryKind::AcpiReclaimable
        ]
    );
    assert_eq!(hw.usable_bytes(), 0x9_F000 + 0x7EF_0000);
    assert_eq!(hw.dropped_regions(), 0);

    let fb = hw.framebuffer().unwrap();
    assert_eq!((fb.width, fb.height, fb.stride), (1024, 768, 1024));
    assert_eq!(fb.base, 0xFD00_0000);
    assert_eq!(fb.size, 4096 * 768);
    assert_eq!(fb.bits_per_pixel, 32);
    assert_eq!(fb.format, PixelFormat::Bgr);
    assert_eq!(fb.source, FramebufferSource::Multiboot);

    let sections = hw.elf_sections().unwrap();
    assert_eq!((sections.count, sections.entry_size, sections.string_table_index), (12, 64, 11));
    assert_eq!(sections.headers, PHYS + u64::try_from(elf).unwrap() + 20);

    // The ACPI 2.0 copy wins even though the 1.0 tag came later.
    assert_eq!(hw.rsdp(), Some(PHYS + u64::try_from(new_rsdp).unwrap() + 8));
}

#[test]
fn old_rsdp_is_used_when_alone() {
    let mut info = InfoBlock::new();
    let old = info.tag(tag::ACPI_OLD, &[0; 20]);
    let bytes = info.finish();
    let hw = multiboot2::parse(&bytes, PHYS).unwrap();
    assert_eq!(hw.rsdp(), Some(PHYS + u64::try_from(old).unwrap() + 8));
}

#[test]
fn minimal_block_yields_an_empty_description() {
    let bytes = InfoBlock::new().finish();
    assert_eq!(bytes.len(), 16);
    let hw = multiboot2::parse(&bytes, PHYS).unwrap();
    assert!(hw.memory_map().is_empty());
    assert!(hw.framebuffer().is_none());
    assert!(hw.rsdp().is_none());
    assert!(hw.ramdisk().is_none());
}

#[test]
fn unknown_tags_are_skipped() {
    let mut info = InfoBlock::new();
    info.tag(4, &[0; 8]);
    info.tag(0x1234, &[0xAA; 13]);
    info.tag(tag::CMDLINE, &cstr("quiet"));
    let bytes = info.finish();
    let hw = multiboot2::parse(&bytes, PHYS).unwrap();
    assert_eq!(hw.command_line(), Some("quiet"));
}

#[test]
fn walk_stops_at_the_end_tag() {
    let mut info = InfoBlock::new();
    info.tag(tag::CMDLINE, &cstr("before"));
    let mut bytes = info.finish();
    // Trailing garbage past the end tag, covered by total_size.
    bytes.extend_from_slice(&[0xFF; 16]);
    let total = u32::try_from(bytes.len()).unwrap();
    bytes[..4].copy_from_slice(&total.to_le_bytes());

    let hw = multiboot2::parse(&bytes, PHYS).unwrap();
    assert_eq!(hw.command_line(), Some("before"));
}

#[test]
fn unsupported_framebuffers_are_left_out() {
    let mut indexed = framebuffer(640, 480, 8, (0, 0, 0));
    indexed[21] = 0;
    let layouts = [framebuffer(800, 600, 32, (8, 16, 0)), indexed];

    for body in layouts {
        let mut info = InfoBlock::new();
        info.tag(tag::FRAMEBUFFER, &body);
        let hw = multiboot2::parse(&info.finish(), PHYS).unwrap();
        assert!(hw.framebuffer().is_none());
    }
}

#[test]
fn rgb_framebuffer_records_stride_in_pixels() {
    let mut body = framebuffer(800, 600, 32, (0, 8, 16));
    // Pad each scanline to 3328 bytes.
    body[8..12].copy_from_slice(&3328u32.to_le_bytes());

    let mut info = InfoBlock::new();
    info.tag(tag::FRAMEBUFFER, &body);
    let hw = multiboot2::parse(&info.finish(), PHYS).unwrap();
    let fb = hw.framebuffer().unwrap();
    assert_eq!(fb.format, PixelFormat::Rgb);
    assert_eq!(fb.stride, 832);
    assert_eq!(fb.size, 3328 * 600);
}

#[test]
fn memory_map_overflow_is_counted() {
    let extra = 10;
    let entries: Vec<(u64, u64, u32)> = (0..u64::try_from(MAX_MEMORY_REGIONS + extra).unwrap())
        .map(|i| (i * 0x2000, 0x1000, 1))
        .collect();

    let mut info = InfoBlock::new();
    info.tag(tag::MMAP, &memory_map(&entries));
    let hw = multiboot2::parse(&info.finish(), PHYS).unwrap();

    assert_eq!(hw.memory_map().len(), MAX_MEMORY_REGIONS);
    assert_eq!(hw.dropped_regions(), extra);
}

#[test]
fn structural_errors_are_reported() {
    let valid = {
        let mut info = InfoBlock::new();
        info.tag(tag::CMDLINE, &cstr("x"));
        info.finish()
    };

    assert_eq!(
        multiboot2::parse(&valid, PHYS + 4).unwrap_err(),
        BootInfoError::Misaligned { addr: PHYS + 4 }
    );

    let mut oversized = valid.clone();
    oversized[..4].copy_from_slice(&1024u32.to_le_bytes());
    assert!(matches!(
        multiboot2::parse(&oversized, PHYS),
        Err(BootInfoError::BadTotalSize { total: 1024, .. })
    ));

    let mut tiny_tag = valid.clone();
    tiny_tag[12..16].copy_from_slice(&4u32.to_le_bytes());
    assert!(matches!(
        multiboot2::parse(&tiny_tag, PHYS),
        Err(BootInfoError::BadTag { offset: 8, kind: tag::CMDLINE, size: 4 })
    ));

    let mut runaway_tag = valid.clone();
    runaway_tag[12..16].copy_from_slice(&4096u32.to_le_bytes());
    assert!(matches!(
        multiboot2::parse(&runaway_tag, PHYS),
        Err(BootInfoError::BadTag { size: 4096, .. })
    ));

    // Drop the end tag but keep total_size consistent.
    let mut unterminated = valid[..valid.len() - 8].to_vec();
    let total = u32::try_from(unterminated.len()).unwrap();
    unterminated[..4].copy_from_slice(&total.to_le_bytes());
    assert_eq!(
        multiboot2::parse(&unterminated, PHYS).unwrap_err(),
        BootInfoError::MissingEndTag
    );
}

#[test]
fn short_tags_are_truncated_errors() {
    let mut info = InfoBlock::new();
    info.tag(tag::ACPI_NEW, &[0; 20]);
    assert_eq!(
        multiboot2::parse(&info.finish(), PHYS).unwrap_err(),
        BootInfoError::TruncatedTag {
            kind: tag::ACPI_NEW,
            size: 28,
            need: 44
        }
    );

    let mut info = InfoBlock::new();
    info.tag(tag::FRAMEBUFFER, &[0; 16]);
    assert!(matches!(
        multiboot2::parse(&info.finish(), PHYS),
        Err(BootInfoError::TruncatedTag { kind: tag::FRAMEBUFFER, .. })
    ));
}

#[test]
fn bad_memory_map_entry_size_is_rejected() {
    let mut body = memory_map(&[(0, 0x1000, 1)]);
    body[..4].copy_from_slice(&16u32.to_le_bytes());

    let mut info = InfoBlock::new();
    info.tag(tag::MMAP, &body);
    assert_eq!(
        multiboot2::parse(&info.finish(), PHYS).unwrap_err(),
        BootInfoError::MalformedMemoryMap { entry_size: 16 }
    );
}
