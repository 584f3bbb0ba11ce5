//! # Kernel Tracing helpers

use kernel_info::hardware::{FramebufferSource, HardwareDescription, PixelFormat};
use log::{debug, info, warn};

pub fn trace_hardware(hw: &HardwareDescription) {
    let map = hw.memory_map();
    info!(
        "Hardware: {regions} memory regions, {usable} KiB usable, loader = {loader}, cmdline = {cmdline:?}",
        regions = map.len(),
        usable = hw.usable_bytes() >> 10,
        loader = hw.bootloader_name().unwrap_or("-"),
        cmdline = hw.command_line().unwrap_or(""),
    );
    if hw.dropped_regions() > 0 {
        warn!("Hardware: {} memory regions did not fit", hw.dropped_regions());
    }
    for region in map.regions() {
        debug!(
            "  {base:#018x}..{end:#018x} {kind:?}",
            base = region.base,
            end = region.end(),
            kind = region.kind,
        );
    }

    match hw.framebuffer() {
        Some(fb) => info!(
            concat!(
                "Hardware: FB ptr = {base:#018x}, size = {size}, width = {width}, ",
                "height = {height}, stride = {stride}, bpp = {bpp}, format = {fmt}, from {source}"
            ),
            base = fb.base,
            size = fb.size,
            width = fb.width,
            height = fb.height,
            stride = fb.stride,
            bpp = fb.bits_per_pixel,
            fmt = match fb.format {
                PixelFormat::Rgb => "RGB",
                PixelFormat::Bgr => "BGR",
            },
            source = match fb.source {
                FramebufferSource::UefiGop => "GOP",
                FramebufferSource::Multiboot => "Multiboot2",
            },
        ),
        None => info!("Hardware: no boot framebuffer"),
    }

    match hw.rsdp() {
        Some(rsdp) => info!("Hardware: RSDP at {rsdp:#x}"),
        None => warn!("Hardware: no RSDP"),
    }
    if let Some(ramdisk) = hw.ramdisk() {
        info!(
            "Hardware: ramdisk {:#x}, {} bytes",
            ramdisk.base, ramdisk.length
        );
    }
    if let Some(elf) = hw.elf_sections() {
        debug!(
            "Hardware: {} ELF section headers of {} bytes at {:#x}",
            elf.count, elf.entry_size, elf.headers
        );
    }
}
