//! # UEFI Boot Path
//!
//! Collects the hardware description from boot services and then exits
//! them. Expects the `uefi` crate's image handle and system table to be
//! installed already, which `#[uefi::entry]` does.
//!
//! Order matters: the display mode is set and the RSDP located while boot
//! services are alive; the memory map returned by `ExitBootServices` is
//! the final one and is converted last.

use crate::error::FirmwareBootError;
use crate::gop::{ModeCandidate, select_mode};
use kernel_info::hardware::{
    FramebufferDescriptor, FramebufferSource, HardwareBuilder, HardwareDescription, PixelFormat,
};
use kernel_info::memory::{MemoryKind, MemoryRegion};
use log::{debug, info, warn};
use uefi::boot::{self, MemoryType, ScopedProtocol};
use uefi::mem::memory_map::MemoryMap;
use uefi::proto::console::gop::{GraphicsOutput, PixelFormat as GopPixelFormat};
use uefi::system;
use uefi::table::cfg::{ACPI_GUID, ACPI2_GUID};

const PAGE_SIZE: u64 = 4096;

/// Runs the firmware boot path to completion.
///
/// On success boot services are gone and the machine belongs to the
/// kernel.
///
/// # Errors
/// A missing Graphics Output Protocol, no acceptable display mode, a failed
/// mode switch, or a failed memory map query. All of them are fatal.
pub fn collect() -> Result<HardwareDescription, FirmwareBootError> {
    let mut builder = HardwareBuilder::new();

    let framebuffer = setup_display()?;
    builder.set_framebuffer(framebuffer);

    match find_rsdp() {
        Some((addr, is_v2)) => builder.set_rsdp(addr, is_v2),
        None => warn!("UEFI: no ACPI RSDP in the configuration table"),
    }

    // The map is queried once while it can still fail gracefully.
    let probe = boot::memory_map(MemoryType::LOADER_DATA).map_err(|e| {
        FirmwareBootError::MemoryMapQuery {
            status: e.status().0,
        }
    })?;
    debug!("UEFI: {} memory descriptors before exit", probe.len());
    drop(probe);

    info!("UEFI: exiting boot services");
    exit_boot_services(&mut builder);

    Ok(builder.build())
}

fn open_gop() -> Result<ScopedProtocol<GraphicsOutput>, FirmwareBootError> {
    let handle = boot::get_handle_for_protocol::<GraphicsOutput>()
        .map_err(|_| FirmwareBootError::GopMissing)?;
    boot::open_protocol_exclusive::<GraphicsOutput>(handle)
        .map_err(|_| FirmwareBootError::GopMissing)
}

const fn layout(format: GopPixelFormat) -> Option<PixelFormat> {
    match format {
        GopPixelFormat::Rgb => Some(PixelFormat::Rgb),
        GopPixelFormat::Bgr => Some(PixelFormat::Bgr),
        _ => None,
    }
}

fn setup_display() -> Result<FramebufferDescriptor, FirmwareBootError> {
    let mut gop = open_gop()?;

    let candidates = gop.modes().enumerate().map(|(index, mode)| {
        let (width, height) = mode.info().resolution();
        ModeCandidate {
            index,
            width,
            height,
            format: layout(mode.info().pixel_format()),
        }
    });
    let chosen = select_mode(candidates).ok_or(FirmwareBootError::NoSuitableMode)?;

    let mode = gop
        .modes()
        .nth(chosen.index)
        .ok_or(FirmwareBootError::NoSuitableMode)?;
    gop.set_mode(&mode)
        .map_err(|e| FirmwareBootError::SetModeFailed {
            mode: chosen.index,
            status: e.status().0,
        })?;

    let current = gop.current_mode_info();
    let (width, height) = current.resolution();
    let format = layout(current.pixel_format()).ok_or(FirmwareBootError::NoSuitableMode)?;
    let stride = current.stride();

    let mut fb = gop.frame_buffer();
    let base = fb.as_mut_ptr().addr() as u64;
    let size = fb.size() as u64;
    info!("UEFI: GOP mode {} {width}x{height} stride {stride} at {base:#x}", chosen.index);

    let dimension = |v: usize| u32::try_from(v).map_err(|_| FirmwareBootError::NoSuitableMode);
    Ok(FramebufferDescriptor {
        base,
        size,
        width: dimension(width)?,
        height: dimension(height)?,
        stride: dimension(stride)?,
        bits_per_pixel: 32,
        format,
        source: FramebufferSource::UefiGop,
    })
}

/// The RSDP address and whether it is the ACPI 2.0 one.
fn find_rsdp() -> Option<(u64, bool)> {
    system::with_config_table(|table| {
        let find = |guid: uefi::Guid| {
            table
                .iter()
                .find(|entry| entry.guid == guid)
                .map(|entry| entry.address.addr() as u64)
        };
        find(ACPI2_GUID)
            .map(|addr| (addr, true))
            .or_else(|| find(ACPI_GUID).map(|addr| (addr, false)))
    })
}

#[allow(unsafe_code)]
fn exit_boot_services(builder: &mut HardwareBuilder) {
    // SAFETY: no boot services protocol or allocation outlives this call;
    // the GOP scope was closed in `setup_display`.
    let map = unsafe { boot::exit_boot_services(None) };

    for desc in map.entries() {
        let kind = MemoryKind::from_uefi(desc.ty.0);
        let length = desc.page_count.saturating_mul(PAGE_SIZE);
        builder.push_region(MemoryRegion::new(desc.phys_start, length, kind));
    }
}
