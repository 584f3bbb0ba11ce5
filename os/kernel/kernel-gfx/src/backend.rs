use crate::framebuffer::Framebuffer;
use bitflags::bitflags;
use kernel_info::hardware::{FramebufferDescriptor, FramebufferSource, PixelFormat};
use log::{debug, info, warn};

/// Which output path the terminal renders through.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BackendKind {
    /// Framebuffer established before the kernel took over (UEFI GOP, or
    /// the boot loader's Multiboot2 framebuffer).
    FirmwareGraphics,
    /// Bochs/QEMU display interface programmed by the kernel.
    LegacyChipsetGraphics,
    /// VGA text memory; no [`GraphicsDevice`].
    TextFallback,
}

impl BackendKind {
    /// Probe priority, highest first. [`BackendKind::TextFallback`] is what
    /// remains when none of these succeed.
    pub const PROBE_ORDER: [Self; 2] = [Self::FirmwareGraphics, Self::LegacyChipsetGraphics];
}

bitflags! {
    /// Attributes requested for a physical mapping.
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub struct MapFlags: u32 {
        const WRITABLE = 1 << 0;
        const WRITE_COMBINING = 1 << 1;
        const UNCACHED = 1 << 2;
    }
}

/// Brings physical memory into the kernel's address space.
///
/// # Safety
/// A returned address must be valid for reads and writes of `length` bytes
/// for the rest of the kernel session, suitably aligned for `u32`, and not
/// handed out again while a previous mapping of it is in use.
#[allow(unsafe_code)]
pub unsafe trait PhysMapper {
    /// Maps `length` bytes at `phys`, preferably at virtual address `hint`
    /// (`0` for anywhere). Returns the virtual address.
    fn map(&mut self, phys: u64, hint: u64, length: u64, flags: MapFlags) -> Option<u64>;
}

/// A mapper for address spaces where physical memory is identity-mapped.
pub struct IdentityMapper {
    _private: (),
}

impl IdentityMapper {
    /// # Safety
    /// Every physical address handed to [`PhysMapper::map`] must be
    /// identity-mapped and owned by the caller.
    #[allow(unsafe_code)]
    #[must_use]
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

#[allow(unsafe_code)]
unsafe impl PhysMapper for IdentityMapper {
    fn map(&mut self, phys: u64, _hint: u64, _length: u64, _flags: MapFlags) -> Option<u64> {
        Some(phys)
    }
}

/// Maps a `stride * height` pixel framebuffer at `phys`.
pub(crate) fn map_framebuffer(
    mapper: &mut dyn PhysMapper,
    phys: u64,
    width: usize,
    height: usize,
    stride: usize,
    format: PixelFormat,
) -> Option<Framebuffer<'static>> {
    let pixels = stride.checked_mul(height)?;
    let bytes = u64::try_from(pixels.checked_mul(4)?).ok()?;
    let virt = mapper.map(phys, 0, bytes, MapFlags::WRITABLE | MapFlags::WRITE_COMBINING)?;
    if virt == 0 || virt % 4 != 0 {
        warn!("GFX: mapper returned unusable address {virt:#x}");
        return None;
    }

    // SAFETY: `PhysMapper` guarantees `bytes` of exclusive, aligned memory
    // at `virt` for the kernel session.
    #[allow(unsafe_code)]
    let memory = unsafe { core::slice::from_raw_parts_mut(virt as *mut u32, pixels) };
    Framebuffer::new(memory, width, height, stride, format)
}

/// The one active pixel output device.
#[derive(Debug)]
pub struct GraphicsDevice<'a> {
    kind: BackendKind,
    name: &'static str,
    bits_per_pixel: u8,
    framebuffer: Framebuffer<'a>,
}

impl<'a> GraphicsDevice<'a> {
    #[must_use]
    pub const fn new(
        kind: BackendKind,
        name: &'static str,
        bits_per_pixel: u8,
        framebuffer: Framebuffer<'a>,
    ) -> Self {
        Self {
            kind,
            name,
            bits_per_pixel,
            framebuffer,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> BackendKind {
        self.kind
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.framebuffer.width()
    }

    #[must_use]
    pub const fn height(&self) -> usize {
        self.framebuffer.height()
    }

    #[must_use]
    pub const fn bits_per_pixel(&self) -> u8 {
        self.bits_per_pixel
    }

    #[must_use]
    pub const fn framebuffer(&self) -> &Framebuffer<'a> {
        &self.framebuffer
    }

    pub const fn framebuffer_mut(&mut self) -> &mut Framebuffer<'a> {
        &mut self.framebuffer
    }
}

/// One step of the backend cascade.
pub trait BackendProbe {
    fn kind(&self) -> BackendKind;

    /// Detects and, if needed, configures the backend.
    fn probe(&mut self, mapper: &mut dyn PhysMapper) -> Option<GraphicsDevice<'static>>;
}

/// Runs `probes` in [`BackendKind::PROBE_ORDER`], regardless of their order
/// in the slice, and returns the first device that comes up.
pub fn select_backend(
    probes: &mut [&mut dyn BackendProbe],
    mapper: &mut dyn PhysMapper,
) -> Option<GraphicsDevice<'static>> {
    for kind in BackendKind::PROBE_ORDER {
        for probe in probes.iter_mut().filter(|p| p.kind() == kind) {
            if let Some(device) = probe.probe(mapper) {
                info!(
                    "GFX: {kind:?} backend \"{}\" at {}x{}x{}",
                    device.name(),
                    device.width(),
                    device.height(),
                    device.bits_per_pixel()
                );
                return Some(device);
            }
            debug!("GFX: {kind:?} backend unavailable");
        }
    }
    info!("GFX: no graphics backend, using VGA text mode");
    None
}

/// Wraps the framebuffer the boot path already set up.
pub struct FirmwareProbe {
    descriptor: Option<FramebufferDescriptor>,
}

impl FirmwareProbe {
    #[must_use]
    pub const fn new(descriptor: Option<FramebufferDescriptor>) -> Self {
        Self { descriptor }
    }
}

impl BackendProbe for FirmwareProbe {
    fn kind(&self) -> BackendKind {
        BackendKind::FirmwareGraphics
    }

    fn probe(&mut self, mapper: &mut dyn PhysMapper) -> Option<GraphicsDevice<'static>> {
        let fb = self.descriptor.filter(|d| d.base != 0)?;
        if fb.bits_per_pixel != 32 {
            warn!("GFX: boot framebuffer has {} bpp, need 32", fb.bits_per_pixel);
            return None;
        }
        if fb.size < fb.required_bytes() {
            warn!(
                "GFX: boot framebuffer of {} bytes is smaller than its mode ({} bytes)",
                fb.size,
                fb.required_bytes()
            );
            return None;
        }

        let name = match fb.source {
            FramebufferSource::UefiGop => "UEFI GOP",
            FramebufferSource::Multiboot => "Multiboot2 framebuffer",
        };
        let framebuffer = map_framebuffer(
            mapper,
            fb.base,
            usize::try_from(fb.width).ok()?,
            usize::try_from(fb.height).ok()?,
            usize::try_from(fb.stride).ok()?,
            fb.format,
        )?;
        Some(GraphicsDevice::new(
            BackendKind::FirmwareGraphics,
            name,
            fb.bits_per_pixel,
            framebuffer,
        ))
    }
}
