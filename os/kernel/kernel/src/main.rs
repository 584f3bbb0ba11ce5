//! # Kernel Entry Point
//!
//! Two ways in, one way on:
//!
//! * **Multiboot2**: the loader jumps to `_start` in 32-bit protected mode.
//!   The bootstrap in [`multiboot`] identity-maps the first 4 GiB, enters
//!   long mode and calls [`kernel_entry`] with the loader's magic value and
//!   information address.
//! * **UEFI** (`uefi` feature, `x86_64-unknown-uefi`): the firmware runs the
//!   image's `efi_main`, which passes the image handle and system table on
//!   to [`kernel_entry`].
//!
//! [`kernel_entry`] brings up logging, turns the boot protocol's data into a
//! [`HardwareDescription`], and hands it to the device layer.

#![cfg_attr(bare_metal, no_std, no_main)]
#![allow(unsafe_code)]

#[cfg(bare_metal)]
mod fatal;
#[cfg(all(bare_metal, target_os = "none"))]
mod multiboot;
#[cfg(bare_metal)]
mod tracing;
#[cfg(all(bare_metal, feature = "uefi"))]
mod uefi_entry;

#[cfg(bare_metal)]
use kernel_boot::BootHandoff;
#[cfg(bare_metal)]
use kernel_info::hardware::HardwareDescription;

/// Common entry for both boot paths.
///
/// `magic` is the value a Multiboot2 loader leaves in `eax` (anything else
/// for UEFI); `arg0`/`arg1` are the information address, or the image handle
/// and system table.
#[cfg(bare_metal)]
#[unsafe(no_mangle)]
pub extern "C" fn kernel_entry(magic: u32, arg0: u64, arg1: u64) -> ! {
    use kernel_info::config::DEFAULT_LOG_LEVEL;
    use kernel_log::SerialLogger;
    use kernel_ports::RawPorts;

    // SAFETY: the kernel runs at CPL 0 and owns the port space.
    let ports = unsafe { RawPorts::new() };
    if SerialLogger::new(ports.clone(), DEFAULT_LOG_LEVEL)
        .init()
        .is_err()
    {
        fatal::halt();
    }

    let Some(handoff) = BootHandoff::identify(magic, arg0, arg1) else {
        fatal::fatal(format_args!(
            "Boot: unknown handoff (magic {magic:#010x}, {arg0:#x}, {arg1:#x})"
        ));
    };
    log::info!("Boot: entered via {}", handoff.protocol());

    let hw = describe_hardware(handoff);
    tracing::trace_hardware(&hw);
    kernel_main(&hw, ports)
}

#[cfg(bare_metal)]
fn describe_hardware(handoff: BootHandoff) -> HardwareDescription {
    match handoff {
        BootHandoff::Multiboot2 { info } => {
            // SAFETY: the bootstrap identity-maps the low 4 GiB, where the
            // loader placed the information block.
            unsafe { kernel_boot::multiboot2::parse_at(info) }.unwrap_or_else(|e| {
                fatal::fatal(format_args!("Boot: Multiboot2 information unusable: {e}"))
            })
        }
        #[cfg(feature = "uefi")]
        BootHandoff::Uefi { .. } => kernel_boot::firmware::collect()
            .unwrap_or_else(|e| fatal::fatal(format_args!("Boot: firmware setup failed: {e}"))),
        #[cfg(not(feature = "uefi"))]
        BootHandoff::Uefi { .. } => {
            fatal::fatal(format_args!("Boot: UEFI handoff in a kernel built without `uefi`"))
        }
    }
}

#[cfg(bare_metal)]
fn kernel_main(hw: &HardwareDescription, ports: kernel_ports::RawPorts) -> ! {
    use core::fmt::Write;
    use kernel_devices::DeviceContext;
    use kernel_gfx::{IdentityMapper, TextBuffer, VGA_TEXT_PHYS};

    // SAFETY: both boot paths leave physical memory identity-mapped, and
    // nothing else touches the framebuffers or the text buffer.
    let mut mapper = unsafe { IdentityMapper::new() };
    let text = unsafe { TextBuffer::at(VGA_TEXT_PHYS) };

    let mut devices: DeviceContext<'_, kernel_ports::RawPorts> =
        DeviceContext::init(hw, ports, &mut mapper, text);
    let drives = devices.ata().devices().count();
    let backend = devices.backend();

    let terminal = devices.terminal();
    let (cols, rows) = terminal.dimensions();
    // The terminal never fails to write.
    let _ = writeln!(terminal, "kernel: devices ready");
    let _ = writeln!(terminal, "  display  {backend:?}, {cols}x{rows} cells");
    let _ = writeln!(terminal, "  memory   {} MiB usable", hw.usable_bytes() >> 20);
    let _ = writeln!(terminal, "  storage  {drives} drive(s)");

    log::info!("Kernel: initialization complete, idling");
    fatal::halt()
}

#[cfg(bare_metal)]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    fatal::fatal(format_args!("{info}"))
}

#[cfg(not(bare_metal))]
fn main() {
    eprintln!("the kernel only runs freestanding; build it for x86_64-unknown-none");
    std::process::exit(1);
}
