//! # Device Layer Configuration

use log::LevelFilter;

/// Capacity of the normalized memory map.
pub const MAX_MEMORY_REGIONS: usize = 256;

/// Widest UEFI GOP mode the boot path will select.
pub const GOP_MAX_HORIZONTAL_RESOLUTION: usize = 1920;

/// Mode programmed into the Bochs display interface when it is the active backend.
pub const BGA_DEFAULT_WIDTH: u16 = 1024;

/// See [`BGA_DEFAULT_WIDTH`].
pub const BGA_DEFAULT_HEIGHT: u16 = 768;

/// See [`BGA_DEFAULT_WIDTH`].
pub const BGA_DEFAULT_BPP: u16 = 32;

/// Columns a tab advances the terminal cursor by.
pub const TAB_WIDTH: usize = 4;

/// Keycode ring capacity.
pub const KEYBOARD_BUFFER_CAPACITY: usize = 256;

/// Mouse event ring capacity.
pub const MOUSE_BUFFER_CAPACITY: usize = 64;

/// Status reads before an ATA poll gives up.
pub const ATA_POLL_BUDGET: u32 = 100_000;

/// Physical address the kernel image is linked and loaded at.
pub const KERNEL_LOAD_ADDRESS: u64 = 0x0010_0000;

/// Stack the kernel runs on from its first instruction.
pub const BOOT_STACK_SIZE: usize = 64 * 1024;

/// Default `log` threshold installed by the kernel.
#[cfg(debug_assertions)]
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Debug;

/// Default `log` threshold installed by the kernel.
#[cfg(not(debug_assertions))]
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Info;

const _: () = {
    assert!(MAX_MEMORY_REGIONS > 0);
    assert!(GOP_MAX_HORIZONTAL_RESOLUTION >= 640);
    assert!(BGA_DEFAULT_BPP == 32);
    assert!(TAB_WIDTH > 0);
    assert!(KEYBOARD_BUFFER_CAPACITY > 0 && MOUSE_BUFFER_CAPACITY > 0);
    assert!(ATA_POLL_BUDGET > 0);
    assert!(KERNEL_LOAD_ADDRESS.is_multiple_of(4096));
    assert!(BOOT_STACK_SIZE.is_multiple_of(16));
};
