//! # UEFI Entry
//!
//! `#[entry]` installs the image handle and system table before the body
//! runs, which `kernel_boot::firmware` relies on.

use crate::kernel_entry;
use uefi::{Status, entry};

#[entry]
fn efi_main() -> Status {
    let image_handle = uefi::boot::image_handle().as_ptr().addr();
    let system_table = uefi::table::system_table_raw().map_or(0, |t| t.as_ptr().addr());

    kernel_entry(
        0,
        u64::try_from(image_handle).unwrap_or_default(),
        u64::try_from(system_table).unwrap_or_default(),
    )
}
