use kernel_info::config::KERNEL_LOAD_ADDRESS;
use std::{env, path::PathBuf};

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let ld = manifest_dir.join("kernel.ld");
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();

    // Freestanding targets get the kernel; anything else gets a host stub.
    println!("cargo::rustc-check-cfg=cfg(bare_metal)");
    if matches!(target_os.as_str(), "none" | "uefi") {
        println!("cargo:rustc-cfg=bare_metal");
    }

    println!("cargo:rerun-if-changed={}", ld.display());
    if target_os != "none" {
        return;
    }

    // Multiboot2 loads the ELF at its physical addresses; the 32-bit
    // bootstrap uses absolute addresses, so no PIE.
    assert_eq!(
        KERNEL_LOAD_ADDRESS & 0xfff,
        0,
        "KERNEL_LOAD_ADDRESS must be 4 KiB aligned (got {KERNEL_LOAD_ADDRESS:#x})"
    );
    println!("cargo:rustc-link-arg-bins=-T{}", ld.display());
    println!("cargo:rustc-link-arg-bins=--no-pie");
    println!("cargo:rustc-link-arg-bins=--defsym=KERNEL_LOAD_ADDRESS={KERNEL_LOAD_ADDRESS:#x}");
}
