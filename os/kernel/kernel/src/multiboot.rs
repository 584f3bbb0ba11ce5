//! # Multiboot2 Header and Long Mode Bootstrap
//!
//! A Multiboot2 loader enters `_start` in 32-bit protected mode with paging
//! off, `eax` holding the bootloader magic and `ebx` the physical address of
//! the information block. The bootstrap
//!
//! 1. checks that the CPU supports long mode,
//! 2. identity-maps the first 4 GiB with 2 MiB pages,
//! 3. enables PAE, `EFER.LME` and paging, loads a flat 64-bit GDT,
//! 4. far-returns into 64-bit code and calls
//!    `kernel_entry(magic, info, 0)` on the boot stack.
//!
//! The 4 GiB window covers the kernel image, the information block, the VGA
//! text buffer and the PCI framebuffers QEMU places below 4 GiB.

use crate::kernel_entry;
use kernel_info::config::BOOT_STACK_SIZE;

/// 16-byte aligned stack
#[repr(align(16))]
struct Aligned<const N: usize>([u8; N]);

#[unsafe(link_section = ".bss.boot")]
#[unsafe(no_mangle)]
static mut BOOT_STACK: Aligned<BOOT_STACK_SIZE> = Aligned([0; BOOT_STACK_SIZE]);

core::arch::global_asm!(
    // Header: magic, architecture (i386), length, checksum, then tags.
    ".section .multiboot2, \"a\"",
    ".balign 8",
    "mb2_header_start:",
    ".long 0xE85250D6",
    ".long 0",
    ".long mb2_header_end - mb2_header_start",
    ".long 0x100000000 - (0xE85250D6 + (mb2_header_end - mb2_header_start))",
    // Framebuffer request (optional): 1024x768x32.
    ".balign 8",
    ".short 5",
    ".short 1",
    ".long 20",
    ".long 1024",
    ".long 768",
    ".long 32",
    // End tag.
    ".balign 8",
    ".short 0",
    ".short 0",
    ".long 8",
    "mb2_header_end:",

    ".section .bss.boot.paging, \"aw\", @nobits",
    ".balign 4096",
    "boot_pml4:",
    ".skip 4096",
    "boot_pdpt:",
    ".skip 4096",
    "boot_pd:",
    ".skip 4096 * 4",

    ".section .rodata",
    ".balign 8",
    "boot_gdt:",
    ".quad 0",
    // 0x08: 64-bit code, 0x10: data
    ".quad 0x00AF9A000000FFFF",
    ".quad 0x00CF92000000FFFF",
    "boot_gdt_end:",
    "boot_gdt_pointer:",
    ".short boot_gdt_end - boot_gdt - 1",
    ".long boot_gdt",

    ".section .boot.text, \"ax\"",
    ".code32",
    ".global _start",
    "_start:",
    "cli",
    "cld",
    "mov edi, eax",
    "mov esi, ebx",
    "mov esp, offset {stack}",
    "add esp, {stack_size}",

    "mov eax, 0x80000000",
    "cpuid",
    "cmp eax, 0x80000001",
    "jb 2f",
    "mov eax, 0x80000001",
    "cpuid",
    "test edx, 1 << 29",
    "jz 2f",

    // PML4[0] -> PDPT, PDPT[0..4] -> PD[0..4], 2048 huge pages.
    "mov eax, offset boot_pdpt",
    "or eax, 0x3",
    "mov dword ptr [boot_pml4], eax",
    "mov eax, offset boot_pd",
    "or eax, 0x3",
    "xor ecx, ecx",
    "3:",
    "mov dword ptr [boot_pdpt + ecx * 8], eax",
    "add eax, 4096",
    "inc ecx",
    "cmp ecx, 4",
    "jne 3b",
    "xor ecx, ecx",
    "4:",
    "mov eax, ecx",
    "shl eax, 21",
    "or eax, 0x83",
    "mov dword ptr [boot_pd + ecx * 8], eax",
    "inc ecx",
    "cmp ecx, 2048",
    "jne 4b",

    "mov eax, offset boot_pml4",
    "mov cr3, eax",
    "mov eax, cr4",
    "or eax, 1 << 5",
    "mov cr4, eax",
    "mov ecx, 0xC0000080",
    "rdmsr",
    "or eax, 1 << 8",
    "wrmsr",
    "mov eax, cr0",
    "or eax, 0x80000001",
    "mov cr0, eax",

    "lgdt [boot_gdt_pointer]",
    "push 0x08",
    "push offset 5f",
    "retf",

    // No long mode: nothing to report to yet.
    "2:",
    "hlt",
    "jmp 2b",

    ".code64",
    "5:",
    "mov ax, 0x10",
    "mov ds, ax",
    "mov es, ax",
    "mov ss, ax",
    "mov fs, ax",
    "mov gs, ax",
    "mov edi, edi",
    "mov esi, esi",
    "xor edx, edx",
    "lea rsp, [rip + {stack}]",
    "add rsp, {stack_size}",
    "and rsp, -16",
    "xor ebp, ebp",
    "call {entry}",
    "6:",
    "cli",
    "hlt",
    "jmp 6b",
    stack = sym BOOT_STACK,
    stack_size = const BOOT_STACK_SIZE,
    entry = sym kernel_entry,
);
