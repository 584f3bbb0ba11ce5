/// A Multiboot2 information block that cannot be trusted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BootInfoError {
    #[error("boot information at {addr:#x} is null or not 8-byte aligned")]
    Misaligned { addr: u64 },
    #[error("boot information claims {total} bytes, {available} readable")]
    BadTotalSize { total: u32, available: usize },
    #[error("tag type {kind} at offset {offset:#x} has invalid size {size}")]
    BadTag { offset: usize, kind: u32, size: u32 },
    #[error("tag type {kind} is {size} bytes, needs at least {need}")]
    TruncatedTag { kind: u32, size: usize, need: usize },
    #[error("memory map entry size {entry_size} is unusable")]
    MalformedMemoryMap { entry_size: u32 },
    #[error("tag list ends without an end tag")]
    MissingEndTag,
}

/// The UEFI boot path could not collect what the kernel needs.
///
/// Boot services may already be partly torn down when these occur, so the
/// kernel halts on any of them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FirmwareBootError {
    #[error("no Graphics Output Protocol")]
    GopMissing,
    #[error("no 32-bit RGB/BGR display mode at or below the width limit")]
    NoSuitableMode,
    #[error("setting display mode {mode} failed with status {status:#x}")]
    SetModeFailed { mode: usize, status: usize },
    #[error("memory map query failed with status {status:#x}")]
    MemoryMapQuery { status: usize },
}
