//! # Physical Memory Map

use crate::config::MAX_MEMORY_REGIONS;

/// What a physical memory region may be used for.
///
/// Multiboot2 and UEFI use different type numbering; both are folded into
/// this enumeration by [`MemoryKind::from_multiboot`] and
/// [`MemoryKind::from_uefi`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MemoryKind {
    /// Free RAM.
    Usable,
    /// Not to be touched.
    Reserved,
    /// ACPI tables; reusable once parsed.
    AcpiReclaimable,
    /// ACPI non-volatile storage; preserve across sleep.
    AcpiNvs,
    /// RAM reported as faulty.
    Defective,
    /// The loaded kernel image and loader data (UEFI loader code/data).
    KernelImage,
    /// UEFI boot services code/data; free after `ExitBootServices`.
    FirmwareReclaimable,
    /// UEFI runtime services code/data.
    RuntimeServices,
    /// Memory-mapped I/O or port space reported by firmware.
    Mmio,
}

impl MemoryKind {
    /// Maps a Multiboot2 memory map entry type.
    #[must_use]
    pub const fn from_multiboot(ty: u32) -> Self {
        match ty {
            1 => Self::Usable,
            3 => Self::AcpiReclaimable,
            4 => Self::AcpiNvs,
            5 => Self::Defective,
            _ => Self::Reserved,
        }
    }

    /// Maps a UEFI `EFI_MEMORY_TYPE`.
    #[must_use]
    pub const fn from_uefi(ty: u32) -> Self {
        match ty {
            1 | 2 => Self::KernelImage,
            3 | 4 => Self::FirmwareReclaimable,
            5 | 6 => Self::RuntimeServices,
            7 => Self::Usable,
            8 => Self::Defective,
            9 => Self::AcpiReclaimable,
            10 => Self::AcpiNvs,
            11 | 12 => Self::Mmio,
            _ => Self::Reserved,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Usable => "usable",
            Self::Reserved => "reserved",
            Self::AcpiReclaimable => "acpi-reclaimable",
            Self::AcpiNvs => "acpi-nvs",
            Self::Defective => "defective",
            Self::KernelImage => "kernel",
            Self::FirmwareReclaimable => "firmware-reclaimable",
            Self::RuntimeServices => "runtime-services",
            Self::Mmio => "mmio",
        }
    }
}

/// One `{base, length, kind}` entry of the memory map.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    /// Physical start address.
    pub base: u64,
    /// Length in bytes.
    pub length: u64,
    pub kind: MemoryKind,
}

impl MemoryRegion {
    const EMPTY: Self = Self {
        base: 0,
        length: 0,
        kind: MemoryKind::Reserved,
    };

    #[must_use]
    pub const fn new(base: u64, length: u64, kind: MemoryKind) -> Self {
        Self { base, length, kind }
    }

    /// Exclusive end address, saturating at `u64::MAX`.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.base.saturating_add(self.length)
    }
}

/// Fixed-capacity memory map, kept in the order regions were reported.
///
/// Once the table is full, a new region that directly follows the last
/// stored one with the same kind is merged into it. Otherwise the table is
/// compacted by merging contiguous same-kind neighbours and the insert is
/// retried; only what still does not fit is dropped and counted.
#[derive(Clone)]
pub struct MemoryMap {
    regions: [MemoryRegion; MAX_MEMORY_REGIONS],
    len: usize,
    dropped: usize,
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMap {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            regions: [MemoryRegion::EMPTY; MAX_MEMORY_REGIONS],
            len: 0,
            dropped: 0,
        }
    }

    /// Appends a region. Zero-length regions are ignored.
    ///
    /// Returns `false` if the region had to be dropped.
    pub fn push(&mut self, region: MemoryRegion) -> bool {
        if region.length == 0 {
            return true;
        }

        if self.len == MAX_MEMORY_REGIONS {
            let last = &mut self.regions[self.len - 1];
            if last.kind == region.kind && last.end() == region.base {
                last.length = last.length.saturating_add(region.length);
                return true;
            }
            self.compact();
        }

        if self.len < MAX_MEMORY_REGIONS {
            self.regions[self.len] = region;
            self.len += 1;
            return true;
        }

        self.dropped += 1;
        false
    }

    /// Merges each region into its predecessor when both have the same kind
    /// and the predecessor ends where it starts. Order is preserved.
    fn compact(&mut self) {
        if self.len == 0 {
            return;
        }

        let mut kept = 1;
        for i in 1..self.len {
            let region = self.regions[i];
            let prev = &mut self.regions[kept - 1];
            if prev.kind == region.kind && prev.end() == region.base {
                prev.length = prev.length.saturating_add(region.length);
            } else {
                self.regions[kept] = region;
                kept += 1;
            }
        }

        let freed = self.len - kept;
        if freed > 0 {
            log::debug!("memory map: compacted {freed} contiguous regions");
        }
        self.regions[kept..self.len].fill(MemoryRegion::EMPTY);
        self.len = kept;
    }

    #[must_use]
    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions[..self.len]
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Regions that did not fit into the table.
    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped
    }

    /// Total bytes of [`MemoryKind::Usable`] memory.
    #[must_use]
    pub fn usable_bytes(&self) -> u64 {
        self.regions()
            .iter()
            .filter(|r| r.kind == MemoryKind::Usable)
            .fold(0u64, |acc, r| acc.saturating_add(r.length))
    }
}

impl core::fmt::Debug for MemoryMap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MemoryMap")
            .field("regions", &self.regions())
            .field("dropped", &self.dropped)
            .finish()
    }
}
