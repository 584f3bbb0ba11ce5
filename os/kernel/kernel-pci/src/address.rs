/// A `(bus, device, function)` location in configuration space.
///
/// Ordering is lexicographic over `(bus, device, function)`, which is the
/// enumeration order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PciAddress {
    bus: u8,
    device: u8,
    function: u8,
}

impl PciAddress {
    pub const MAX_DEVICE: u8 = 31;
    pub const MAX_FUNCTION: u8 = 7;

    /// Returns `None` if `device > 31` or `function > 7`.
    #[must_use]
    pub const fn new(bus: u8, device: u8, function: u8) -> Option<Self> {
        if device > Self::MAX_DEVICE || function > Self::MAX_FUNCTION {
            return None;
        }
        Some(Self {
            bus,
            device,
            function,
        })
    }

    #[must_use]
    pub const fn bus(self) -> u8 {
        self.bus
    }

    #[must_use]
    pub const fn device(self) -> u8 {
        self.device
    }

    #[must_use]
    pub const fn function(self) -> u8 {
        self.function
    }

    /// The next address in enumeration order, or `None` after `ff:1f.7`.
    #[must_use]
    pub const fn successor(self) -> Option<Self> {
        if self.function < Self::MAX_FUNCTION {
            return Some(Self {
                function: self.function + 1,
                ..self
            });
        }
        self.next_device()
    }

    /// Function 0 of the next device slot, or `None` past the last bus.
    #[must_use]
    pub const fn next_device(self) -> Option<Self> {
        if self.device < Self::MAX_DEVICE {
            return Some(Self {
                bus: self.bus,
                device: self.device + 1,
                function: 0,
            });
        }
        if self.bus < u8::MAX {
            return Some(Self {
                bus: self.bus + 1,
                device: 0,
                function: 0,
            });
        }
        None
    }
}

impl core::fmt::Display for PciAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:02x}:{:02x}.{}", self.bus, self.device, self.function)
    }
}

/// Enumeration position; a search resumes strictly after the last hit.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PciCursor {
    last: Option<PciAddress>,
    exhausted: bool,
}

impl PciCursor {
    /// A cursor positioned before `00:00.0`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last: None,
            exhausted: false,
        }
    }

    /// A cursor whose next search starts after `addr`.
    #[must_use]
    pub const fn after(addr: PciAddress) -> Self {
        Self {
            last: Some(addr),
            exhausted: false,
        }
    }

    /// The address the next search starts at.
    pub(crate) const fn start(&self) -> Option<PciAddress> {
        if self.exhausted {
            return None;
        }
        match self.last {
            None => Some(PciAddress {
                bus: 0,
                device: 0,
                function: 0,
            }),
            Some(addr) => addr.successor(),
        }
    }

    pub(crate) const fn advance(&mut self, hit: PciAddress) {
        self.last = Some(hit);
    }

    pub(crate) const fn finish(&mut self) {
        self.exhausted = true;
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}
