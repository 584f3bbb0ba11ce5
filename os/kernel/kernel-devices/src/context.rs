use kernel_ata::{AtaController, IdeChannel};
use kernel_gfx::bga::{self, BgaProbe};
use kernel_gfx::{BackendKind, FirmwareProbe, Font, PhysMapper, Terminal, TextBuffer};
use kernel_info::config::{
    BGA_DEFAULT_BPP, BGA_DEFAULT_HEIGHT, BGA_DEFAULT_WIDTH, KEYBOARD_BUFFER_CAPACITY,
    MOUSE_BUFFER_CAPACITY,
};
use kernel_info::hardware::HardwareDescription;
use kernel_input::{KeyCode, MouseEvent, MousePacketDecoder, RingBuffer};
use kernel_pci::{PciBus, PortConfigSpace};
use kernel_ports::PortIo;
use kernel_sync::{CpuInterrupts, InterruptMask, SpinMutex};
use log::{debug, info, warn};

pub type KeyboardRing<M = CpuInterrupts> = RingBuffer<KeyCode, KEYBOARD_BUFFER_CAPACITY, M>;
pub type MouseRing<M = CpuInterrupts> = RingBuffer<MouseEvent, MOUSE_BUFFER_CAPACITY, M>;

/// The device layer's state for one boot.
///
/// `P` is the port space the drivers share; each driver gets its own clone.
/// `M` masks interrupts around PCI configuration cycles and ring buffer
/// updates.
pub struct DeviceContext<'a, P: PortIo, M: InterruptMask = CpuInterrupts> {
    pci: PciBus<PortConfigSpace<P, M>>,
    terminal: Terminal<'a, P>,
    ata: AtaController<P>,
    keyboard: KeyboardRing<M>,
    mouse: MouseRing<M>,
    mouse_decoder: SpinMutex<MousePacketDecoder>,
}

impl<'a, P: PortIo + Clone, M: InterruptMask> DeviceContext<'a, P, M> {
    /// Brings up every device the machine offers.
    ///
    /// `mapper` maps framebuffers into the kernel's address space;
    /// `vga_text` is the 80x25 text buffer used until (or instead of) a
    /// pixel backend.
    pub fn init(
        hw: &HardwareDescription,
        ports: P,
        mapper: &mut dyn PhysMapper,
        vga_text: TextBuffer<'a>,
    ) -> Self {
        let mut pci = PciBus::init(PortConfigSpace::<P, M>::with_mask(ports.clone()));
        let functions = pci
            .devices()
            .inspect(|d| {
                debug!(
                    "PCI: {} {:04x}:{:04x} class {:02x}:{:02x}.{:02x}",
                    d.address, d.vendor_id, d.device_id, d.class, d.subclass, d.prog_if
                );
            })
            .count();
        info!("PCI: {functions} functions");

        let terminal = Self::init_graphics(hw, &mut pci, ports.clone(), mapper, vga_text);

        let channels = IdeChannel::from_pci(&mut pci);
        let ata = AtaController::init(ports, channels);
        info!("ATA: {} drives", ata.devices().count());

        let ctx = Self {
            pci,
            terminal,
            ata,
            keyboard: RingBuffer::new(),
            mouse: RingBuffer::new(),
            mouse_decoder: SpinMutex::new(MousePacketDecoder::new()),
        };
        info!(
            "Input: keyboard ring {} entries, mouse ring {} entries",
            ctx.keyboard.capacity(),
            ctx.mouse.capacity()
        );
        ctx
    }

    fn init_graphics(
        hw: &HardwareDescription,
        pci: &mut PciBus<PortConfigSpace<P, M>>,
        ports: P,
        mapper: &mut dyn PhysMapper,
        vga_text: TextBuffer<'a>,
    ) -> Terminal<'a, P> {
        let font = Font::builtin()
            .inspect_err(|e| warn!("GFX: built-in font unusable: {e}"))
            .ok();

        let mut firmware = FirmwareProbe::new(hw.framebuffer().copied());
        let mut chipset = BgaProbe::new(
            ports.clone(),
            bga::lfb_base(pci),
            (BGA_DEFAULT_WIDTH, BGA_DEFAULT_HEIGHT, BGA_DEFAULT_BPP),
        );

        let mut terminal = Terminal::new(font, vga_text, ports);
        match terminal.select_backend(&mut [&mut firmware, &mut chipset], mapper) {
            Some(device) => info!(
                "GFX: {} {}x{}x{}",
                device.name(),
                device.width(),
                device.height(),
                device.bits_per_pixel()
            ),
            None => info!("GFX: VGA text mode"),
        }
        terminal.clear();
        terminal
    }

    #[must_use]
    pub fn backend(&self) -> BackendKind {
        self.terminal.backend()
    }

    pub const fn terminal(&mut self) -> &mut Terminal<'a, P> {
        &mut self.terminal
    }

    pub const fn pci(&mut self) -> &mut PciBus<PortConfigSpace<P, M>> {
        &mut self.pci
    }

    pub const fn ata(&mut self) -> &mut AtaController<P> {
        &mut self.ata
    }

    /// Keycodes for the keyboard ISR to push and the kernel to poll.
    #[must_use]
    pub const fn keyboard(&self) -> &KeyboardRing<M> {
        &self.keyboard
    }

    #[must_use]
    pub const fn mouse(&self) -> &MouseRing<M> {
        &self.mouse
    }

    /// Feeds one byte of the PS/2 mouse stream; a completed packet is
    /// pushed onto the mouse ring.
    ///
    /// Callable from the mouse ISR: the decoder state is updated under `M`
    /// like the ring itself.
    pub fn feed_mouse_byte(&self, byte: u8) {
        let event = self.mouse_decoder.lock_masked::<M>().feed(byte);
        if let Some(event) = event {
            self.mouse.push(event);
        }
    }
}
