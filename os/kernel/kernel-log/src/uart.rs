use kernel_ports::PortIo;

/// I/O base of the first serial port.
pub const COM1: u16 = 0x3F8;

/// QEMU's debug console, enabled with `-debugcon`.
pub const QEMU_DEBUGCON: u16 = 0x402;

pub const BAUD_RATE: u32 = 115_200;

/// Line status reads before a byte is sent regardless.
pub const TX_SPIN_BUDGET: u32 = 10_000;

/// Register offsets from the port base.
mod reg {
    pub const DATA: u16 = 0;
    pub const INTERRUPT_ENABLE: u16 = 1;
    /// Divisor latch, low/high byte, while `LCR_DLAB` is set.
    pub const DIVISOR_LOW: u16 = 0;
    pub const DIVISOR_HIGH: u16 = 1;
    pub const FIFO_CONTROL: u16 = 2;
    pub const LINE_CONTROL: u16 = 3;
    pub const MODEM_CONTROL: u16 = 4;
    pub const LINE_STATUS: u16 = 5;
}

const UART_CLOCK: u32 = 115_200;
const LCR_DLAB: u8 = 0x80;
const LCR_8N1: u8 = 0x03;
/// Enable, clear both FIFOs, 14-byte trigger level.
const FCR_ENABLE: u8 = 0xC7;
/// DTR, RTS, OUT2.
const MCR_READY: u8 = 0x0B;
const LSR_THR_EMPTY: u8 = 0x20;

/// A 16550-compatible UART, transmit side only.
pub struct Uart16550<P> {
    ports: P,
    base: u16,
}

impl<P: PortIo> Uart16550<P> {
    #[must_use]
    pub const fn new(ports: P, base: u16) -> Self {
        Self { ports, base }
    }

    /// Programs 115200 8N1 with FIFOs on and interrupts off.
    pub fn init(&mut self) {
        let [low, high] = u16::try_from(UART_CLOCK / BAUD_RATE)
            .unwrap_or(1)
            .to_le_bytes();

        self.write(reg::INTERRUPT_ENABLE, 0x00);
        self.write(reg::LINE_CONTROL, LCR_DLAB);
        self.write(reg::DIVISOR_LOW, low);
        self.write(reg::DIVISOR_HIGH, high);
        self.write(reg::LINE_CONTROL, LCR_8N1);
        self.write(reg::FIFO_CONTROL, FCR_ENABLE);
        self.write(reg::MODEM_CONTROL, MCR_READY);
    }

    /// Sends one byte once the transmit holding register is free, or after
    /// [`TX_SPIN_BUDGET`] status reads.
    pub fn write_byte(&mut self, byte: u8) {
        for _ in 0..TX_SPIN_BUDGET {
            if self.ports.read8(self.base + reg::LINE_STATUS) & LSR_THR_EMPTY != 0 {
                break;
            }
            core::hint::spin_loop();
        }
        self.write(reg::DATA, byte);
    }

    /// The port space the UART is driven through.
    pub const fn ports_mut(&mut self) -> &mut P {
        &mut self.ports
    }

    fn write(&mut self, offset: u16, value: u8) {
        self.ports.write8(self.base + offset, value);
    }
}
