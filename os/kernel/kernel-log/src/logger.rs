use crate::uart::{COM1, QEMU_DEBUGCON, Uart16550};
use core::fmt::{self, Write};
use core::marker::PhantomData;
use kernel_ports::{PortIo, RawPorts};
use kernel_sync::{CpuInterrupts, InterruptMask, SpinMutex, SyncOnceCell};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

struct Sink<P> {
    uart: Uart16550<P>,
    debugcon: bool,
}

impl<P: PortIo> Write for Sink<P> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for b in s.bytes() {
            if b == b'\n' {
                self.uart.write_byte(b'\r');
            }
            self.uart.write_byte(b);
            if self.debugcon {
                self.uart.ports_mut().write8(QEMU_DEBUGCON, b);
            }
        }
        Ok(())
    }
}

/// `log` backend writing to COM1 and, optionally, the QEMU debug console.
///
/// Records are written under `M`'s critical section, so an interrupt
/// handler that logs cannot interleave with the record being written.
pub struct SerialLogger<P = RawPorts, M = CpuInterrupts> {
    max_level: LevelFilter,
    sink: SpinMutex<Sink<P>>,
    _mask: PhantomData<fn() -> M>,
}

impl<P: PortIo, M: InterruptMask> SerialLogger<P, M> {
    /// A logger on COM1. Mirroring to the debug console follows the `qemu`
    /// feature.
    #[must_use]
    pub const fn new(ports: P, max_level: LevelFilter) -> Self {
        Self {
            max_level,
            sink: SpinMutex::new(Sink {
                uart: Uart16550::new(ports, COM1),
                debugcon: cfg!(feature = "qemu"),
            }),
            _mask: PhantomData,
        }
    }

    /// Turns mirroring to [`QEMU_DEBUGCON`] on or off.
    #[must_use]
    pub fn with_debugcon(mut self, enabled: bool) -> Self {
        self.sink.get_mut().debugcon = enabled;
        self
    }

    #[must_use]
    pub const fn max_level(&self) -> LevelFilter {
        self.max_level
    }

    /// (Re)programs the UART.
    pub fn reset_uart(&self) {
        self.sink.lock_masked::<M>().uart.init();
    }
}

impl SerialLogger {
    /// Installs this logger as the global `log` backend and programs the
    /// UART. Call once during early init.
    ///
    /// # Errors
    /// [`SetLoggerError`] if a logger was installed before.
    pub fn init(self) -> Result<(), SetLoggerError> {
        static LOGGER: SyncOnceCell<SerialLogger> = SyncOnceCell::new();

        let max_level = self.max_level;
        let logger = LOGGER.get_or_init(|| self);
        log::set_logger(logger)?;

        logger.reset_uart();
        log::set_max_level(max_level);
        Ok(())
    }
}

impl<P: PortIo + Send, M: InterruptMask> Log for SerialLogger<P, M> {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut sink = self.sink.lock_masked::<M>();
        // Best effort; the sink itself never fails.
        let _ = writeln!(
            sink,
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}
