// =============================================================================
// PiBring - BCM2835 Mini UART Driver
// =============================================================================
// The auxiliary mini UART on GPIO 14 (TXD) / 15 (RXD), 8N1 at 115200 baud.
//
// One driver serves three consoles that differ only in which address the
// peripheral window is reached through:
//
//   EARLY_PHYSICAL   before translation is on
//   EARLY_RELOCATED  after relocation, through the early fixed offset
//   RUNTIME          after boot, through the device window
//
// Reference: BCM2835 ARM Peripherals, section 2.2
// =============================================================================

use core::fmt::{self, Write};
use spin::Mutex;

use crate::board::{regs, DEVICE_VIRT_BASE, EARLY_RELOCATED_OFFSET, PHYS_IO_BASE};
use crate::cpu;
use crate::gpio::{Gpio, GpioFunction};
use crate::irq::{self, IrqSource};
use crate::mmio::{Mmio, Volatile};

/// Line Status Register bits
mod lsr {
    /// Receive FIFO holds at least one byte.
    pub const DATA_READY: u32 = 1 << 0;

    /// Transmit FIFO can accept a byte.
    pub const TX_EMPTY: u32 = 1 << 5;
}

/// Line Control Register: 8-bit mode (bit 1 is undocumented but required).
const LCR_8BIT: u32 = 0b11;

/// Interrupt Enable: receive interrupt.
const IER_RX: u32 = 0b01;

/// Interrupt Identify write: clear both FIFOs (bits 1-2) plus FIFO enable bits.
const IIR_CLEAR_FIFOS: u32 = 0xC7;

/// Extra Control: receiver and transmitter enable.
const CNTL_RX_TX: u32 = 0b11;

/// AUX_ENABLES: mini UART enable.
const AUX_MU_ENABLE: u32 = 1;

/// (250 MHz / (115200 * 8)) - 1
pub const BAUD_115200: u32 = 270;

/// Static configuration of one mini UART console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UartConfig {
    /// Address the peripheral window is reached through.
    pub io_base: usize,
    pub tx_pin: u32,
    pub rx_pin: u32,
    pub baud_divisor: u32,
}

impl UartConfig {
    /// Used by phase 1, translation off.
    pub const EARLY_PHYSICAL: UartConfig = UartConfig::at(PHYS_IO_BASE);

    /// Used after relocation, before the runtime console is up.
    pub const EARLY_RELOCATED: UartConfig = UartConfig::at(PHYS_IO_BASE + EARLY_RELOCATED_OFFSET);

    /// The runtime console, through the device window.
    pub const RUNTIME: UartConfig = UartConfig::at(DEVICE_VIRT_BASE);

    const fn at(io_base: usize) -> Self {
        Self { io_base, tx_pin: 14, rx_pin: 15, baud_divisor: BAUD_115200 }
    }
}

/// Mini UART driver.
pub struct MiniUart<M: Mmio> {
    bus: M,
    config: UartConfig,
}

impl<M: Mmio> MiniUart<M> {
    pub const fn new(bus: M, config: UartConfig) -> Self {
        Self { bus, config }
    }

    pub fn config(&self) -> &UartConfig {
        &self.config
    }

    fn read_reg(&self, offset: usize) -> u32 {
        self.bus.read32(self.config.io_base + offset)
    }

    fn write_reg(&self, offset: usize, value: u32) {
        self.bus.write32(self.config.io_base + offset, value)
    }

    /// Full bring-up: AUX block, line settings, baud, pin muxing, pull
    /// release, then receiver and transmitter on.
    pub fn configure(&self) {
        self.write_reg(regs::AUX_ENABLES, AUX_MU_ENABLE);
        self.write_reg(regs::AUX_MU_CNTL, 0);
        self.write_reg(regs::AUX_MU_LCR, LCR_8BIT);
        self.write_reg(regs::AUX_MU_MCR, 0);
        self.write_reg(regs::AUX_MU_IER, IER_RX);
        self.write_reg(regs::AUX_MU_IIR, IIR_CLEAR_FIFOS);
        self.write_reg(regs::AUX_MU_BAUD, self.config.baud_divisor);

        let gpio = Gpio::new(&self.bus, self.config.io_base);
        gpio.set_function(self.config.tx_pin, GpioFunction::Alt5);
        gpio.set_function(self.config.rx_pin, GpioFunction::Alt5);
        gpio.disable_pull((1 << self.config.tx_pin) | (1 << self.config.rx_pin));

        self.write_reg(regs::AUX_MU_CNTL, CNTL_RX_TX);
    }

    fn tx_ready(&self) -> bool {
        self.read_reg(regs::AUX_MU_LSR) & lsr::TX_EMPTY != 0
    }

    fn rx_ready(&self) -> bool {
        self.read_reg(regs::AUX_MU_LSR) & lsr::DATA_READY != 0
    }

    /// Transmit one byte as is. Spins, without timeout, until the FIFO has room.
    pub fn put_byte(&self, byte: u8) {
        cpu::poll_until(|| self.tx_ready());
        self.write_reg(regs::AUX_MU_IO, byte as u32);
    }

    /// Transmit one character, sending CR before every LF.
    pub fn put_char(&self, c: u8) {
        if c == b'\n' {
            self.put_byte(b'\r');
        }
        self.put_byte(c);
    }

    pub fn put_string(&self, s: &str) {
        for byte in s.bytes() {
            self.put_char(byte);
        }
    }

    /// Non-blocking receive. `None` when the receive FIFO is empty.
    pub fn get_char(&self) -> Option<u8> {
        if self.rx_ready() {
            Some((self.read_reg(regs::AUX_MU_IO) & 0xFF) as u8)
        } else {
            None
        }
    }

    /// Receive interrupt: hand the non-blocking receive to `consumer`, which
    /// drains as much as it wants.
    pub fn handle_interrupt(&self, consumer: impl FnOnce(&mut dyn FnMut() -> Option<u8>)) {
        consumer(&mut || self.get_char());
    }
}

impl<M: Mmio> Write for MiniUart<M> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.put_string(s);
        Ok(())
    }
}

// =============================================================================
// Global Runtime Console
// =============================================================================

/// Transmit side of the runtime console. The lock keeps concurrent writers
/// from interleaving bytes.
static CONSOLE: Mutex<MiniUart<Volatile>> = Mutex::new(MiniUart::new(Volatile, UartConfig::RUNTIME));

/// Receive side. Touches only LSR.DR and the I/O register read path, so it
/// does not take the transmit lock.
const RECEIVER: MiniUart<Volatile> = MiniUart::new(Volatile, UartConfig::RUNTIME);

/// Register the runtime console with the interrupt controller.
///
/// Line and pin setup was done by the early console and is not repeated.
pub fn init() {
    irq::enable(&Volatile, DEVICE_VIRT_BASE, IrqSource::Aux);
}

pub fn put_char(c: u8) {
    CONSOLE.lock().put_char(c);
}

pub fn puts(s: &str) {
    CONSOLE.lock().put_string(s);
}

pub fn get_char() -> Option<u8> {
    RECEIVER.get_char()
}

/// Called by the trap layer when the AUX interrupt fires. `consumer` is the
/// console input layer; it receives the non-blocking receive primitive.
pub fn handle_interrupt(consumer: fn(&mut dyn FnMut() -> Option<u8>)) {
    RECEIVER.handle_interrupt(consumer);
}

/// Print a formatted string to the runtime console.
pub fn _print(args: fmt::Arguments) {
    // MiniUart::write_str never fails.
    let _ = CONSOLE.lock().write_fmt(args);
}

// =============================================================================
// Print Macros
// =============================================================================

/// Print to the runtime console.
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        $crate::uart::_print(format_args!($($arg)*))
    };
}

/// Print to the runtime console with a newline.
#[macro_export]
macro_rules! println {
    () => {
        $crate::print!("\n")
    };
    ($($arg:tt)*) => {
        $crate::print!("{}\n", format_args!($($arg)*))
    };
}
