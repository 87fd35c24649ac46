// =============================================================================
// PiBring - BCM2835 GPIO
// =============================================================================
// Function-select multiplexing, output set/clear and the clocked pull-up/down
// release sequence for pins 0-53.
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

use crate::board::regs::{GPCLR0, GPFSEL0, GPPUD, GPPUDCLK0, GPSET0};
use crate::cpu;
use crate::mmio::Mmio;

/// Highest valid pin number.
pub const MAX_PIN: u32 = 53;

/// Cycles the pull-up/down control must be held before and after clocking.
pub const PULL_SETTLE_CYCLES: u32 = 150;

/// Function select values (3 bits per pin).
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioFunction {
    Input = 0b000,
    Output = 0b001,
    Alt0 = 0b100,
    Alt1 = 0b101,
    Alt2 = 0b110,
    Alt3 = 0b111,
    Alt4 = 0b011,
    Alt5 = 0b010,
}

impl GpioFunction {
    #[inline]
    pub const fn bits(self) -> u32 {
        self as u32
    }
}

/// The GPIO block at a given peripheral base.
pub struct Gpio<'a, M: Mmio> {
    bus: &'a M,
    base: usize,
}

impl<'a, M: Mmio> Gpio<'a, M> {
    /// `base` is the peripheral window base (physical or virtual).
    pub const fn new(bus: &'a M, base: usize) -> Self {
        Self { bus, base }
    }

    /// Route `pin` to `function`. Pins above 53 are ignored.
    pub fn set_function(&self, pin: u32, function: GpioFunction) {
        if pin > MAX_PIN {
            return;
        }
        let reg = self.base + GPFSEL0 + (pin / 10) as usize * 4;
        let shift = (pin % 10) * 3;
        self.bus
            .modify32(reg, |v| (v & !(0b111 << shift)) | (function.bits() << shift));
    }

    /// Drive `pin` high (`true`) or low (`false`). Pins above 53 are ignored.
    ///
    /// SET and CLR are write-one registers; they are never read.
    pub fn set_output(&self, pin: u32, value: bool) {
        if pin > MAX_PIN {
            return;
        }
        let bank = (pin >> 5) as usize * 4;
        let bit = 1 << (pin & 0x1F);
        let reg = if value { GPSET0 } else { GPCLR0 };
        self.bus.write32(self.base + reg + bank, bit);
    }

    /// Disengage pull-up/down on the pins in `mask` (bank 0 only).
    pub fn disable_pull(&self, mask: u32) {
        self.bus.write32(self.base + GPPUD, 0);
        cpu::delay(PULL_SETTLE_CYCLES);
        self.bus.write32(self.base + GPPUDCLK0, mask);
        cpu::delay(PULL_SETTLE_CYCLES);
        self.bus.write32(self.base + GPPUDCLK0, 0);
    }
}
