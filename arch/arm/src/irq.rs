// =============================================================================
// PiBring - BCM2835 Interrupt Enable
// =============================================================================
// The ARM interrupt controller's GPU enable register 1 gates the first 32 GPU
// interrupt sources. This core only ever sets bits there.
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

use crate::board::regs::IRQ_ENABLE_1;
use crate::mmio::Mmio;

/// GPU interrupt sources routed through enable register 1.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqSource {
    /// Auxiliary block: mini UART, SPI1, SPI2.
    Aux = 29,
}

impl IrqSource {
    #[inline]
    pub const fn mask(self) -> u32 {
        1 << (self as u32)
    }
}

/// Let `source` reach the CPU. Never undone.
pub fn enable(bus: &impl Mmio, io_base: usize, source: IrqSource) {
    bus.modify32(io_base + IRQ_ENABLE_1, |v| v | source.mask());
}
