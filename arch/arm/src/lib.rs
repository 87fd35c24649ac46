// =============================================================================
// PiBring - ARM Architecture Module
// =============================================================================
// Everything that runs before the kernel proper on the BCM2835:
// - Register access and GPIO multiplexing
// - Mini UART consoles (early and runtime)
// - Translation tables and the two-phase MMU bring-up
// - Interrupt enable registration for the mini UART
// - Console logger
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

#![cfg_attr(not(test), no_std)]

pub mod board;
pub mod cpu;
pub mod gpio;
pub mod irq;
pub mod logger;
pub mod mmio;
pub mod mmu;
pub mod uart;

#[cfg(target_arch = "arm")]
pub mod boot;

#[cfg(test)]
mod testing;

/// Bring up the runtime side once the MMU is in its steady state.
///
/// Registers the mini UART interrupt and installs the console logger.
pub fn init(level: log::LevelFilter) {
    uart::init();
    // A second install attempt is harmless; the first logger stays.
    let _ = logger::init(level);
    log::info!("pibring: runtime console up");
}
