// =============================================================================
// PiBring - Boot Entry Points
// =============================================================================
// Called from boot.S. `mmu_bring_up` runs from the load address with
// translation off; `mmu_finalize` runs from the high kernel alias.
//
// `mmu_bring_up` may not touch a writable static: before relocation those
// live at addresses that are not mapped yet.
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

use core::fmt::Write;

use crate::board::MemoryLayout;
use crate::cpu::{self, Cp15};
use crate::mmio::Volatile;
use crate::mmu::{Mmu, TableRegion};
use crate::uart::{MiniUart, UartConfig};

/// Phase 1: early console up, tables built, translation on.
///
/// # Safety
/// Only boot.S calls this, once, from the first physical megabyte.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mmu_bring_up() {
    let console = MiniUart::new(Volatile, UartConfig::EARLY_PHYSICAL);
    console.configure();
    console.put_string("..............\nBoot starting...\n");

    let mut table = TableRegion::at_physical();
    Mmu::new(Cp15, MemoryLayout::RPI1).bring_up(&mut table);
}

/// Phase 2: drop the identity section. Halts if phase 1 did not happen.
///
/// # Safety
/// Only boot.S calls this, after jumping to the high kernel alias.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn mmu_finalize() {
    let mut table = TableRegion::at_physical();
    if let Err(err) = Mmu::new(Cp15, MemoryLayout::RPI1).finalize(&mut table) {
        let mut console = MiniUart::new(Volatile, UartConfig::EARLY_RELOCATED);
        let _ = writeln!(console, "mmu: {}", err);
        cpu::halt();
    }
}
