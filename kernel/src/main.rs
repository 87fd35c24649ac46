// =============================================================================
// PiBring - Kernel Entry Point
// =============================================================================
// boot.S calls `kernel_main` once .bss is zero and both MMU phases are done.
// From here on the runtime console and the logger are available.
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

#![no_std]
#![no_main]

use core::panic::PanicInfo;

use log::LevelFilter;
use pibring_arch_arm::{self as arch, cpu, println};

/// PiBring version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Kernel main entry point.
///
/// # Safety
/// This function must be called only once, by the boot assembly code.
#[unsafe(no_mangle)]
pub extern "C" fn kernel_main() -> ! {
    arch::init(LevelFilter::Info);

    println!();
    println!("PiBring {} on BCM2835", VERSION);
    log::info!("kernel at {:#010x}, devices at {:#010x}", arch::board::KERNEL_BASE, arch::board::DEVICE_VIRT_BASE);

    // Interrupt dispatch and the console input layer are attached by the
    // rest of the kernel; until then, idle.
    cpu::halt();
}

/// Panic handler.
///
/// Called when the kernel encounters an unrecoverable error.
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    println!();
    println!("!!! KERNEL PANIC !!!");
    println!("{}", info);
    println!("System halted.");

    cpu::halt();
}
