// =============================================================================
// PiBring - Register Access Layer
// =============================================================================
// 32-bit memory-mapped register access. Every access is volatile: it is never
// elided, merged, or reordered against other volatile accesses, which the
// drivers rely on for status-then-data ordering.
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

use core::ptr;

/// A bus that can read and write 32-bit device registers.
///
/// Drivers are generic over this so that tests can hand them a fake register
/// file instead of real hardware.
pub trait Mmio {
    fn read32(&self, addr: usize) -> u32;
    fn write32(&self, addr: usize, value: u32);

    /// Read-modify-write helper. Only for registers where that is legal.
    fn modify32(&self, addr: usize, f: impl FnOnce(u32) -> u32) {
        let value = self.read32(addr);
        self.write32(addr, f(value));
    }
}

impl<T: Mmio> Mmio for &T {
    #[inline(always)]
    fn read32(&self, addr: usize) -> u32 {
        (**self).read32(addr)
    }

    #[inline(always)]
    fn write32(&self, addr: usize, value: u32) {
        (**self).write32(addr, value)
    }
}

/// The real bus: volatile loads and stores to the given address.
#[derive(Debug, Clone, Copy, Default)]
pub struct Volatile;

impl Mmio for Volatile {
    #[inline(always)]
    fn read32(&self, addr: usize) -> u32 {
        // SAFETY: Drivers only hand us addresses inside the peripheral window
        // that is valid for the current translation state.
        unsafe { read_register(addr) }
    }

    #[inline(always)]
    fn write32(&self, addr: usize, value: u32) {
        // SAFETY: See `read32`.
        unsafe { write_register(addr, value) }
    }
}

/// Read a 32-bit register.
///
/// # Safety
/// `addr` must be a mapped, 4-byte aligned device register.
#[inline(always)]
pub unsafe fn read_register(addr: usize) -> u32 {
    ptr::read_volatile(addr as *const u32)
}

/// Write a 32-bit register.
///
/// # Safety
/// `addr` must be a mapped, 4-byte aligned device register.
#[inline(always)]
pub unsafe fn write_register(addr: usize, value: u32) {
    ptr::write_volatile(addr as *mut u32, value)
}
