// =============================================================================
// PiBring - CPU Utilities
// =============================================================================
// ARM1176 control: the CP15 operations the MMU sequence needs, plus halt,
// busy-wait delay and the polling helper every driver spins on.
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

use bitflags::bitflags;

bitflags! {
    /// CP15 c1 System Control Register bits touched by the bring-up.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControlFlags: u32 {
        /// MMU (address translation) enable.
        const MMU            = 1 << 0;
        /// Strict alignment fault checking.
        const ALIGNMENT      = 1 << 1;
        /// L1 data cache enable.
        const DCACHE         = 1 << 2;
        /// Branch prediction enable.
        const BRANCH_PREDICT = 1 << 11;
        /// L1 instruction cache enable.
        const ICACHE         = 1 << 12;
        /// Exception vectors at 0xFFFF_0000.
        const HIGH_VECTORS   = 1 << 13;
    }
}

impl ControlFlags {
    /// Cleared before the tables are rebuilt.
    pub const DISABLE_MASK: ControlFlags = ControlFlags::MMU
        .union(ControlFlags::DCACHE)
        .union(ControlFlags::BRANCH_PREDICT)
        .union(ControlFlags::ICACHE);

    /// Set in one write when translation comes back on.
    pub const ENABLE_MASK: ControlFlags = ControlFlags::MMU
        .union(ControlFlags::DCACHE)
        .union(ControlFlags::ICACHE)
        .union(ControlFlags::HIGH_VECTORS);
}

/// Domain Access Control value: domain 0 is a client, others no access.
pub const DOMAIN_ACCESS_CLIENT_D0: u32 = 0b01;

/// Value written to the c15/c12 feature control register on enable.
pub const FEATURE_CONTROL_ENABLE: u32 = 1;

/// Privileged coprocessor operations the MMU sequence is built from.
///
/// Each operation is coarse on purpose: `disable_translation` and
/// `enable_translation` are single instruction sequences on hardware, with no
/// memory accesses or far branches in between.
pub trait SystemControl {
    /// Whether SCTLR.M is currently set.
    fn translation_enabled(&self) -> bool;

    /// Clear M, C, Z and I in SCTLR, then invalidate both caches and all TLBs.
    ///
    /// # Safety
    /// The caller must be executing from an address that stays valid once
    /// translation is off.
    unsafe fn disable_translation(&self);

    /// Domain 0 to client, TTBR0 to `l1_base`, SCTLR |= M | C | I | V, and the
    /// c15 feature control write.
    ///
    /// # Safety
    /// `l1_base` must hold a fully populated L1 directory that maps the code
    /// currently executing.
    unsafe fn enable_translation(&self, l1_base: usize);

    /// Invalidate both caches and all TLB entries.
    ///
    /// # Safety
    /// Dirty data cache lines are discarded.
    unsafe fn invalidate_caches_and_tlb(&self);

    /// Clean and invalidate data cache lines from `start` to `end` inclusive,
    /// then drain the write buffer.
    ///
    /// # Safety
    /// Both addresses must be mapped.
    unsafe fn clean_dcache_range(&self, start: usize, end: usize);

    /// Invalidate all TLB entries and drain the write buffer.
    ///
    /// # Safety
    /// Always sound on its own; unsafe for symmetry with the rest of the set.
    unsafe fn invalidate_tlb(&self);
}

/// The ARM1176 CP15 coprocessor.
#[cfg(target_arch = "arm")]
#[derive(Debug, Clone, Copy, Default)]
pub struct Cp15;

#[cfg(target_arch = "arm")]
impl SystemControl for Cp15 {
    #[inline(always)]
    fn translation_enabled(&self) -> bool {
        let sctlr: u32;
        unsafe {
            core::arch::asm!(
                "mrc p15, 0, {0}, c1, c0, 0",
                out(reg) sctlr,
                options(nomem, nostack, preserves_flags)
            );
        }
        ControlFlags::from_bits_retain(sctlr).contains(ControlFlags::MMU)
    }

    #[inline(always)]
    unsafe fn disable_translation(&self) {
        core::arch::asm!(
            "mrc p15, 0, {ctl}, c1, c0, 0",
            "bic {ctl}, {ctl}, #{dcache}",
            "bic {ctl}, {ctl}, #{icache}",
            "bic {ctl}, {ctl}, #{bp}",
            "bic {ctl}, {ctl}, #{mmu}",
            "mcr p15, 0, {ctl}, c1, c0, 0",
            "mov {zero}, #0",
            "mcr p15, 0, {zero}, c7, c7, 0",
            "mcr p15, 0, {zero}, c8, c7, 0",
            ctl = out(reg) _,
            zero = out(reg) _,
            dcache = const ControlFlags::DCACHE.bits(),
            icache = const ControlFlags::ICACHE.bits(),
            bp = const ControlFlags::BRANCH_PREDICT.bits(),
            mmu = const ControlFlags::MMU.bits(),
            options(nostack)
        );
    }

    #[inline(always)]
    unsafe fn enable_translation(&self, l1_base: usize) {
        core::arch::asm!(
            "mcr p15, 0, {dacr}, c3, c0, 0",
            "mcr p15, 0, {ttb}, c2, c0, 0",
            "mrc p15, 0, {ctl}, c1, c0, 0",
            "orr {ctl}, {ctl}, #{hv}",
            "orr {ctl}, {ctl}, #{dcache}",
            "orr {ctl}, {ctl}, #{icache}",
            "orr {ctl}, {ctl}, #{mmu}",
            "mcr p15, 0, {ctl}, c1, c0, 0",
            "mcr p15, 0, {feat}, c15, c12, 0",
            dacr = in(reg) DOMAIN_ACCESS_CLIENT_D0,
            ttb = in(reg) l1_base,
            feat = in(reg) FEATURE_CONTROL_ENABLE,
            ctl = out(reg) _,
            hv = const ControlFlags::HIGH_VECTORS.bits(),
            dcache = const ControlFlags::DCACHE.bits(),
            icache = const ControlFlags::ICACHE.bits(),
            mmu = const ControlFlags::MMU.bits(),
            options(nostack)
        );
    }

    #[inline(always)]
    unsafe fn invalidate_caches_and_tlb(&self) {
        core::arch::asm!(
            "mcr p15, 0, {0}, c7, c7, 0",
            "mcr p15, 0, {0}, c8, c7, 0",
            in(reg) 0u32,
            options(nostack)
        );
    }

    unsafe fn clean_dcache_range(&self, start: usize, end: usize) {
        let mut line = start;
        while line <= end {
            core::arch::asm!("mcr p15, 0, {0}, c7, c14, 1", in(reg) line, options(nostack));
            line += crate::board::CACHE_LINE_SIZE;
        }
        // Data synchronization barrier (drain write buffer).
        core::arch::asm!("mcr p15, 0, {0}, c7, c10, 4", in(reg) 0u32, options(nostack));
    }

    #[inline(always)]
    unsafe fn invalidate_tlb(&self) {
        core::arch::asm!(
            "mcr p15, 0, {0}, c8, c7, 0",
            "mcr p15, 0, {0}, c7, c10, 4",
            in(reg) 0u32,
            options(nostack)
        );
    }
}

/// Halt the CPU in a low-power state.
///
/// Never returns. Used once nothing else can be done.
#[inline(always)]
pub fn halt() -> ! {
    loop {
        #[cfg(target_arch = "arm")]
        unsafe {
            // Wait For Interrupt, ARMv6 CP15 encoding.
            core::arch::asm!("mcr p15, 0, {0}, c7, c0, 4", in(reg) 0u32, options(nostack));
        }
        #[cfg(not(target_arch = "arm"))]
        core::hint::spin_loop();
    }
}

/// Busy-wait for roughly `cycles` loop iterations.
#[inline(always)]
pub fn delay(cycles: u32) {
    for _ in 0..cycles {
        #[cfg(target_arch = "arm")]
        unsafe {
            core::arch::asm!("nop", options(nomem, nostack, preserves_flags));
        }
        #[cfg(not(target_arch = "arm"))]
        core::hint::spin_loop();
    }
}

/// Spin until `ready` returns true.
///
/// There is no timeout: a device that never becomes ready hangs the caller.
#[inline]
pub fn poll_until(mut ready: impl FnMut() -> bool) {
    while !ready() {
        core::hint::spin_loop();
    }
}
