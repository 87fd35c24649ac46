// =============================================================================
// PiBring - Memory Management Unit (MMU)
// =============================================================================
// Builds the kernel translation tables and switches translation on in two
// phases:
//
//   bring_up  (phase 1)  disable, zero, populate, enable, invalidate
//   finalize  (phase 2)  drop the identity section for the first megabyte,
//                        clean its cache line, invalidate the TLB
//
// Between the two phases the first megabyte of RAM is reachable both at its
// physical address and at KERNEL_BASE. Boot code jumps to the high alias
// before calling `finalize`.
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

pub mod descriptor;
pub mod table;

use core::fmt;

use crate::board::{MemoryLayout, CACHE_LINE_SIZE};
use crate::cpu::SystemControl;

pub use descriptor::{AccessPermission, CacheFlags, L1Entry, L1Kind, L2Entry};
use descriptor::{l1_index, l2_index, SECTION_SIZE};
pub use table::{MappingKind, TableRegion, Translation, TranslationFault};

/// Domain every kernel mapping is tagged with.
pub const KERNEL_DOMAIN: u8 = 0;

/// Where the bring-up sequence stands.
///
/// Not stored anywhere: it is read back from SCTLR.M and from the table
/// itself, so pre-relocation code never needs a writable static.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmuState {
    /// Our tables are not populated.
    Disabled,
    /// Tables populated, translation off.
    Built,
    /// Translation on, identity section for the first megabyte still present.
    Enabled,
    /// Translation on, identity section removed.
    Steady,
}

/// Phase ordering violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmuError {
    /// `finalize` needs translation on with the identity section in place.
    NotEnabled(MmuState),
}

impl fmt::Display for MmuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MmuError::NotEnabled(state) => {
                write!(f, "cannot finalize translation tables in state {:?}", state)
            }
        }
    }
}

/// Map `size` bytes at `va` to `pa` with 1 MiB sections.
pub fn map_sections(
    table: &mut TableRegion<'_>,
    va: usize,
    pa: usize,
    size: usize,
    cache: CacheFlags,
) {
    for offset in (0..size).step_by(SECTION_SIZE) {
        table.set_l1(
            l1_index(va + offset),
            L1Entry::section(pa + offset, KERNEL_DOMAIN, AccessPermission::KernelRw, cache),
        );
    }
}

/// Populate an already zeroed region with the kernel address space.
pub fn populate(table: &mut TableRegion<'_>, layout: &MemoryLayout) {
    // All of RAM at the kernel base.
    map_sections(table, layout.kernel_base, layout.ram_start, layout.ram_size, CacheFlags::NORMAL);

    // First megabyte identity mapped so the PC stays valid across the enable.
    map_sections(table, layout.ram_start, layout.ram_start, SECTION_SIZE, CacheFlags::NORMAL);

    // Peripherals, uncached.
    map_sections(table, layout.io_virt_base, layout.io_phys_base, layout.io_size, CacheFlags::DEVICE);

    // GPU-shared memory, identity mapped, uncached.
    map_sections(table, layout.gpu_mem_base, layout.gpu_mem_base, layout.gpu_mem_size, CacheFlags::DEVICE);

    // High vectors: one small page back onto the start of RAM.
    let l2 = table.l2_base();
    table.set_l1(l1_index(layout.high_vectors), L1Entry::coarse(l2, KERNEL_DOMAIN));
    table.set_l2(
        l2_index(layout.high_vectors),
        L2Entry::small_page(layout.ram_start, AccessPermission::KernelRw, CacheFlags::DEVICE),
    );
}

/// Inclusive cache-line range covering the 4-byte descriptor at `addr`.
pub const fn descriptor_cache_lines(addr: usize) -> (usize, usize) {
    let mask = !(CACHE_LINE_SIZE - 1);
    (addr & mask, (addr + 4) & mask)
}

/// The MMU bring-up sequence over a coprocessor implementation.
pub struct Mmu<C: SystemControl> {
    cpu: C,
    layout: MemoryLayout,
}

impl<C: SystemControl> Mmu<C> {
    pub const fn new(cpu: C, layout: MemoryLayout) -> Self {
        Self { cpu, layout }
    }

    pub fn cpu(&self) -> &C {
        &self.cpu
    }

    pub fn layout(&self) -> &MemoryLayout {
        &self.layout
    }

    /// Read the current state back from hardware and the table.
    pub fn state(&self, table: &TableRegion<'_>) -> MmuState {
        let populated = matches!(
            table.l1(l1_index(self.layout.kernel_base)).kind(),
            L1Kind::Section { .. }
        );
        if !populated {
            return MmuState::Disabled;
        }
        if !self.cpu.translation_enabled() {
            return MmuState::Built;
        }
        if self.identity_present(table) {
            MmuState::Enabled
        } else {
            MmuState::Steady
        }
    }

    fn identity_present(&self, table: &TableRegion<'_>) -> bool {
        let ram = self.layout.ram_start;
        matches!(
            table.l1(l1_index(ram)).kind(),
            L1Kind::Section { base, .. } if base == ram
        )
    }

    /// Phase 1: rebuild the tables from scratch and turn translation on.
    ///
    /// Runs from any state. Nothing here may touch memory outside `table`
    /// before `disable_translation` returns.
    ///
    /// # Safety
    /// Must run from the first physical megabyte, with `table` placed at the
    /// physical address it reports.
    pub unsafe fn bring_up(&self, table: &mut TableRegion<'_>) {
        self.cpu.disable_translation();
        table.zero();
        populate(table, &self.layout);
        self.cpu.enable_translation(table.l1_base());
        self.cpu.invalidate_caches_and_tlb();
    }

    /// Phase 2: remove the transient identity section.
    ///
    /// # Safety
    /// The caller must already execute from the high kernel alias.
    pub unsafe fn finalize(&self, table: &mut TableRegion<'_>) -> Result<(), MmuError> {
        let state = self.state(table);
        if state != MmuState::Enabled {
            log::warn!("mmu: finalize refused in state {:?}", state);
            return Err(MmuError::NotEnabled(state));
        }

        let index = l1_index(self.layout.ram_start);
        table.set_l1(index, L1Entry::FAULT);

        let (start, end) = descriptor_cache_lines(table.l1_entry_address(index));
        self.cpu.clean_dcache_range(start, end);
        self.cpu.invalidate_tlb();

        log::debug!("mmu: identity section {:#x} removed", index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{MBYTE, TABLE_REGION_START};
    use crate::testing::{CpuOp, RecordingCpu};
    use std::boxed::Box;
    use super::table::REGION_WORDS;

    const LAYOUT: MemoryLayout = MemoryLayout::RPI1;

    fn words() -> Box<[u32; REGION_WORDS]> {
        Box::new([0u32; REGION_WORDS])
    }

    fn brought_up(words: &mut [u32; REGION_WORDS]) -> (Mmu<RecordingCpu>, TableRegion<'_>) {
        let mmu = Mmu::new(RecordingCpu::new(), LAYOUT);
        let mut table = TableRegion::new(words, TABLE_REGION_START);
        unsafe { mmu.bring_up(&mut table) };
        (mmu, table)
    }

    #[test]
    fn ram_resolves_through_kernel_base() {
        let mut w = words();
        let (_, table) = brought_up(&mut w);
        for pa in (LAYOUT.ram_start..LAYOUT.ram_start + LAYOUT.ram_size).step_by(MBYTE / 4) {
            let va = LAYOUT.kernel_base + (pa - LAYOUT.ram_start);
            let t = table.translate(va + 0x123).unwrap();
            assert_eq!(t.pa, pa + 0x123);
            assert_eq!(t.kind, MappingKind::Section);
            assert_eq!(t.domain, KERNEL_DOMAIN);
            assert_eq!(t.ap, AccessPermission::KernelRw);
            assert_eq!(t.cache, CacheFlags::NORMAL);
        }
        let past_end = LAYOUT.kernel_base + LAYOUT.ram_size;
        assert!(table.translate(past_end).is_err());
    }

    #[test]
    fn device_window_is_uncached() {
        let mut w = words();
        let (_, table) = brought_up(&mut w);
        for offset in (0..LAYOUT.io_size).step_by(MBYTE) {
            let t = table.translate(LAYOUT.io_virt_base + offset).unwrap();
            assert_eq!(t.pa, LAYOUT.io_phys_base + offset);
            assert_eq!(t.cache, CacheFlags::DEVICE);
            assert_eq!(t.ap, AccessPermission::KernelRw);
        }
    }

    #[test]
    fn gpu_memory_is_identity_and_uncached() {
        let mut w = words();
        let (_, table) = brought_up(&mut w);
        for offset in (0..LAYOUT.gpu_mem_size).step_by(64 * MBYTE) {
            let va = LAYOUT.gpu_mem_base + offset;
            let t = table.translate(va).unwrap();
            assert_eq!(t.pa, va);
            assert_eq!(t.cache, CacheFlags::DEVICE);
        }
    }

    #[test]
    fn vector_page_resolves_to_ram_start_via_l2() {
        let mut w = words();
        let (_, table) = brought_up(&mut w);
        let t = table.translate(LAYOUT.high_vectors + 0x18).unwrap();
        assert_eq!(t.kind, MappingKind::SmallPage);
        assert_eq!(t.pa, LAYOUT.ram_start + 0x18);
        assert_eq!(t.ap, AccessPermission::KernelRw);
        // Only that one page of the top megabyte is mapped.
        assert!(table.translate(LAYOUT.high_vectors + 0x1000).is_err());
    }

    #[test]
    fn identity_section_lives_until_finalize() {
        let mut w = words();
        let (mmu, mut table) = brought_up(&mut w);
        let t = table.translate(LAYOUT.ram_start + 0x8000).unwrap();
        assert_eq!(t.pa, LAYOUT.ram_start + 0x8000);
        assert_eq!(mmu.state(&table), MmuState::Enabled);

        unsafe { mmu.finalize(&mut table) }.unwrap();
        assert_eq!(
            table.translate(LAYOUT.ram_start + 0x8000),
            Err(TranslationFault::Section { va: LAYOUT.ram_start + 0x8000 })
        );
        assert_eq!(mmu.state(&table), MmuState::Steady);
        // The high alias is untouched.
        assert_eq!(table.translate(LAYOUT.kernel_base + 0x8000).unwrap().pa, 0x8000);
    }

    #[test]
    fn bring_up_sequence_order() {
        let mut w = words();
        let (mmu, _) = brought_up(&mut w);
        assert_eq!(
            mmu.cpu().ops(),
            vec![
                CpuOp::DisableTranslation,
                CpuOp::EnableTranslation { l1_base: 0x4000 },
                CpuOp::InvalidateCachesAndTlb,
            ]
        );
    }

    #[test]
    fn finalize_cleans_descriptor_line_then_invalidates_tlb() {
        let mut w = words();
        let (mmu, mut table) = brought_up(&mut w);
        mmu.cpu().clear();
        unsafe { mmu.finalize(&mut table) }.unwrap();
        assert_eq!(
            mmu.cpu().ops(),
            vec![
                CpuOp::CleanDcacheRange { start: 0x4000, end: 0x4000 },
                CpuOp::InvalidateTlb,
            ]
        );
    }

    #[test]
    fn cache_range_rounds_down_to_lines() {
        assert_eq!(descriptor_cache_lines(0x4000), (0x4000, 0x4000));
        assert_eq!(descriptor_cache_lines(0x401C), (0x4000, 0x4020));
        assert_eq!(descriptor_cache_lines(0x4024), (0x4020, 0x4020));
    }

    #[test]
    fn finalize_out_of_order_is_refused() {
        let mut w = words();
        let mmu = Mmu::new(RecordingCpu::new(), LAYOUT);
        let mut table = TableRegion::new(&mut w, TABLE_REGION_START);
        assert_eq!(mmu.state(&table), MmuState::Disabled);
        assert_eq!(
            unsafe { mmu.finalize(&mut table) },
            Err(MmuError::NotEnabled(MmuState::Disabled))
        );

        populate(&mut table, &LAYOUT);
        assert_eq!(mmu.state(&table), MmuState::Built);
        assert_eq!(
            unsafe { mmu.finalize(&mut table) },
            Err(MmuError::NotEnabled(MmuState::Built))
        );
        assert!(mmu.cpu().ops().is_empty());
    }

    #[test]
    fn second_finalize_is_refused() {
        let mut w = words();
        let (mmu, mut table) = brought_up(&mut w);
        unsafe { mmu.finalize(&mut table) }.unwrap();
        let snapshot = *table.words();
        assert_eq!(
            unsafe { mmu.finalize(&mut table) },
            Err(MmuError::NotEnabled(MmuState::Steady))
        );
        assert_eq!(*table.words(), snapshot);
    }

    #[test]
    fn bring_up_is_idempotent() {
        let mut fresh = words();
        let (_, table) = brought_up(&mut fresh);
        let expected = *table.words();

        // Again over an already populated region, translation on.
        let mut again = words();
        let (mmu, mut table) = brought_up(&mut again);
        unsafe { mmu.bring_up(&mut table) };
        assert_eq!(*table.words(), expected);

        // And after phase 2 has run.
        unsafe { mmu.finalize(&mut table) }.unwrap();
        unsafe { mmu.bring_up(&mut table) };
        assert_eq!(*table.words(), expected);
        assert_eq!(mmu.state(&table), MmuState::Enabled);
    }

    #[test]
    fn stale_descriptors_are_wiped() {
        let mut clean = words();
        let (_, table) = brought_up(&mut clean);
        let expected = *table.words();

        let mut dirty = Box::new([0xFFFF_FFFFu32; REGION_WORDS]);
        let mmu = Mmu::new(RecordingCpu::enabled(), LAYOUT);
        let mut table = TableRegion::new(&mut dirty, TABLE_REGION_START);
        unsafe { mmu.bring_up(&mut table) };
        assert_eq!(*table.words(), expected);
        assert_eq!(mmu.cpu().ops()[0], CpuOp::DisableTranslation);
    }

    #[test]
    fn unmapped_holes_fault() {
        let mut w = words();
        let (_, table) = brought_up(&mut w);
        // Between the end of RAM at the kernel base and the device window.
        assert_eq!(
            table.translate(0xC000_0000),
            Err(TranslationFault::Section { va: 0xC000_0000 })
        );
        // Second megabyte is never identity mapped.
        assert!(table.translate(LAYOUT.ram_start + MBYTE).is_err());
    }
}
