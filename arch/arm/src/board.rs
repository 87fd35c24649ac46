// =============================================================================
// PiBring - Board Definitions (BCM2835 / Raspberry Pi 1)
// =============================================================================
// Fixed physical and virtual addresses of the board. Every value here must
// match the BCM2835 ARM Peripherals datasheet and the linker script.
//
// SPDX-License-Identifier: GPL-2.0
// =============================================================================

/// One megabyte, the size of an L1 section.
pub const MBYTE: usize = 0x0010_0000;

/// Physical base of the ARM-visible peripheral window.
pub const PHYS_IO_BASE: usize = 0x2000_0000;

/// Virtual base where the peripheral window is mapped once translation is on.
pub const DEVICE_VIRT_BASE: usize = 0xFE00_0000;

/// Size of the peripheral window.
pub const IO_SIZE: usize = 16 * MBYTE;

/// Virtual base of the kernel image and of all of RAM.
pub const KERNEL_BASE: usize = 0x8000_0000;

/// Physical start of RAM.
pub const RAM_START: usize = 0x0000_0000;

/// Installed RAM mapped at `KERNEL_BASE`.
pub const RAM_SIZE: usize = 128 * MBYTE;

/// GPU-shared memory, mapped with virtual == physical.
pub const GPU_MEM_BASE: usize = 0x4000_0000;
pub const GPU_MEM_SIZE: usize = 1024 * MBYTE;

/// High exception vector page (SCTLR.V = 1).
pub const HIGH_VECTORS: usize = 0xFFFF_0000;

/// ARM1176 L1 data cache line size.
pub const CACHE_LINE_SIZE: usize = 32;

/// Physical address of the L2 coarse table.
pub const L2_TABLE_BASE: usize = 0x3000;

/// Physical address of the L1 directory (16 KiB aligned).
pub const L1_TABLE_BASE: usize = 0x4000;

/// Region zeroed before the tables are populated.
pub const TABLE_REGION_START: usize = 0x3000;
pub const TABLE_REGION_END: usize = 0x8000;

/// Offset of the GPIO block inside the peripheral window.
pub const GPIO_OFFSET: usize = 0x0020_0000;

/// Offset of the auxiliary peripherals (mini UART, SPI1/2).
pub const AUX_OFFSET: usize = 0x0021_5000;

/// Offset of the ARM interrupt controller registers.
pub const INTERRUPT_OFFSET: usize = 0x0000_B200;

/// Offset the relocated early console adds to `PHYS_IO_BASE`.
///
/// Kept apart from `DEVICE_VIRT_BASE`: the two agree on this board, but the
/// early console has always used this literal offset on its own.
pub const EARLY_RELOCATED_OFFSET: usize = 0xDE00_0000;

/// The memory map consumed by the page-table builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLayout {
    pub kernel_base: usize,
    pub ram_start: usize,
    pub ram_size: usize,
    pub io_phys_base: usize,
    pub io_virt_base: usize,
    pub io_size: usize,
    pub gpu_mem_base: usize,
    pub gpu_mem_size: usize,
    pub high_vectors: usize,
}

impl MemoryLayout {
    /// Raspberry Pi 1 Model B (BCM2835).
    pub const RPI1: MemoryLayout = MemoryLayout {
        kernel_base: KERNEL_BASE,
        ram_start: RAM_START,
        ram_size: RAM_SIZE,
        io_phys_base: PHYS_IO_BASE,
        io_virt_base: DEVICE_VIRT_BASE,
        io_size: IO_SIZE,
        gpu_mem_base: GPU_MEM_BASE,
        gpu_mem_size: GPU_MEM_SIZE,
        high_vectors: HIGH_VECTORS,
    };

    /// Check the section-alignment contract of every window.
    pub const fn is_section_aligned(&self) -> bool {
        let mask = MBYTE - 1;
        self.kernel_base & mask == 0
            && self.ram_start & mask == 0
            && self.ram_size & mask == 0
            && self.io_phys_base & mask == 0
            && self.io_virt_base & mask == 0
            && self.io_size & mask == 0
            && self.gpu_mem_base & mask == 0
            && self.gpu_mem_size & mask == 0
    }

    /// The vector page must not fall inside a section mapping, or the coarse
    /// pointer installed for it would replace that section.
    pub const fn vectors_are_isolated(&self) -> bool {
        let v = self.high_vectors;
        !(v >= self.kernel_base && v - self.kernel_base < self.ram_size)
            && !(v >= self.io_virt_base && v - self.io_virt_base < self.io_size)
            && !(v >= self.gpu_mem_base && v - self.gpu_mem_base < self.gpu_mem_size)
    }
}

const _: () = assert!(MemoryLayout::RPI1.is_section_aligned());
const _: () = assert!(MemoryLayout::RPI1.vectors_are_isolated());
const _: () = assert!(L1_TABLE_BASE % 0x4000 == 0);
const _: () = assert!(L2_TABLE_BASE % 0x400 == 0);

/// Peripheral register addresses, relative to a chosen peripheral base.
///
/// The same block is reached at `PHYS_IO_BASE` before translation and at
/// `DEVICE_VIRT_BASE` after it.
pub mod regs {
    use super::{AUX_OFFSET, GPIO_OFFSET, INTERRUPT_OFFSET};

    // GPIO (BCM2835 ARM Peripherals, p.90)
    pub const GPFSEL0: usize = GPIO_OFFSET;
    pub const GPSET0: usize = GPIO_OFFSET + 0x1C;
    pub const GPCLR0: usize = GPIO_OFFSET + 0x28;
    pub const GPPUD: usize = GPIO_OFFSET + 0x94;
    pub const GPPUDCLK0: usize = GPIO_OFFSET + 0x98;

    // Auxiliaries (p.8)
    pub const AUX_ENABLES: usize = AUX_OFFSET + 0x04;
    pub const AUX_MU_IO: usize = AUX_OFFSET + 0x40;
    pub const AUX_MU_IER: usize = AUX_OFFSET + 0x44;
    pub const AUX_MU_IIR: usize = AUX_OFFSET + 0x48;
    pub const AUX_MU_LCR: usize = AUX_OFFSET + 0x4C;
    pub const AUX_MU_MCR: usize = AUX_OFFSET + 0x50;
    pub const AUX_MU_LSR: usize = AUX_OFFSET + 0x54;
    pub const AUX_MU_CNTL: usize = AUX_OFFSET + 0x60;
    pub const AUX_MU_BAUD: usize = AUX_OFFSET + 0x68;

    // Interrupt controller (p.112)
    pub const IRQ_ENABLE_1: usize = INTERRUPT_OFFSET + 0x10;
}
