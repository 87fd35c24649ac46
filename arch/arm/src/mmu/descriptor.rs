// =============================================================================
// PiBring - ARMv6 Short Descriptors
// =============================================================================
// L1 section / coarse-table descriptors and L2 small-page descriptors in the
// subpage (ARMv5-compatible) format, SCTLR.XP = 0.
// =============================================================================

use bitflags::bitflags;

/// Section size and shift (1 MiB).
pub const SECTION_SIZE: usize = 0x10_0000;
pub const SECTION_SHIFT: usize = 20;
pub const SECTION_MASK: usize = SECTION_SIZE - 1;

/// Small page size and shift (4 KiB).
pub const PAGE_SIZE: usize = 0x1000;
pub const PAGE_SHIFT: usize = 12;
pub const PAGE_MASK: usize = PAGE_SIZE - 1;

/// Entries per table.
pub const L1_ENTRIES: usize = 4096;
pub const L2_ENTRIES: usize = 256;

/// Coarse table bases are 1 KiB aligned.
const COARSE_BASE_MASK: u32 = !0x3FF;

// Descriptor type, bits [1:0].
const L1_TYPE_MASK: u32 = 0b11;
const L1_COARSE: u32 = 0b01;
const L1_SECTION: u32 = 0b10;
const L2_SMALL: u32 = 0b10;

const DOMAIN_SHIFT: u32 = 5;
const SECTION_AP_SHIFT: u32 = 10;
const SMALL_AP0_SHIFT: u32 = 4;

bitflags! {
    /// Memory region attributes shared by sections and small pages.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CacheFlags: u32 {
        const BUFFERED = 1 << 2;
        const CACHED   = 1 << 3;
    }
}

impl CacheFlags {
    /// Normal memory, write-back.
    pub const NORMAL: CacheFlags = CacheFlags::CACHED.union(CacheFlags::BUFFERED);
    /// Strongly ordered, for device registers.
    pub const DEVICE: CacheFlags = CacheFlags::empty();
}

/// Access permission field (AP[1:0], APX = 0).
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPermission {
    NoAccess = 0b00,
    KernelRw = 0b01,
    UserRo = 0b10,
    UserRw = 0b11,
}

impl AccessPermission {
    const fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0b00 => AccessPermission::NoAccess,
            0b01 => AccessPermission::KernelRw,
            0b10 => AccessPermission::UserRo,
            _ => AccessPermission::UserRw,
        }
    }
}

/// L1 index of a virtual address (top 12 bits).
#[inline]
pub const fn l1_index(va: usize) -> usize {
    (va >> SECTION_SHIFT) & (L1_ENTRIES - 1)
}

/// L2 index of a virtual address (next 8 bits).
#[inline]
pub const fn l2_index(va: usize) -> usize {
    (va >> PAGE_SHIFT) & (L2_ENTRIES - 1)
}

/// A first-level descriptor.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L1Entry(u32);

/// What an L1 descriptor decodes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum L1Kind {
    Fault,
    Coarse { table: usize, domain: u8 },
    Section { base: usize, domain: u8, ap: AccessPermission, cache: CacheFlags },
}

impl L1Entry {
    pub const FAULT: L1Entry = L1Entry(0);

    /// A 1 MiB section. `pa` must be section aligned.
    pub const fn section(pa: usize, domain: u8, ap: AccessPermission, cache: CacheFlags) -> Self {
        debug_assert!(pa & SECTION_MASK == 0);
        L1Entry(
            (pa & !SECTION_MASK) as u32
                | ((domain as u32 & 0xF) << DOMAIN_SHIFT)
                | ((ap as u32) << SECTION_AP_SHIFT)
                | cache.bits()
                | L1_SECTION,
        )
    }

    /// A pointer to a coarse L2 table at physical `table`.
    pub const fn coarse(table: usize, domain: u8) -> Self {
        debug_assert!(table as u32 & !COARSE_BASE_MASK == 0);
        L1Entry((table as u32 & COARSE_BASE_MASK) | ((domain as u32 & 0xF) << DOMAIN_SHIFT) | L1_COARSE)
    }

    pub const fn from_bits(bits: u32) -> Self {
        L1Entry(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn kind(self) -> L1Kind {
        let domain = ((self.0 >> DOMAIN_SHIFT) & 0xF) as u8;
        match self.0 & L1_TYPE_MASK {
            L1_COARSE => L1Kind::Coarse { table: (self.0 & COARSE_BASE_MASK) as usize, domain },
            L1_SECTION => L1Kind::Section {
                base: self.0 as usize & !SECTION_MASK,
                domain,
                ap: AccessPermission::from_bits(self.0 >> SECTION_AP_SHIFT),
                cache: CacheFlags::from_bits_truncate(self.0),
            },
            // 0b00 faults; 0b11 (fine table) is not supported on ARMv6.
            _ => L1Kind::Fault,
        }
    }
}

/// A second-level descriptor.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct L2Entry(u32);

impl L2Entry {
    pub const FAULT: L2Entry = L2Entry(0);

    /// A 4 KiB small page; all four subpages get the same permission.
    pub const fn small_page(pa: usize, ap: AccessPermission, cache: CacheFlags) -> Self {
        debug_assert!(pa & PAGE_MASK == 0);
        let ap = ap as u32;
        L2Entry(
            (pa & !PAGE_MASK) as u32
                | (ap << SMALL_AP0_SHIFT)
                | (ap << (SMALL_AP0_SHIFT + 2))
                | (ap << (SMALL_AP0_SHIFT + 4))
                | (ap << (SMALL_AP0_SHIFT + 6))
                | cache.bits()
                | L2_SMALL,
        )
    }

    pub const fn from_bits(bits: u32) -> Self {
        L2Entry(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Base, permission (subpage 0) and attributes, if this maps a small page.
    pub fn small_page_parts(self) -> Option<(usize, AccessPermission, CacheFlags)> {
        if self.0 & L2_SMALL == 0 {
            return None;
        }
        Some((
            self.0 as usize & !PAGE_MASK,
            AccessPermission::from_bits(self.0 >> SMALL_AP0_SHIFT),
            CacheFlags::from_bits_truncate(self.0),
        ))
    }
}
