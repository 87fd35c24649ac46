// =============================================================================
// PiBring - Translation Table Region
// =============================================================================
// The fixed physical region holding the L2 coarse table and the L1 directory,
// viewed as a bounds-checked word array. Placement is fixed by the board:
//
//   0x3000 .. 0x3400   L2 coarse table (256 entries)
//   0x3400 .. 0x4000   unused, zeroed with the rest
//   0x4000 .. 0x8000   L1 directory (4096 entries)
// =============================================================================

use core::fmt;

use super::descriptor::{
    l1_index, l2_index, AccessPermission, CacheFlags, L1Entry, L1Kind, L2Entry, L1_ENTRIES,
    L2_ENTRIES, PAGE_MASK, SECTION_MASK,
};
use crate::board::{L1_TABLE_BASE, L2_TABLE_BASE, TABLE_REGION_END, TABLE_REGION_START};

/// Number of 32-bit words in the region.
pub const REGION_WORDS: usize = (TABLE_REGION_END - TABLE_REGION_START) / 4;

const L2_OFFSET: usize = (L2_TABLE_BASE - TABLE_REGION_START) / 4;
const L1_OFFSET: usize = (L1_TABLE_BASE - TABLE_REGION_START) / 4;

const _: () = assert!(L1_OFFSET + L1_ENTRIES <= REGION_WORDS);
const _: () = assert!(L2_OFFSET + L2_ENTRIES <= L1_OFFSET);

/// The table region, with the physical address its first word lives at.
pub struct TableRegion<'a> {
    words: &'a mut [u32; REGION_WORDS],
    phys_base: usize,
}

/// Which path a translation went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingKind {
    Section,
    SmallPage,
}

/// The result of a software table walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Translation {
    pub pa: usize,
    pub kind: MappingKind,
    pub domain: u8,
    pub ap: AccessPermission,
    pub cache: CacheFlags,
}

/// Why a software table walk failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationFault {
    /// The L1 entry for `va` is a fault entry.
    Section { va: usize },
    /// The L2 entry for `va` is a fault entry.
    Page { va: usize },
    /// A coarse pointer names a table outside this region.
    ForeignTable { va: usize, table: usize },
}

impl fmt::Display for TranslationFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TranslationFault::Section { va } => write!(f, "section fault at {:#010x}", va),
            TranslationFault::Page { va } => write!(f, "page fault at {:#010x}", va),
            TranslationFault::ForeignTable { va, table } => {
                write!(f, "{:#010x} walks to unknown L2 table {:#010x}", va, table)
            }
        }
    }
}

impl<'a> TableRegion<'a> {
    /// Wrap `words` as the region that lives at physical `phys_base`.
    pub fn new(words: &'a mut [u32; REGION_WORDS], phys_base: usize) -> Self {
        Self { words, phys_base }
    }

    /// The region at its fixed physical address.
    ///
    /// # Safety
    /// The region must be reachable at its physical address (translation off,
    /// or the first megabyte identity mapped) and nothing else may alias it.
    pub unsafe fn at_physical() -> TableRegion<'static> {
        let words = &mut *(TABLE_REGION_START as *mut [u32; REGION_WORDS]);
        TableRegion::new(words, TABLE_REGION_START)
    }

    /// Clear every word of the region.
    pub fn zero(&mut self) {
        self.words.fill(0);
    }

    pub fn words(&self) -> &[u32; REGION_WORDS] {
        &*self.words
    }

    /// Physical address of the L1 directory (the TTBR0 value).
    pub fn l1_base(&self) -> usize {
        self.phys_base + L1_OFFSET * 4
    }

    /// Physical address of the L2 coarse table.
    pub fn l2_base(&self) -> usize {
        self.phys_base + L2_OFFSET * 4
    }

    /// Physical address of L1 entry `index`.
    pub fn l1_entry_address(&self, index: usize) -> usize {
        assert!(index < L1_ENTRIES);
        self.l1_base() + index * 4
    }

    fn l1_slice(&self) -> &[u32] {
        &self.words[L1_OFFSET..L1_OFFSET + L1_ENTRIES]
    }

    fn l2_slice(&self) -> &[u32] {
        &self.words[L2_OFFSET..L2_OFFSET + L2_ENTRIES]
    }

    pub fn l1(&self, index: usize) -> L1Entry {
        L1Entry::from_bits(self.l1_slice()[index])
    }

    pub fn set_l1(&mut self, index: usize, entry: L1Entry) {
        self.words[L1_OFFSET..L1_OFFSET + L1_ENTRIES][index] = entry.bits();
    }

    pub fn l2(&self, index: usize) -> L2Entry {
        L2Entry::from_bits(self.l2_slice()[index])
    }

    pub fn set_l2(&mut self, index: usize, entry: L2Entry) {
        self.words[L2_OFFSET..L2_OFFSET + L2_ENTRIES][index] = entry.bits();
    }

    /// Walk the tables for `va` the way the hardware would.
    pub fn translate(&self, va: usize) -> Result<Translation, TranslationFault> {
        match self.l1(l1_index(va)).kind() {
            L1Kind::Fault => Err(TranslationFault::Section { va }),
            L1Kind::Section { base, domain, ap, cache } => Ok(Translation {
                pa: base | (va & SECTION_MASK),
                kind: MappingKind::Section,
                domain,
                ap,
                cache,
            }),
            L1Kind::Coarse { table, domain } => {
                if table != self.l2_base() {
                    return Err(TranslationFault::ForeignTable { va, table });
                }
                let (base, ap, cache) = self
                    .l2(l2_index(va))
                    .small_page_parts()
                    .ok_or(TranslationFault::Page { va })?;
                Ok(Translation {
                    pa: base | (va & PAGE_MASK),
                    kind: MappingKind::SmallPage,
                    domain,
                    ap,
                    cache,
                })
            }
        }
    }
}
