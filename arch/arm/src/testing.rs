// =============================================================================
// PiBring - Test Doubles
// =============================================================================
// Host-side stand-ins for the register bus and the CP15 coprocessor.
// =============================================================================

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::vec::Vec;

use crate::cpu::SystemControl;
use crate::mmio::Mmio;

/// One observed register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read(usize),
    Write(usize, u32),
}

/// A register file that remembers every access.
///
/// Reads return the last written (or preset) value, unless a script of
/// values has been queued for that address, which is drained first.
#[derive(Default)]
pub struct FakeMmio {
    registers: RefCell<BTreeMap<usize, u32>>,
    scripts: RefCell<BTreeMap<usize, VecDeque<u32>>>,
    log: RefCell<Vec<Access>>,
}

impl FakeMmio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preset(&self, addr: usize, value: u32) {
        self.registers.borrow_mut().insert(addr, value);
    }

    pub fn script(&self, addr: usize, values: &[u32]) {
        self.scripts
            .borrow_mut()
            .entry(addr)
            .or_default()
            .extend(values.iter().copied());
    }

    pub fn value(&self, addr: usize) -> u32 {
        self.registers.borrow().get(&addr).copied().unwrap_or(0)
    }

    pub fn accesses(&self) -> Vec<Access> {
        self.log.borrow().clone()
    }

    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.log
            .borrow()
            .iter()
            .filter_map(|a| match *a {
                Access::Write(addr, v) => Some((addr, v)),
                Access::Read(_) => None,
            })
            .collect()
    }

    pub fn writes_to(&self, addr: usize) -> Vec<u32> {
        self.writes()
            .into_iter()
            .filter(|&(a, _)| a == addr)
            .map(|(_, v)| v)
            .collect()
    }

    pub fn reads_of(&self, addr: usize) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|a| **a == Access::Read(addr))
            .count()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }
}

impl Mmio for FakeMmio {
    fn read32(&self, addr: usize) -> u32 {
        self.log.borrow_mut().push(Access::Read(addr));
        if let Some(v) = self.scripts.borrow_mut().get_mut(&addr).and_then(|q| q.pop_front()) {
            return v;
        }
        self.value(addr)
    }

    fn write32(&self, addr: usize, value: u32) {
        self.log.borrow_mut().push(Access::Write(addr, value));
        self.registers.borrow_mut().insert(addr, value);
    }
}

/// One call made against [`SystemControl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuOp {
    DisableTranslation,
    EnableTranslation { l1_base: usize },
    InvalidateCachesAndTlb,
    CleanDcacheRange { start: usize, end: usize },
    InvalidateTlb,
}

/// Records the coprocessor sequence and models SCTLR.M.
#[derive(Default)]
pub struct RecordingCpu {
    enabled: Cell<bool>,
    ops: RefCell<Vec<CpuOp>>,
}

impl RecordingCpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with translation already on, as a warm reboot would.
    pub fn enabled() -> Self {
        let cpu = Self::default();
        cpu.enabled.set(true);
        cpu
    }

    pub fn ops(&self) -> Vec<CpuOp> {
        self.ops.borrow().clone()
    }

    pub fn clear(&self) {
        self.ops.borrow_mut().clear();
    }

    fn record(&self, op: CpuOp) {
        self.ops.borrow_mut().push(op);
    }
}

impl SystemControl for RecordingCpu {
    fn translation_enabled(&self) -> bool {
        self.enabled.get()
    }

    unsafe fn disable_translation(&self) {
        self.enabled.set(false);
        self.record(CpuOp::DisableTranslation);
    }

    unsafe fn enable_translation(&self, l1_base: usize) {
        self.enabled.set(true);
        self.record(CpuOp::EnableTranslation { l1_base });
    }

    unsafe fn invalidate_caches_and_tlb(&self) {
        self.record(CpuOp::InvalidateCachesAndTlb);
    }

    unsafe fn clean_dcache_range(&self, start: usize, end: usize) {
        self.record(CpuOp::CleanDcacheRange { start, end });
    }

    unsafe fn invalidate_tlb(&self) {
        self.record(CpuOp::InvalidateTlb);
    }
}
