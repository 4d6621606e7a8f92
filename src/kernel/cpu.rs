//! Dense processor numbering.
//!
//! Local APIC ids are sparse, so every processor registers its id at bring-up
//! and gets the next free slot in `0..MAX_CPUS`. Per-CPU tables are indexed by
//! that slot, never by the raw APIC id.

use core::fmt;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::param::MAX_CPUS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuError {
    /// Every slot is taken.
    TooManyCpus { apic_id: u32 },
    /// The processor never registered.
    Unregistered { apic_id: u32 },
}

impl fmt::Display for CpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuError::TooManyCpus { apic_id } => {
                write!(f, "apic {:#x}: more than {} processors", apic_id, MAX_CPUS)
            }
            CpuError::Unregistered { apic_id } => write!(f, "apic {:#x}: processor not registered", apic_id),
        }
    }
}

const NO_APIC: u32 = u32::MAX;

pub struct CpuTable {
    apic_ids: [AtomicU32; MAX_CPUS],
    online: AtomicUsize,
}

impl CpuTable {
    pub const fn new() -> Self {
        Self {
            apic_ids: [const { AtomicU32::new(NO_APIC) }; MAX_CPUS],
            online: AtomicUsize::new(0),
        }
    }

    /// Slot for `apic_id`, assigning the next free one on first sight.
    pub fn register(&self, apic_id: u32) -> Result<usize, CpuError> {
        if let Some(index) = self.index_of(apic_id) {
            return Ok(index);
        }
        let index = self
            .online
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < MAX_CPUS).then_some(n + 1))
            .map_err(|_| CpuError::TooManyCpus { apic_id })?;
        self.apic_ids[index].store(apic_id, Ordering::Release);
        Ok(index)
    }

    pub fn index_of(&self, apic_id: u32) -> Option<usize> {
        let online = self.online.load(Ordering::Acquire);
        self.apic_ids[..online]
            .iter()
            .position(|id| id.load(Ordering::Acquire) == apic_id)
    }

    pub fn lookup(&self, apic_id: u32) -> Result<usize, CpuError> {
        self.index_of(apic_id).ok_or(CpuError::Unregistered { apic_id })
    }

    pub fn online(&self) -> usize {
        self.online.load(Ordering::Acquire)
    }
}

impl Default for CpuTable {
    fn default() -> Self {
        Self::new()
    }
}

pub static CPUS: CpuTable = CpuTable::new();

/// Local APIC id of the executing processor (CPUID leaf 1, EBX[31:24]).
pub fn apic_id() -> u32 {
    let leaf = unsafe { core::arch::x86_64::__cpuid(1) };
    leaf.ebx >> 24
}

/// Register the executing processor. Called once per processor at bring-up.
pub fn register_this_cpu() -> Result<usize, CpuError> {
    CPUS.register(apic_id())
}

/// Dense index of the executing processor.
pub fn this_cpu() -> Result<usize, CpuError> {
    CPUS.lookup(apic_id())
}
