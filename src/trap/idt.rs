//! # Interrupt Vector Table
//!
//! 256 long-mode gate descriptors shared read-only by every processor.
//!
//! [`VectorTable::init`] points every gate at its entry stub with kernel-only
//! privilege, then reopens the system call gate to ring 3. A gate left wrong
//! here does not fail now; it shows up later as an unrecoverable fault.
//!
//! ```text
//!  127            96 95            64 63     48 47 46 45 44  40 39  35 34 32 31    16 15     0
//! ┌────────────────┬────────────────┬─────────┬──┬─────┬──┬────┬──────┬─────┬────────┬────────┐
//! │    reserved    │  offset 63..32 │ off 31..│P │ DPL │0 │type│  0   │ IST │selector│off 15..│
//! └────────────────┴────────────────┴─────────┴──┴─────┴──┴────┴──────┴─────┴────────┴────────┘
//! ```

use spin::Once;
use x86_64::instructions::tables::lidt;
use x86_64::structures::gdt::SegmentSelector;
use x86_64::structures::DescriptorTablePointer;
use x86_64::{PrivilegeLevel, VirtAddr};

use crate::trap::{DOUBLE_FAULT_VECTOR, T_SYSCALL};

pub const VECTOR_COUNT: usize = 256;

/// IST slot (1-based in the gate) used by the double fault handler.
pub const DOUBLE_FAULT_IST_INDEX: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    /// Clears IF on entry.
    Interrupt,
    /// Leaves IF alone; used for system calls.
    Trap,
}

impl GateKind {
    const fn bits(self) -> u16 {
        match self {
            GateKind::Interrupt => 0xE,
            GateKind::Trap => 0xF,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gate {
    offset_low: u16,
    selector: u16,
    options: u16,
    offset_mid: u16,
    offset_high: u32,
    reserved: u32,
}

impl Gate {
    const PRESENT: u16 = 1 << 15;

    pub const fn missing() -> Self {
        Self {
            offset_low: 0,
            selector: 0,
            options: 0,
            offset_mid: 0,
            offset_high: 0,
            reserved: 0,
        }
    }

    pub fn new(target: VirtAddr, selector: SegmentSelector, kind: GateKind, dpl: PrivilegeLevel) -> Self {
        let addr = target.as_u64();
        Self {
            offset_low: addr as u16,
            selector: selector.0,
            options: Self::PRESENT | (dpl as u16) << 13 | kind.bits() << 8,
            offset_mid: (addr >> 16) as u16,
            offset_high: (addr >> 32) as u32,
            reserved: 0,
        }
    }

    pub fn target(&self) -> u64 {
        u64::from(self.offset_low) | u64::from(self.offset_mid) << 16 | u64::from(self.offset_high) << 32
    }

    pub fn selector(&self) -> SegmentSelector {
        SegmentSelector(self.selector)
    }

    pub fn dpl(&self) -> PrivilegeLevel {
        PrivilegeLevel::from_u16((self.options >> 13) & 3)
    }

    pub fn kind(&self) -> GateKind {
        if (self.options >> 8) & 0xF == GateKind::Trap.bits() {
            GateKind::Trap
        } else {
            GateKind::Interrupt
        }
    }

    pub fn is_present(&self) -> bool {
        self.options & Self::PRESENT != 0
    }

    /// 1-based IST slot, 0 when the current stack is used.
    pub fn stack_index(&self) -> u16 {
        self.options & 0x7
    }

    fn set_stack_index(&mut self, index: u16) {
        self.options = (self.options & !0x7) | ((index + 1) & 0x7);
    }
}

#[repr(C, align(16))]
pub struct VectorTable {
    gates: [Gate; VECTOR_COUNT],
}

impl VectorTable {
    pub const fn new() -> Self {
        Self {
            gates: [Gate::missing(); VECTOR_COUNT],
        }
    }

    /// Point every vector at its stub, kernel-only, then open the system call gate to users.
    pub fn init(&mut self, stubs: &[u64; VECTOR_COUNT], code_selector: SegmentSelector) {
        for (gate, &stub) in self.gates.iter_mut().zip(stubs.iter()) {
            *gate = Gate::new(VirtAddr::new(stub), code_selector, GateKind::Interrupt, PrivilegeLevel::Ring0);
        }
        self.gates[usize::from(DOUBLE_FAULT_VECTOR)].set_stack_index(DOUBLE_FAULT_IST_INDEX);

        let syscall = usize::from(T_SYSCALL);
        self.gates[syscall] = Gate::new(
            VirtAddr::new(stubs[syscall]),
            code_selector,
            GateKind::Trap,
            PrivilegeLevel::Ring3,
        );
    }

    pub fn gate(&self, vector: u8) -> &Gate {
        &self.gates[usize::from(vector)]
    }

    pub fn gates(&self) -> &[Gate; VECTOR_COUNT] {
        &self.gates
    }

    fn pointer(&'static self) -> DescriptorTablePointer {
        DescriptorTablePointer {
            limit: (core::mem::size_of::<Self>() - 1) as u16,
            base: VirtAddr::from_ptr(self),
        }
    }

    /// Load this table on the calling processor.
    ///
    /// # Safety
    ///
    /// Every gate must point at a valid entry stub and the selector must name
    /// the loaded kernel code segment.
    pub unsafe fn activate(&'static self) {
        lidt(&self.pointer());
    }
}

impl Default for VectorTable {
    fn default() -> Self {
        Self::new()
    }
}

static VECTORS: Once<VectorTable> = Once::new();

/// Build the shared table once; later calls return the first table.
pub fn init(stubs: &[u64; VECTOR_COUNT], code_selector: SegmentSelector) -> &'static VectorTable {
    VECTORS.call_once(|| {
        let mut table = VectorTable::new();
        table.init(stubs, code_selector);
        table
    })
}

/// Load the shared table on the calling processor. Every processor calls this.
pub fn activate() -> Result<(), &'static str> {
    let table = VECTORS.get().ok_or("vector table not initialized")?;
    unsafe { table.activate() };
    Ok(())
}
