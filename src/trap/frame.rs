use x86_64::PrivilegeLevel;

use crate::trap::has_error_code;

/// Machine state saved on trap entry.
///
/// Field order is the stack layout built by the entry stubs in `vectors`:
/// general registers pushed by `trap_common`, then the vector number and error
/// code pushed by the per-vector stub, then what the CPU pushed.
#[repr(C)]
#[derive(Debug, Clone, Default)]
pub struct TrapFrame {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub rbp: u64,
    pub rbx: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rax: u64,

    pub trapno: u64,
    /// Zero when the vector has no hardware error code.
    pub err: u64,

    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

impl TrapFrame {
    pub fn new(vector: u8, cs: u64) -> Self {
        Self {
            trapno: u64::from(vector),
            cs,
            ..Self::default()
        }
    }

    pub fn vector(&self) -> u8 {
        self.trapno as u8
    }

    pub fn error_code(&self) -> Option<u64> {
        has_error_code(self.vector()).then_some(self.err)
    }

    pub fn privilege(&self) -> PrivilegeLevel {
        PrivilegeLevel::from_u16((self.cs & 3) as u16)
    }

    pub fn from_user(&self) -> bool {
        self.privilege() == PrivilegeLevel::Ring3
    }

    /// System call number and arguments, in `rax, rdi, rsi, rdx, r10, r8, r9` order.
    pub fn syscall_registers(&self) -> [u64; 7] {
        [self.rax, self.rdi, self.rsi, self.rdx, self.r10, self.r8, self.r9]
    }

    pub fn set_return_value(&mut self, value: u64) {
        self.rax = value;
    }
}
