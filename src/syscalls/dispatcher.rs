use crate::proc::Process;
use crate::syscalls::handlers;
use crate::syscalls::numbers::SyscallNumber;
use crate::trap::{Ticks, TrapFrame};

/// System call result type
pub type SyscallResult = Result<usize, SyscallError>;

/// System call errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    NotImplemented,
}

impl SyscallError {
    pub fn as_errno(self) -> isize {
        match self {
            Self::NotImplemented => -38,  // ENOSYS
        }
    }
}

/// Number and arguments of one call, as saved on trap entry.
#[derive(Debug, Clone, Copy)]
pub struct SyscallContext {
    pub syscall_num: u64,
    pub arg0: u64,
    pub arg1: u64,
    pub arg2: u64,
    pub arg3: u64,
    pub arg4: u64,
    pub arg5: u64,
}

impl SyscallContext {
    /// x86_64 convention for `int 64`:
    ///   rax = syscall number
    ///   rdi, rsi, rdx, r10, r8, r9 = arg0..arg5
    pub fn from_frame(frame: &TrapFrame) -> Self {
        let [num, arg0, arg1, arg2, arg3, arg4, arg5] = frame.syscall_registers();
        Self {
            syscall_num: num,
            arg0,
            arg1,
            arg2,
            arg3,
            arg4,
            arg5,
        }
    }
}

/// Main syscall dispatcher
pub fn dispatch_syscall(ctx: SyscallContext, process: &Process, ticks: &Ticks) -> SyscallResult {
    match SyscallNumber::from(ctx.syscall_num) {
        SyscallNumber::Exit => handlers::process::sys_exit(process, ctx.arg0 as i32),
        SyscallNumber::GetPid => handlers::process::sys_getpid(process),
        SyscallNumber::Uptime => handlers::time::sys_uptime(ticks),
        SyscallNumber::Unknown => Err(SyscallError::NotImplemented),
    }
}
