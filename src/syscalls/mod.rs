//! # System Calls
//!
//! The in-kernel call table behind the user-invocable gate at vector 64.
//!
//! Arguments arrive in the saved registers of the trap frame (`rax` holds the
//! number, `rdi, rsi, rdx, r10, r8, r9` the arguments) and the result goes back
//! in `rax`: a non-negative value on success, a negative errno on failure.

pub mod dispatcher;
pub mod handlers;
pub mod numbers;

use crate::proc::Process;
use crate::trap::{Ticks, TrapFrame};
use dispatcher::{dispatch_syscall, SyscallContext};

/// Decode the call from `frame`, run it and store the result in `rax`.
pub fn handle(process: &Process, frame: &mut TrapFrame, ticks: &Ticks) {
    let ctx = SyscallContext::from_frame(frame);
    let ret = match dispatch_syscall(ctx, process, ticks) {
        Ok(value) => value as u64,
        Err(err) => err.as_errno() as u64,
    };
    frame.set_return_value(ret);
}
