use crate::proc::Process;
use crate::syscalls::dispatcher::SyscallResult;

/// Exit the calling process.
///
/// The call itself only marks the caller killed; the trap dispatcher sees the
/// flag when the call returns and terminates the process there.
pub fn sys_exit(process: &Process, _status: i32) -> SyscallResult {
    process.kill();
    Ok(0)
}

/// Get current process ID
pub fn sys_getpid(process: &Process) -> SyscallResult {
    Ok(process.pid().0 as usize)
}
