//! # Time System Call Handlers
//!
//! `sys_uptime` reports the tick counter. One tick is one timer interrupt on
//! the boot processor; with the PIT left at its power-on rate that is about
//! 55 ms.

use crate::syscalls::dispatcher::SyscallResult;
use crate::trap::Ticks;

/// Ticks since boot.
pub fn sys_uptime(ticks: &Ticks) -> SyscallResult {
    Ok(ticks.now() as usize)
}
