//! # System Call Handlers
//!
//! - `process`: exit, getpid
//! - `time`: uptime
//!
//! Each handler takes its decoded arguments and returns a `SyscallResult`.

pub mod process;
pub mod time;
