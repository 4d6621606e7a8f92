//! # Process View
//!
//! The slice of a process the trap path reads and marks. The process
//! subsystem owns these objects; the dispatcher only sees `&Process`.
//!
//! ## Synchronization
//!
//! | Field        | Discipline                                           |
//! |--------------|------------------------------------------------------|
//! | `killed`     | `AtomicBool`, set-only, Release/Acquire              |
//! | `state`      | `AtomicU8`, written by the scheduler                 |
//! | `size`       | `AtomicU64`, written by the process subsystem        |
//! | `stack`      | per-process spin lock around check, map, increment   |
//! | `trap_frame` | `AtomicPtr`, only meaningful on the owning processor |
//!
//! Any processor may kill any process at any time; the kill only takes effect
//! when the victim's own processor reaches a dispatcher checkpoint.

use core::fmt;
use core::ptr;
use core::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64, AtomicU8, Ordering};

use spin::{Mutex, MutexGuard};

use crate::mm::AddressSpace;
use crate::param::{StackLayout, PROC_NAME_LEN};
use crate::trap::TrapFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcState {
    Unused,
    Embryo,
    Sleeping,
    Runnable,
    Running,
    Zombie,
}

impl ProcState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Embryo,
            2 => Self::Sleeping,
            3 => Self::Runnable,
            4 => Self::Running,
            5 => Self::Zombie,
            _ => Self::Unused,
        }
    }
}

/// Pages granted below the base stack page, and where the stack now ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackGrowth {
    pub extensions: usize,
    /// Lowest mapped stack address.
    pub bottom: u64,
}

impl StackGrowth {
    pub fn new(layout: &StackLayout) -> Self {
        Self::with_extensions(0, layout)
    }

    pub fn with_extensions(extensions: usize, layout: &StackLayout) -> Self {
        let extensions = extensions.min(layout.max_extensions);
        Self {
            extensions,
            bottom: layout.bottom(extensions),
        }
    }
}

pub struct Process {
    pid: Pid,
    name: [u8; PROC_NAME_LEN],
    name_len: usize,
    killed: AtomicBool,
    state: AtomicU8,
    space: AddressSpace,
    size: AtomicU64,
    stack: Mutex<StackGrowth>,
    trap_frame: AtomicPtr<TrapFrame>,
}

impl Process {
    /// `size` is the end of the process's data and heap.
    pub fn new(pid: Pid, name: &str, space: AddressSpace, size: u64, layout: &StackLayout) -> Self {
        let mut buf = [0u8; PROC_NAME_LEN];
        let mut len = name.len().min(PROC_NAME_LEN);
        while !name.is_char_boundary(len) {
            len -= 1;
        }
        buf[..len].copy_from_slice(&name.as_bytes()[..len]);

        Self {
            pid,
            name: buf,
            name_len: len,
            killed: AtomicBool::new(false),
            state: AtomicU8::new(ProcState::Embryo as u8),
            space,
            size: AtomicU64::new(size),
            stack: Mutex::new(StackGrowth::new(layout)),
            trap_frame: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Start from an already grown stack, as a forked child does.
    pub fn with_stack_extensions(self, extensions: usize, layout: &StackLayout) -> Self {
        *self.stack.lock() = StackGrowth::with_extensions(extensions, layout);
        self
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        core::str::from_utf8(&self.name[..self.name_len]).unwrap_or("?")
    }

    pub fn is_killed(&self) -> bool {
        self.killed.load(Ordering::Acquire)
    }

    /// Mark for termination at the next checkpoint. There is no way back.
    pub fn kill(&self) {
        self.killed.store(true, Ordering::Release);
    }

    pub fn state(&self) -> ProcState {
        ProcState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: ProcState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn address_space(&self) -> &AddressSpace {
        &self.space
    }

    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    pub fn set_size(&self, size: u64) {
        self.size.store(size, Ordering::Release);
    }

    pub fn stack_extensions(&self) -> usize {
        self.stack.lock().extensions
    }

    pub fn stack_bottom(&self) -> u64 {
        self.stack.lock().bottom
    }

    /// Hold the stack record for a whole check-and-grant.
    pub fn lock_stack(&self) -> MutexGuard<'_, StackGrowth> {
        self.stack.lock()
    }

    /// Record `frame` as the trap context of the call in progress.
    pub fn attach_trap_frame(&self, frame: &mut TrapFrame) {
        self.trap_frame.store(frame, Ordering::Release);
    }

    /// Trap context of the last system call; null before the first one.
    pub fn trap_frame(&self) -> *mut TrapFrame {
        self.trap_frame.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &self.name())
            .field("killed", &self.is_killed())
            .field("state", &self.state())
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use x86_64::PhysAddr;

    fn process(name: &str) -> Process {
        let layout = StackLayout::new();
        Process::new(Pid(3), name, AddressSpace::new(PhysAddr::new(0x1000)), 0x1000, &layout)
    }

    #[test]
    fn test_name_truncated_to_sixteen_bytes() {
        assert_eq!(process("lab3").name(), "lab3");
        assert_eq!(process("a-very-long-process-name").name(), "a-very-long-proc");
    }

    #[test]
    fn test_kill_is_sticky() {
        let p = process("init");
        assert!(!p.is_killed());
        p.kill();
        p.kill();
        assert!(p.is_killed());
    }

    #[test]
    fn test_state_round_trips() {
        let p = process("init");
        assert_eq!(p.state(), ProcState::Embryo);
        for state in [
            ProcState::Unused,
            ProcState::Sleeping,
            ProcState::Runnable,
            ProcState::Running,
            ProcState::Zombie,
        ] {
            p.set_state(state);
            assert_eq!(p.state(), state);
        }
    }

    #[test]
    fn test_inherited_stack_is_capped() {
        let layout = StackLayout::new();
        let p = process("child").with_stack_extensions(5, &layout);
        assert_eq!(p.stack_extensions(), 5);
        assert_eq!(p.stack_bottom(), layout.bottom(5));

        let p = process("child").with_stack_extensions(1000, &layout);
        assert_eq!(p.stack_extensions(), layout.max_extensions);
    }

    #[test]
    fn test_trap_frame_attach() {
        let p = process("init");
        assert!(p.trap_frame().is_null());
        let mut tf = TrapFrame::new(64, 0x1b);
        p.attach_trap_frame(&mut tf);
        assert_eq!(p.trap_frame(), &mut tf as *mut TrapFrame);
    }
}
