//! # trapkern
//!
//! Trap and interrupt dispatch for a multiprocessor x86_64 kernel.
//!
//! Every transition from user to kernel execution enters through the vector
//! table built in [`trap::idt`], lands in [`trap::Dispatcher::trap`] and leaves
//! either by resuming the interrupted context or by terminating the process.
//!
//! ## Layout
//!
//! | Module        | Contents                                             |
//! |---------------|------------------------------------------------------|
//! | `param`       | Compile-time limits and the user stack layout        |
//! | `trap`        | Vector table, snapshot, tick counter, policies       |
//! | `proc`        | The process view the dispatcher reads and marks      |
//! | `platform`    | Collaborator interface consumed by the dispatcher    |
//! | `mm`          | Page mapping used for stack growth                   |
//! | `syscalls`    | In-kernel system call table                          |
//! | `devices`     | IDE, PS/2 keyboard and COM1 interrupt handlers       |
//! | `interrupts`  | GDT/TSS, PIC remapping, vector table activation      |
//! | `kernel`      | Bare-metal platform and boot sequence                |
//!
//! The policy code only talks to hardware through [`platform::Platform`], so
//! it builds and tests on the host.

#![cfg_attr(not(test), no_std)]

use core::fmt;
use core::fmt::Write;

use spin::Mutex;
use uart_16550::SerialPort;

pub mod devices;
pub mod interrupts;
pub mod kernel;
pub mod mm;
pub mod param;
pub mod platform;
pub mod proc;
pub mod syscalls;
pub mod trap;

#[cfg(test)]
mod testing;

pub static SERIAL: Mutex<SerialPort> = Mutex::new(unsafe { SerialPort::new(0x3F8) });

#[macro_export]
macro_rules! println {
    () => {
        $crate::_print(format_args!(""))
    };
    ($($arg:tt)*) => {
        $crate::_print(format_args!($($arg)*))
    };
}

/// Write one console line. Interrupts stay off while `SERIAL` is held, so a
/// trap that logs on this processor never spins on a lock its own thread holds.
#[doc(hidden)]
pub fn _print(args: fmt::Arguments<'_>) {
    without_interrupts(|| write_line(&SERIAL, args));
}

fn write_line<W: fmt::Write>(console: &Mutex<W>, args: fmt::Arguments<'_>) {
    let mut console = console.lock();
    let _ = console.write_fmt(args);
    let _ = console.write_char('\n');
}

#[cfg(target_os = "none")]
fn without_interrupts<R>(f: impl FnOnce() -> R) -> R {
    x86_64::instructions::interrupts::without_interrupts(f)
}

// Host builds run in ring 3, where `cli` faults.
#[cfg(not(target_os = "none"))]
fn without_interrupts<R>(f: impl FnOnce() -> R) -> R {
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_line_is_terminated_and_lock_released() {
        let console = Mutex::new(String::new());
        write_line(&console, format_args!("cpu{}: spurious interrupt at {:#x}:{:#x}", 1, 8, 0x1234));
        assert!(!console.is_locked());
        write_line(&console, format_args!(""));
        assert_eq!(*console.lock(), "cpu1: spurious interrupt at 0x8:0x1234\n\n");
    }
}
