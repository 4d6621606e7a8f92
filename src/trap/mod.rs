//! # Trap Handling
//!
//! Classification and routing of every hardware trap.
//!
//! ## Vector Layout
//!
//! | Vector   | Cause                   | Handling                          |
//! |----------|-------------------------|-----------------------------------|
//! | 14       | Page fault              | Stack growth, else process fault  |
//! | 32       | Timer (IRQ0)            | Tick on boot CPU, EOI, preempt    |
//! | 33       | Keyboard (IRQ1)         | Keyboard handler, EOI             |
//! | 36       | COM1 (IRQ4)             | Serial handler, EOI               |
//! | 39       | IRQ7                    | Spurious: log, EOI                |
//! | 46       | IDE0 (IRQ14)            | Disk handler, EOI                 |
//! | 47       | IDE1 (IRQ15)            | Ignored (emulator artifact)       |
//! | 63       | IRQ31                   | Spurious: log, EOI                |
//! | 64       | System call             | User-invocable gate               |
//! | other    | Exceptions and unknown  | Process fault                     |

use core::fmt;

pub mod dispatch;
pub mod fault;
pub mod frame;
pub mod idt;
pub mod stack;
pub mod ticks;
#[cfg(target_os = "none")]
pub mod vectors;

pub use dispatch::{Dispatcher, TrapConfig, TrapExit};
pub use frame::TrapFrame;
pub use ticks::{Ticks, WaitChannel, TICKS};

pub const T_PGFLT: u8 = 14;
pub const T_SYSCALL: u8 = 64;
/// First vector of the device block; IRQ n arrives as `T_IRQ0 + n`.
pub const T_IRQ0: u8 = 32;

pub const IRQ_TIMER: u8 = 0;
pub const IRQ_KBD: u8 = 1;
pub const IRQ_COM1: u8 = 4;
pub const IRQ_PIC_SPURIOUS: u8 = 7;
pub const IRQ_IDE: u8 = 14;
pub const IRQ_SPURIOUS: u8 = 31;

pub const DOUBLE_FAULT_VECTOR: u8 = 8;

/// Vectors for which the CPU pushes an error code itself.
pub const fn has_error_code(vector: u8) -> bool {
    matches!(vector, 8 | 10..=14 | 17 | 21 | 29 | 30)
}

/// Why the processor entered the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapCause {
    Syscall,
    Timer,
    Disk,
    /// IDE1; Bochs and some QEMU builds raise it with no device behind it.
    SecondaryDisk,
    Keyboard,
    Serial,
    Spurious(u8),
    PageFault,
    Other(u8),
}

impl TrapCause {
    pub const fn from_vector(vector: u8) -> Self {
        const TIMER: u8 = T_IRQ0 + IRQ_TIMER;
        const DISK: u8 = T_IRQ0 + IRQ_IDE;
        const DISK2: u8 = T_IRQ0 + IRQ_IDE + 1;
        const KBD: u8 = T_IRQ0 + IRQ_KBD;
        const COM1: u8 = T_IRQ0 + IRQ_COM1;
        const PIC_SPURIOUS: u8 = T_IRQ0 + IRQ_PIC_SPURIOUS;
        const SPURIOUS: u8 = T_IRQ0 + IRQ_SPURIOUS;

        match vector {
            T_SYSCALL => Self::Syscall,
            TIMER => Self::Timer,
            DISK => Self::Disk,
            DISK2 => Self::SecondaryDisk,
            KBD => Self::Keyboard,
            COM1 => Self::Serial,
            PIC_SPURIOUS | SPURIOUS => Self::Spurious(vector),
            T_PGFLT => Self::PageFault,
            other => Self::Other(other),
        }
    }

    pub const fn vector(self) -> u8 {
        match self {
            Self::Syscall => T_SYSCALL,
            Self::Timer => T_IRQ0 + IRQ_TIMER,
            Self::Disk => T_IRQ0 + IRQ_IDE,
            Self::SecondaryDisk => T_IRQ0 + IRQ_IDE + 1,
            Self::Keyboard => T_IRQ0 + IRQ_KBD,
            Self::Serial => T_IRQ0 + IRQ_COM1,
            Self::PageFault => T_PGFLT,
            Self::Spurious(v) | Self::Other(v) => v,
        }
    }
}

impl fmt::Display for TrapCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.vector())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_vector_round_trips_through_its_cause() {
        for v in 0..=255u8 {
            assert_eq!(TrapCause::from_vector(v).vector(), v);
        }
    }

    #[test]
    fn test_device_block() {
        assert_eq!(TrapCause::from_vector(32), TrapCause::Timer);
        assert_eq!(TrapCause::from_vector(33), TrapCause::Keyboard);
        assert_eq!(TrapCause::from_vector(36), TrapCause::Serial);
        assert_eq!(TrapCause::from_vector(46), TrapCause::Disk);
        assert_eq!(TrapCause::from_vector(47), TrapCause::SecondaryDisk);
    }

    #[test]
    fn test_spurious_and_fallback() {
        assert_eq!(TrapCause::from_vector(39), TrapCause::Spurious(39));
        assert_eq!(TrapCause::from_vector(63), TrapCause::Spurious(63));
        assert_eq!(TrapCause::from_vector(13), TrapCause::Other(13));
        assert_eq!(TrapCause::from_vector(0), TrapCause::Other(0));
        assert_eq!(TrapCause::from_vector(64), TrapCause::Syscall);
        assert_eq!(TrapCause::from_vector(14), TrapCause::PageFault);
    }

    #[test]
    fn test_error_code_vectors() {
        let with_code: [u8; 10] = [8, 10, 11, 12, 13, 14, 17, 21, 29, 30];
        for v in 0..=255u8 {
            assert_eq!(has_error_code(v), with_code.contains(&v), "vector {}", v);
        }
    }
}
