//! Device Interrupt Handlers
//!
//! The trap dispatcher calls into these on IRQ 1, 4 and 14:
//! - `ide`: primary IDE channel completion
//! - `keyboard`: PS/2 scancodes into a ring buffer, decoded by the idle loop
//! - `uart`: COM1 receive bytes into a ring buffer
//! - `ring`: the lock-free single-producer ring both input paths share

pub mod ide;
pub mod keyboard;
pub mod ring;
pub mod uart;
