//! # Platform
//!
//! Everything the trap path needs from the rest of the kernel. The dispatcher
//! and its policies are generic over this trait; `kernel::platform` binds it to
//! the hardware and the tests bind it to a recording mock.

use core::fmt;

use crate::mm::{AddressSpace, GrowError};
use crate::proc::Process;
use crate::trap::{TrapFrame, WaitChannel};

pub trait Platform {
    /// Identifier of the executing processor.
    fn cpu_id(&self) -> usize;

    /// Process running on this processor, if any.
    fn current_process(&self) -> Option<&Process>;

    /// Address that caused the most recent page fault on this processor.
    fn fault_address(&self) -> u64;

    /// Signal end-of-interrupt for `vector` to the interrupt controller.
    fn ack_interrupt(&self, vector: u8);

    /// Run the system call described by `frame`, leaving the result in it.
    fn syscall(&self, process: &Process, frame: &mut TrapFrame);

    fn disk_interrupt(&self);
    fn keyboard_interrupt(&self);
    fn serial_interrupt(&self);

    /// Map fresh user pages covering `[from, to)`.
    fn grow_address_space(&self, space: &AddressSpace, from: u64, to: u64) -> Result<(), GrowError>;

    fn set_user_accessible(&self, space: &AddressSpace, addr: u64);

    /// Give up the processor. Returns when the scheduler picks the caller again,
    /// possibly on another processor.
    fn yield_cpu(&self);

    /// Wake every context sleeping on `channel`.
    fn wakeup(&self, channel: WaitChannel);

    /// Terminate the current process. Never returns on hardware.
    fn exit_current(&self);

    fn diag(&self, args: fmt::Arguments<'_>);

    /// Stop the whole system.
    fn halt(&self, args: fmt::Arguments<'_>) -> !;
}
