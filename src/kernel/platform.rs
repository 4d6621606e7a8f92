//! # Kernel Platform
//!
//! Binds [`Platform`] to the machine: the registered processor index, CR2 for the
//! fault address, the 8259 pair for end-of-interrupt and the device modules
//! for IRQ work. Scheduling is owned by whoever registers a [`Scheduler`].

use core::fmt;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use spin::Once;
use x86_64::registers::control::Cr2;

use crate::devices::{ide, keyboard, uart};
use crate::interrupts::pic;
use crate::kernel::cpu::{self, CpuError};
use crate::mm::{AddressSpace, GrowError};
use crate::param::MAX_CPUS;
use crate::platform::Platform;
use crate::println;
use crate::proc::Process;
use crate::syscalls;
use crate::trap::{TrapFrame, WaitChannel, TICKS};

/// Process switching, provided by the process subsystem.
pub trait Scheduler: Sync {
    fn yield_now(&self);
    fn wakeup(&self, channel: WaitChannel);
    fn exit_current(&self) -> !;
}

static SCHEDULER: Once<&'static dyn Scheduler> = Once::new();

/// Install the scheduler. Only the first registration takes effect.
pub fn register_scheduler(scheduler: &'static dyn Scheduler) {
    SCHEDULER.call_once(|| scheduler);
}

static CURRENT: [AtomicPtr<Process>; MAX_CPUS] = [const { AtomicPtr::new(ptr::null_mut()) }; MAX_CPUS];

/// Dense index of the executing processor. A processor trapping before it
/// registered is a bring-up defect.
pub fn cpu_id() -> usize {
    match cpu::this_cpu() {
        Ok(index) => index,
        Err(e) => panic!("{}", e),
    }
}

/// Record the process now running on this processor, or `None` when idle.
pub fn set_current(process: Option<&'static Process>) -> Result<(), CpuError> {
    let index = cpu::this_cpu()?;
    let raw = process.map_or(ptr::null_mut(), |p| p as *const Process as *mut Process);
    CURRENT[index].store(raw, Ordering::Release);
    Ok(())
}

pub struct KernelPlatform;

impl Platform for KernelPlatform {
    fn cpu_id(&self) -> usize {
        cpu_id()
    }

    fn current_process(&self) -> Option<&Process> {
        let raw = CURRENT[cpu_id()].load(Ordering::Acquire);
        // Slots only ever hold `&'static Process` published by `set_current`.
        unsafe { raw.as_ref() }
    }

    fn fault_address(&self) -> u64 {
        Cr2::read_raw()
    }

    fn ack_interrupt(&self, vector: u8) {
        pic::end_of_interrupt(vector);
    }

    fn syscall(&self, process: &Process, frame: &mut TrapFrame) {
        syscalls::handle(process, frame, &TICKS);
    }

    fn disk_interrupt(&self) {
        ide::interrupt();
    }

    fn keyboard_interrupt(&self) {
        keyboard::interrupt();
    }

    fn serial_interrupt(&self) {
        uart::interrupt();
    }

    fn grow_address_space(&self, space: &AddressSpace, from: u64, to: u64) -> Result<(), GrowError> {
        space.grow(from, to)
    }

    fn set_user_accessible(&self, space: &AddressSpace, addr: u64) {
        if let Err(e) = space.set_user_accessible(addr) {
            println!("set_user_accessible {:#x}: {}", addr, e);
        }
    }

    fn yield_cpu(&self) {
        if let Some(scheduler) = SCHEDULER.get() {
            scheduler.yield_now();
        }
    }

    fn wakeup(&self, channel: WaitChannel) {
        if let Some(scheduler) = SCHEDULER.get() {
            scheduler.wakeup(channel);
        }
    }

    fn exit_current(&self) {
        match SCHEDULER.get() {
            Some(scheduler) => scheduler.exit_current(),
            None => self.halt(format_args!("exit with no scheduler on cpu {}", cpu_id())),
        }
    }

    fn diag(&self, args: fmt::Arguments<'_>) {
        println!("{}", args);
    }

    fn halt(&self, args: fmt::Arguments<'_>) -> ! {
        panic!("{}", args)
    }
}
