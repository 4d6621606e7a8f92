//! Recording `Platform` for host tests.

use core::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use x86_64::PhysAddr;

use crate::mm::{AddressSpace, GrowError};
use crate::param::StackLayout;
use crate::platform::Platform;
use crate::proc::{Pid, Process};
use crate::trap::{TrapFrame, WaitChannel};

/// Kernel code segment selector as pushed in `cs`.
pub const KCODE: u64 = 0x08;
/// User code segment selector, RPL 3.
pub const UCODE: u64 = 0x1b;

pub fn user_process(layout: &StackLayout) -> Process {
    Process::new(Pid(3), "lab3", AddressSpace::new(PhysAddr::new(0x20_0000)), 0x1000, layout)
}

#[derive(Default)]
pub struct MockPlatform {
    cpu: usize,
    process: Option<Process>,
    fault_address: AtomicU64,
    grow_error: Mutex<Option<GrowError>>,
    kill_in_syscall: AtomicBool,
    kill_in_yield: AtomicBool,

    syscalls: AtomicUsize,
    yields: AtomicUsize,
    exits: AtomicUsize,
    disk: AtomicUsize,
    keyboard: AtomicUsize,
    serial: AtomicUsize,
    acks: Mutex<Vec<u8>>,
    wakeups: Mutex<Vec<WaitChannel>>,
    grants: Mutex<Vec<(u64, u64)>>,
    user_pages: Mutex<Vec<u64>>,
    diagnostics: Mutex<Vec<String>>,
    events: Mutex<Vec<String>>,
}

impl MockPlatform {
    pub const SYSCALL_RESULT: u64 = 42;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_process(mut self, process: Process) -> Self {
        self.process = Some(process);
        self
    }

    pub fn on_cpu(mut self, cpu: usize) -> Self {
        self.cpu = cpu;
        self
    }

    pub fn process(&self) -> &Process {
        self.process.as_ref().expect("mock has no process")
    }

    pub fn set_fault_address(&self, addr: u64) {
        self.fault_address.store(addr, Ordering::SeqCst);
    }

    pub fn fail_grow(&self, err: GrowError) {
        *self.grow_error.lock().unwrap() = Some(err);
    }

    /// Another processor kills the process while its system call runs.
    pub fn kill_during_syscall(&self) {
        self.kill_in_syscall.store(true, Ordering::SeqCst);
    }

    /// Another processor kills the process while it is off the CPU.
    pub fn kill_during_yield(&self) {
        self.kill_in_yield.store(true, Ordering::SeqCst);
    }

    pub fn syscalls(&self) -> usize {
        self.syscalls.load(Ordering::SeqCst)
    }

    pub fn yields(&self) -> usize {
        self.yields.load(Ordering::SeqCst)
    }

    pub fn exits(&self) -> usize {
        self.exits.load(Ordering::SeqCst)
    }

    pub fn disk_interrupts(&self) -> usize {
        self.disk.load(Ordering::SeqCst)
    }

    pub fn keyboard_interrupts(&self) -> usize {
        self.keyboard.load(Ordering::SeqCst)
    }

    pub fn serial_interrupts(&self) -> usize {
        self.serial.load(Ordering::SeqCst)
    }

    pub fn acks(&self) -> Vec<u8> {
        self.acks.lock().unwrap().clone()
    }

    pub fn wakeups(&self) -> Vec<WaitChannel> {
        self.wakeups.lock().unwrap().clone()
    }

    pub fn grants(&self) -> Vec<(u64, u64)> {
        self.grants.lock().unwrap().clone()
    }

    pub fn user_pages(&self) -> Vec<u64> {
        self.user_pages.lock().unwrap().clone()
    }

    pub fn diagnostics(&self) -> Vec<String> {
        self.diagnostics.lock().unwrap().clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }
}

impl Platform for MockPlatform {
    fn cpu_id(&self) -> usize {
        self.cpu
    }

    fn current_process(&self) -> Option<&Process> {
        self.process.as_ref()
    }

    fn fault_address(&self) -> u64 {
        self.fault_address.load(Ordering::SeqCst)
    }

    fn ack_interrupt(&self, vector: u8) {
        self.acks.lock().unwrap().push(vector);
        self.record(format!("ack {}", vector));
    }

    fn syscall(&self, process: &Process, frame: &mut TrapFrame) {
        self.syscalls.fetch_add(1, Ordering::SeqCst);
        self.record("syscall");
        frame.set_return_value(Self::SYSCALL_RESULT);
        if self.kill_in_syscall.load(Ordering::SeqCst) {
            process.kill();
        }
    }

    fn disk_interrupt(&self) {
        self.disk.fetch_add(1, Ordering::SeqCst);
        self.record("disk");
    }

    fn keyboard_interrupt(&self) {
        self.keyboard.fetch_add(1, Ordering::SeqCst);
        self.record("keyboard");
    }

    fn serial_interrupt(&self) {
        self.serial.fetch_add(1, Ordering::SeqCst);
        self.record("serial");
    }

    fn grow_address_space(&self, _space: &AddressSpace, from: u64, to: u64) -> Result<(), GrowError> {
        if let Some(err) = *self.grow_error.lock().unwrap() {
            return Err(err);
        }
        self.grants.lock().unwrap().push((from, to));
        Ok(())
    }

    fn set_user_accessible(&self, _space: &AddressSpace, addr: u64) {
        self.user_pages.lock().unwrap().push(addr);
    }

    fn yield_cpu(&self) {
        self.yields.fetch_add(1, Ordering::SeqCst);
        self.record("yield");
        if self.kill_in_yield.load(Ordering::SeqCst) {
            if let Some(process) = &self.process {
                process.kill();
            }
        }
    }

    fn wakeup(&self, channel: WaitChannel) {
        self.wakeups.lock().unwrap().push(channel);
    }

    fn exit_current(&self) {
        self.exits.fetch_add(1, Ordering::SeqCst);
        self.record("exit");
    }

    fn diag(&self, args: fmt::Arguments<'_>) {
        self.diagnostics.lock().unwrap().push(args.to_string());
    }

    fn halt(&self, args: fmt::Arguments<'_>) -> ! {
        let message = args.to_string();
        self.record("halt");
        panic!("{}", message);
    }
}
