//! # Trap Dispatcher
//!
//! Entry point for every trap on every processor.
//!
//! ## Flow
//!
//! ```text
//! TrapFrame ─▶ TrapCause ─┬─ Syscall ───── killed? exit : call, killed? exit
//!                         ├─ Timer ─────── tick (boot CPU only), EOI
//!                         ├─ Disk/Kbd/COM1 handler, EOI
//!                         ├─ SecondaryDisk ignored
//!                         ├─ Spurious ──── log, EOI
//!                         ├─ PageFault ─── stack growth, else process fault
//!                         └─ Other ─────── process fault
//!                                  │
//!                                  ▼
//!           killed && user? exit ─▶ running && user && timer? yield
//!                                  ─▶ killed && user? exit ─▶ resume
//! ```
//!
//! ## Cancellation
//!
//! Killing a process only sets a flag. The flag is acted on here, around the
//! system call and around the voluntary yield, and only for traps taken from
//! user mode, so kernel work already under way for the process always finishes.

use crate::param::StackLayout;
use crate::platform::Platform;
use crate::proc::ProcState;
use crate::trap::ticks::Ticks;
use crate::trap::{fault, stack, TrapCause, TrapFrame};

/// How the trap ended for the interrupted context.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapExit {
    Resume,
    /// The current process was terminated.
    Exited,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapConfig {
    /// The only processor that advances the tick counter.
    pub boot_cpu: usize,
    pub stack: StackLayout,
}

impl TrapConfig {
    pub const fn new(boot_cpu: usize) -> Self {
        Self {
            boot_cpu,
            stack: StackLayout::new(),
        }
    }
}

impl Default for TrapConfig {
    fn default() -> Self {
        Self::new(0)
    }
}

pub struct Dispatcher<'a, P: Platform + ?Sized> {
    platform: &'a P,
    ticks: &'a Ticks,
    config: TrapConfig,
}

impl<'a, P: Platform + ?Sized> Dispatcher<'a, P> {
    pub fn new(platform: &'a P, ticks: &'a Ticks, config: TrapConfig) -> Self {
        Self {
            platform,
            ticks,
            config,
        }
    }

    pub fn trap(&self, tf: &mut TrapFrame) -> TrapExit {
        let cause = TrapCause::from_vector(tf.vector());
        let platform = self.platform;

        match cause {
            TrapCause::Syscall => {
                if self.syscall(tf) == TrapExit::Exited {
                    return TrapExit::Exited;
                }
            }
            TrapCause::Timer => {
                if platform.cpu_id() == self.config.boot_cpu {
                    self.ticks.advance(platform);
                }
                platform.ack_interrupt(cause.vector());
            }
            TrapCause::Disk => {
                platform.disk_interrupt();
                platform.ack_interrupt(cause.vector());
            }
            TrapCause::SecondaryDisk => {}
            TrapCause::Keyboard => {
                platform.keyboard_interrupt();
                platform.ack_interrupt(cause.vector());
            }
            TrapCause::Serial => {
                platform.serial_interrupt();
                platform.ack_interrupt(cause.vector());
            }
            TrapCause::Spurious(vector) => {
                platform.diag(format_args!(
                    "cpu{}: spurious interrupt at {:#x}:{:#x}",
                    platform.cpu_id(),
                    tf.cs,
                    tf.rip
                ));
                platform.ack_interrupt(vector);
            }
            TrapCause::PageFault => self.page_fault(tf),
            TrapCause::Other(_) => fault::process_fault(platform, tf),
        }

        self.checkpoints(cause, tf)
    }

    fn syscall(&self, tf: &mut TrapFrame) -> TrapExit {
        let platform = self.platform;
        let Some(process) = platform.current_process() else {
            fault::process_fault(platform, tf);
            return TrapExit::Resume;
        };

        if process.is_killed() {
            platform.exit_current();
            return TrapExit::Exited;
        }
        process.attach_trap_frame(tf);
        platform.syscall(process, tf);
        if process.is_killed() {
            platform.exit_current();
            return TrapExit::Exited;
        }
        TrapExit::Resume
    }

    fn page_fault(&self, tf: &TrapFrame) {
        let platform = self.platform;
        let Some(process) = platform.current_process() else {
            fault::process_fault(platform, tf);
            return;
        };

        let addr = platform.fault_address();
        if let Err(rejection) = stack::grow(platform, process, addr, &self.config.stack) {
            platform.diag(format_args!(
                "pid {}: page fault at {:#x} sz={:#x}: {}",
                process.pid(),
                addr,
                process.size(),
                rejection
            ));
            fault::process_fault(platform, tf);
        }
    }

    fn checkpoints(&self, cause: TrapCause, tf: &TrapFrame) -> TrapExit {
        let platform = self.platform;
        let from_user = tf.from_user();

        if self.must_exit(from_user) {
            platform.exit_current();
            return TrapExit::Exited;
        }

        if let Some(process) = platform.current_process() {
            if process.state() == ProcState::Running && from_user && cause == TrapCause::Timer {
                platform.yield_cpu();
            }
        }

        // Another processor may have killed us while we were off the CPU.
        if self.must_exit(from_user) {
            platform.exit_current();
            return TrapExit::Exited;
        }

        TrapExit::Resume
    }

    fn must_exit(&self, from_user: bool) -> bool {
        from_user
            && self
                .platform
                .current_process()
                .map_or(false, |process| process.is_killed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{user_process, MockPlatform, KCODE, UCODE};
    use crate::trap::{T_IRQ0, T_PGFLT, T_SYSCALL};

    fn running(platform: MockPlatform) -> MockPlatform {
        platform.process().set_state(ProcState::Running);
        platform
    }

    fn with_user() -> MockPlatform {
        running(MockPlatform::new().with_process(user_process(&StackLayout::new())))
    }

    fn dispatch(platform: &MockPlatform, ticks: &Ticks, tf: &mut TrapFrame) -> TrapExit {
        Dispatcher::new(platform, ticks, TrapConfig::default()).trap(tf)
    }

    #[test]
    fn test_syscall_runs_and_resumes() {
        let platform = with_user();
        let ticks = Ticks::new();
        let mut tf = TrapFrame::new(T_SYSCALL, UCODE);

        assert_eq!(dispatch(&platform, &ticks, &mut tf), TrapExit::Resume);

        assert_eq!(platform.syscalls(), 1);
        assert_eq!(tf.rax, MockPlatform::SYSCALL_RESULT);
        assert_eq!(platform.process().trap_frame(), &mut tf as *mut TrapFrame);
        assert_eq!(platform.exits(), 0);
    }

    #[test]
    fn test_syscall_from_killed_process_never_runs() {
        let platform = with_user();
        platform.process().kill();
        let mut tf = TrapFrame::new(T_SYSCALL, UCODE);

        assert_eq!(dispatch(&platform, &Ticks::new(), &mut tf), TrapExit::Exited);

        assert_eq!(platform.syscalls(), 0);
        assert_eq!(platform.exits(), 1);
    }

    #[test]
    fn test_kill_during_syscall_exits_after_it_returns() {
        let platform = with_user();
        platform.kill_during_syscall();
        let mut tf = TrapFrame::new(T_SYSCALL, UCODE);

        assert_eq!(dispatch(&platform, &Ticks::new(), &mut tf), TrapExit::Exited);

        assert_eq!(platform.syscalls(), 1);
        assert_eq!(tf.rax, MockPlatform::SYSCALL_RESULT);
        assert_eq!(platform.exits(), 1);
        assert_eq!(platform.yields(), 0);
    }

    #[test]
    #[should_panic(expected = "unexpected trap 64")]
    fn test_syscall_without_process_halts() {
        let platform = MockPlatform::new();
        let _ = dispatch(&platform, &Ticks::new(), &mut TrapFrame::new(T_SYSCALL, UCODE));
    }

    #[test]
    fn test_timer_on_boot_cpu_ticks_and_acks() {
        let platform = MockPlatform::new();
        let ticks = Ticks::new();
        for _ in 0..5 {
            let _ = dispatch(&platform, &ticks, &mut TrapFrame::new(T_IRQ0, KCODE));
        }
        assert_eq!(ticks.now(), 5);
        assert_eq!(platform.wakeups(), vec![ticks.channel(); 5]);
        assert_eq!(platform.acks(), vec![T_IRQ0; 5]);
    }

    #[test]
    fn test_timer_on_other_cpu_only_acks() {
        let platform = MockPlatform::new().on_cpu(2);
        let ticks = Ticks::new();
        let _ = dispatch(&platform, &ticks, &mut TrapFrame::new(T_IRQ0, KCODE));
        assert_eq!(ticks.now(), 0);
        assert!(platform.wakeups().is_empty());
        assert_eq!(platform.acks(), vec![T_IRQ0]);
    }

    #[test]
    fn test_timer_preempts_running_user_process_once() {
        let platform = with_user();
        let ticks = Ticks::new();
        let exit = dispatch(&platform, &ticks, &mut TrapFrame::new(T_IRQ0, UCODE));
        assert_eq!(exit, TrapExit::Resume);
        assert_eq!(platform.yields(), 1);
        assert_eq!(ticks.now(), 1);
    }

    #[test]
    fn test_timer_in_kernel_mode_does_not_preempt() {
        let platform = with_user();
        let _ = dispatch(&platform, &Ticks::new(), &mut TrapFrame::new(T_IRQ0, KCODE));
        assert_eq!(platform.yields(), 0);
    }

    #[test]
    fn test_timer_does_not_preempt_non_running_process() {
        let platform = with_user();
        platform.process().set_state(ProcState::Runnable);
        let _ = dispatch(&platform, &Ticks::new(), &mut TrapFrame::new(T_IRQ0, UCODE));
        assert_eq!(platform.yields(), 0);
    }

    #[test]
    fn test_killed_while_yielded_exits_on_resume() {
        let platform = with_user();
        platform.kill_during_yield();
        let exit = dispatch(&platform, &Ticks::new(), &mut TrapFrame::new(T_IRQ0, UCODE));
        assert_eq!(exit, TrapExit::Exited);
        assert_eq!(platform.yields(), 1);
        assert_eq!(platform.exits(), 1);
    }

    #[test]
    fn test_killed_process_exits_before_yield() {
        let platform = with_user();
        platform.process().kill();
        let exit = dispatch(&platform, &Ticks::new(), &mut TrapFrame::new(T_IRQ0, UCODE));
        assert_eq!(exit, TrapExit::Exited);
        assert_eq!(platform.yields(), 0);
        assert_eq!(platform.acks(), vec![T_IRQ0]);
    }

    #[test]
    fn test_killed_process_in_kernel_mode_keeps_running() {
        let platform = with_user();
        platform.process().kill();
        let exit = dispatch(&platform, &Ticks::new(), &mut TrapFrame::new(T_IRQ0 + 14, KCODE));
        assert_eq!(exit, TrapExit::Resume);
        assert_eq!(platform.exits(), 0);
        assert_eq!(platform.disk_interrupts(), 1);
    }

    #[test]
    fn test_device_interrupts_delegate_then_ack() {
        let platform = MockPlatform::new();
        let ticks = Ticks::new();
        let _ = dispatch(&platform, &ticks, &mut TrapFrame::new(T_IRQ0 + 14, KCODE));
        let _ = dispatch(&platform, &ticks, &mut TrapFrame::new(T_IRQ0 + 1, KCODE));
        let _ = dispatch(&platform, &ticks, &mut TrapFrame::new(T_IRQ0 + 4, KCODE));
        assert_eq!(platform.disk_interrupts(), 1);
        assert_eq!(platform.keyboard_interrupts(), 1);
        assert_eq!(platform.serial_interrupts(), 1);
        assert_eq!(platform.acks(), vec![T_IRQ0 + 14, T_IRQ0 + 1, T_IRQ0 + 4]);
        assert_eq!(
            platform.events(),
            vec!["disk", "ack 46", "keyboard", "ack 33", "serial", "ack 36"]
        );
    }

    #[test]
    fn test_secondary_disk_is_ignored() {
        let platform = with_user();
        let exit = dispatch(&platform, &Ticks::new(), &mut TrapFrame::new(T_IRQ0 + 15, UCODE));
        assert_eq!(exit, TrapExit::Resume);
        assert_eq!(platform.disk_interrupts(), 0);
        assert!(platform.acks().is_empty());
        assert!(platform.diagnostics().is_empty());
    }

    #[test]
    fn test_spurious_interrupts_logged_and_acked() {
        let platform = MockPlatform::new().on_cpu(1);
        let ticks = Ticks::new();
        let mut tf = TrapFrame::new(T_IRQ0 + 7, KCODE);
        tf.rip = 0x1234;
        let _ = dispatch(&platform, &ticks, &mut tf);
        let _ = dispatch(&platform, &ticks, &mut TrapFrame::new(T_IRQ0 + 31, KCODE));
        assert_eq!(platform.acks(), vec![T_IRQ0 + 7, T_IRQ0 + 31]);
        assert_eq!(
            platform.diagnostics(),
            vec![
                "cpu1: spurious interrupt at 0x8:0x1234".to_string(),
                "cpu1: spurious interrupt at 0x8:0x0".to_string(),
            ]
        );
    }

    #[test]
    fn test_stack_growth_fault_resumes() {
        let layout = StackLayout::new();
        let platform = with_user();
        platform.set_fault_address(layout.bottom(0));

        let exit = dispatch(&platform, &Ticks::new(), &mut TrapFrame::new(T_PGFLT, UCODE));

        assert_eq!(exit, TrapExit::Resume);
        assert_eq!(platform.process().stack_extensions(), 1);
        assert!(!platform.process().is_killed());
        assert_eq!(platform.exits(), 0);
    }

    #[test]
    fn test_unrelated_page_fault_kills_at_checkpoint() {
        let platform = with_user();
        platform.set_fault_address(0x10);

        let exit = dispatch(&platform, &Ticks::new(), &mut TrapFrame::new(T_PGFLT, UCODE));

        assert_eq!(exit, TrapExit::Exited);
        assert!(platform.process().is_killed());
        assert_eq!(platform.process().stack_extensions(), 0);
        assert_eq!(platform.exits(), 1);
        assert_eq!(platform.diagnostics().len(), 2);
    }

    #[test]
    fn test_unrelated_kernel_mode_page_fault_marks_nothing_and_halts() {
        let platform = with_user();
        platform.set_fault_address(0x10);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            dispatch(&platform, &Ticks::new(), &mut TrapFrame::new(T_PGFLT, KCODE))
        }));
        assert!(result.is_err());
        assert!(!platform.process().is_killed());
    }

    #[test]
    fn test_page_fault_past_cap_kills() {
        let layout = StackLayout::new();
        let platform = MockPlatform::new()
            .with_process(user_process(&layout).with_stack_extensions(100, &layout));
        platform.set_fault_address(layout.bottom(100));

        let exit = dispatch(&platform, &Ticks::new(), &mut TrapFrame::new(T_PGFLT, UCODE));

        assert_eq!(exit, TrapExit::Exited);
        assert!(platform.grants().is_empty());
    }

    #[test]
    fn test_other_user_trap_kills() {
        let platform = with_user();
        let exit = dispatch(&platform, &Ticks::new(), &mut TrapFrame::new(13, UCODE));
        assert_eq!(exit, TrapExit::Exited);
        assert!(platform.process().is_killed());
    }

    #[test]
    #[should_panic(expected = "unexpected trap 0 from cpu 0")]
    fn test_other_kernel_trap_halts() {
        let platform = with_user();
        let _ = dispatch(&platform, &Ticks::new(), &mut TrapFrame::new(0, KCODE));
    }
}
