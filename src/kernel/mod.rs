//! Bare-metal side of the kernel: the hardware [`Platform`](crate::platform::Platform),
//! the assembly trap entry and the boot sequence.

pub mod cpu;
#[cfg(target_os = "none")]
pub mod init;
pub mod platform;

#[cfg(target_os = "none")]
pub use init::init_kernel;
pub use platform::{register_scheduler, set_current, KernelPlatform, Scheduler};

use spin::Once;

#[cfg(target_os = "none")]
use crate::trap::{Dispatcher, TrapConfig, TrapFrame, TICKS};

static BOOT_CPU: Once<usize> = Once::new();

/// Register the executing processor and remember it as the one that keeps time.
pub fn record_boot_cpu() -> Result<usize, cpu::CpuError> {
    let index = cpu::register_this_cpu()?;
    Ok(*BOOT_CPU.call_once(|| index))
}

/// Called by `trap_common` with the frame it just pushed.
#[cfg(target_os = "none")]
#[no_mangle]
pub extern "C" fn trap_entry(tf: &mut TrapFrame) {
    let boot_cpu = BOOT_CPU.get().copied().unwrap_or(0);
    let dispatcher = Dispatcher::new(&KernelPlatform, &TICKS, TrapConfig::new(boot_cpu));
    let _ = dispatcher.trap(tf);
}
