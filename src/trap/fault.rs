//! Kill-or-halt decision for traps nobody handled.
//!
//! A fault outside ring 0 is the process's problem: it is logged and the process
//! is marked killed, to be terminated at the dispatcher's next checkpoint. A
//! fault in ring 0, or with no process at all, means kernel state can no
//! longer be trusted and the system halts.

use x86_64::PrivilegeLevel;

use crate::platform::Platform;
use crate::trap::TrapFrame;

pub fn process_fault<P: Platform + ?Sized>(platform: &P, tf: &TrapFrame) {
    let process = match platform.current_process() {
        Some(process) if tf.privilege() != PrivilegeLevel::Ring0 => process,
        _ => platform.halt(format_args!(
            "unexpected trap {} from cpu {} rip {:#x} (cr2={:#x})",
            tf.trapno,
            platform.cpu_id(),
            tf.rip,
            platform.fault_address()
        )),
    };

    platform.diag(format_args!(
        "pid {} {}: trap {} err {} on cpu {} rip {:#x} addr {:#x}--kill proc",
        process.pid(),
        process.name(),
        tf.trapno,
        tf.err,
        platform.cpu_id(),
        tf.rip,
        platform.fault_address()
    ));
    process.kill();
}
