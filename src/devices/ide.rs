//! Primary IDE channel.
//!
//! Reading the status register acknowledges the drive's interrupt. Request
//! queueing and completion belong to the disk driver.

use x86_64::instructions::port::Port;

const IDE_STATUS: u16 = 0x1F7;

/// IRQ14 handler.
pub fn interrupt() {
    let _status: u8 = unsafe { Port::new(IDE_STATUS).read() };
}
