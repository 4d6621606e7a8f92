//! COM1 receive path.
//!
//! `SerialPort::init` enables the received-data interrupt; on IRQ4 every byte
//! waiting in the receiver is moved into [`INPUT`].

use x86_64::instructions::port::Port;

use crate::devices::ring::ByteRing;

const COM1: u16 = 0x3F8;
const LINE_STATUS: u16 = COM1 + 5;
const DATA_READY: u8 = 0x01;

pub static INPUT: ByteRing<256> = ByteRing::new();

/// IRQ4 handler.
pub fn interrupt() {
    let mut status = Port::<u8>::new(LINE_STATUS);
    let mut data = Port::<u8>::new(COM1);
    unsafe {
        while status.read() & DATA_READY != 0 {
            INPUT.push(data.read());
        }
    }
}

/// Serial input translated the way a terminal sends it.
pub fn read_char() -> Option<char> {
    INPUT.pop().map(|b| match b {
        b'\r' => '\n',
        0x7F => '\x08',
        b => b as char,
    })
}

pub fn is_idle() -> bool {
    INPUT.is_empty()
}
