//! # Programmable Interrupt Controller (8259 PIC)
//!
//! ## Vector Remapping
//!
//! IRQ 0-15 would collide with CPU exception vectors, so both chips are
//! remapped to start at `T_IRQ0`:
//! - PIC 1: vectors 32-39 (IRQ 0-7)
//! - PIC 2: vectors 40-47 (IRQ 8-15)
//!
//! A glitch on an IRQ line makes the master report IRQ 7 with nothing behind
//! it; that is the spurious vector 39 the dispatcher logs.
//!
//! ## Interrupt Assignments
//!
//! | IRQ | Vector | Device    |
//! |-----|--------|-----------|
//! | 0   | 32     | PIT timer |
//! | 1   | 33     | Keyboard  |
//! | 2   | 34     | Cascade   |
//! | 4   | 36     | COM1      |
//! | 14  | 46     | IDE0      |
//! | 15  | 47     | IDE1      |

use pic8259::ChainedPics;
use spin::Mutex;

use crate::trap::{IRQ_COM1, IRQ_IDE, IRQ_KBD, IRQ_TIMER, T_IRQ0};

pub const PIC_1_OFFSET: u8 = T_IRQ0;
pub const PIC_2_OFFSET: u8 = T_IRQ0 + 8;

pub static PICS: Mutex<ChainedPics> = Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

const IRQ_CASCADE: u8 = 2;

/// Interrupt lines left unmasked after init.
pub const ENABLED_IRQS: [u8; 5] = [IRQ_TIMER, IRQ_KBD, IRQ_CASCADE, IRQ_COM1, IRQ_IDE];

/// Mask bytes for (master, slave); a set bit disables the line.
pub fn masks(enabled: &[u8]) -> (u8, u8) {
    let mut bits: u16 = 0xFFFF;
    for &irq in enabled {
        if irq < 16 {
            bits &= !(1 << irq);
        }
    }
    (bits as u8, (bits >> 8) as u8)
}

pub fn init() {
    let (master, slave) = masks(&ENABLED_IRQS);
    let mut pics = PICS.lock();
    unsafe {
        pics.initialize();
        pics.write_masks(master, slave);
    }
}

pub fn end_of_interrupt(vector: u8) {
    unsafe {
        PICS.lock().notify_end_of_interrupt(vector);
    }
}
