//! # Interrupt Setup
//!
//! - **GDT**: kernel and user segments, per-processor TSS with its own ring 0 and double fault stacks
//! - **Vector table**: built from the entry stubs and loaded with `lidt`
//! - **PIC**: 8259 pair remapped to vector 32, device lines unmasked
//!
//! ## Usage
//!
//! ```ignore
//! interrupts::init(cpu)?;
//! x86_64::instructions::interrupts::enable();
//! ```
//!
//! A processor brought up later loads its own slot's GDT with `gdt::init(cpu)`
//! and then `trap::idt::activate()`; the vector table is built once and shared.

pub mod gdt;
pub mod pic;

/// Segments for processor slot `cpu`, vector table, PIC. Interrupts stay disabled.
#[cfg(target_os = "none")]
pub fn init(cpu: usize) -> Result<(), &'static str> {
    use crate::trap::{idt, vectors};

    gdt::init(cpu);
    idt::init(vectors::stubs(), gdt::selectors(cpu).kernel_code);
    idt::activate()?;
    pic::init();
    Ok(())
}
