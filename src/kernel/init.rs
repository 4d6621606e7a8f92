//! Boot-time bring-up of the trap path.

use crate::println;

/// Bring up the interrupt system and start taking interrupts.
pub fn init_kernel() -> Result<(), &'static str> {
    println!("trapkern: kernel initialization");
    init_phase("Interrupt System", init_interrupts)?;
    println!("trapkern: ready");
    Ok(())
}

fn init_phase(name: &'static str, init_fn: fn() -> Result<(), &'static str>) -> Result<(), &'static str> {
    println!("[init] {}...", name);

    match init_fn() {
        Ok(()) => {
            println!("    {} ok", name);
            Ok(())
        }
        Err(e) => {
            println!("    {} failed: {}", name, e);
            Err(e)
        }
    }
}

fn init_interrupts() -> Result<(), &'static str> {
    let cpu = crate::kernel::cpu::this_cpu().map_err(|_| "processor not registered")?;
    crate::interrupts::init(cpu)?;
    x86_64::instructions::interrupts::enable();
    Ok(())
}
