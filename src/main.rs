#![no_std]
#![no_main]

extern crate rlibc;

use bootloader_api::config::{BootloaderConfig, Mapping};
use bootloader_api::{entry_point, BootInfo};
use core::panic::PanicInfo;
use x86_64::instructions::{hlt, interrupts};

use trapkern::devices::{keyboard, uart};
use trapkern::kernel::{init_kernel, record_boot_cpu};
use trapkern::{mm, println, SERIAL};

pub static BOOTLOADER_CONFIG: BootloaderConfig = {
    let mut config = BootloaderConfig::new_default();
    config.mappings.physical_memory = Some(Mapping::Dynamic);
    config
};

entry_point!(kernel_main, config = &BOOTLOADER_CONFIG);

fn kernel_main(boot_info: &'static mut BootInfo) -> ! {
    SERIAL.lock().init();

    if let Err(e) = mm::init(boot_info) {
        println!("Failed to init memory: {}", e);
        park();
    }

    match record_boot_cpu() {
        Ok(boot_cpu) => println!("boot cpu {}", boot_cpu),
        Err(e) => {
            println!("Failed to register boot cpu: {}", e);
            park();
        }
    }

    if init_kernel().is_err() {
        println!("Kernel initialization failed!");
        park();
    }

    let mut decoder = keyboard::ScancodeDecoder::new();

    loop {
        while let Some(scancode) = keyboard::dequeue_scancode() {
            if let Some(key) = decoder.process_scancode(scancode) {
                echo(key.character);
            }
        }
        while let Some(ch) = uart::read_char() {
            echo(ch);
        }

        // Sleep until the next interrupt without losing one that lands between
        // the checks above and the hlt.
        interrupts::disable();
        if keyboard::is_idle() && uart::is_idle() {
            interrupts::enable_and_hlt();
        } else {
            interrupts::enable();
        }
    }
}

fn echo(ch: char) {
    interrupts::without_interrupts(|| {
        use core::fmt::Write;
        let _ = write!(SERIAL.lock(), "{}", ch);
    });
}

fn park() -> ! {
    loop {
        interrupts::disable();
        hlt();
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    interrupts::disable();
    // The panicking path may already hold the console.
    unsafe { SERIAL.force_unlock() };
    println!("PANIC : {} | {:?}", info.message(), info.location());
    park()
}
