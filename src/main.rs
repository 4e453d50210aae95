#![no_std]
#![no_main]

use core::panic::PanicInfo;

use corelix::boot::Handoff;
use corelix::{config::BootConfig, gdt, interrupts, logger, memory, serial, sync, task, tty};

/// Entry point invoked by the firmware bridge once boot services have
/// been exited and it has assembled a [`Handoff`]. `extern "C"` so the
/// bridge (a small freestanding stub, out of scope here) can call it
/// without needing to know Rust's calling convention.
#[no_mangle]
pub extern "C" fn kernel_main(handoff: &Handoff) -> ! {
    serial::init();
    let boot_config = match handoff.boot_config_blob {
        Some(blob) => BootConfig::parse(blob),
        None => BootConfig::default(),
    };
    logger::init(boot_config.log_level);

    log::info!("corelix booting, {} conventional pages reported", handoff.conventional_pages());

    memory::frame_allocator::init(handoff.memory_map).unwrap_or_else(|e| {
        log::error!("physical allocator init failed: {e}");
        corelix::hlt_loop();
    });

    memory::heap::init(boot_config.heap_pages as u64).unwrap_or_else(|e| {
        log::error!("heap init failed: {e}");
        corelix::hlt_loop();
    });

    memory::paging::init().unwrap_or_else(|e| {
        log::error!("paging init failed: {e}");
        corelix::hlt_loop();
    });

    gdt::init().unwrap_or_else(|e| {
        log::error!("GDT init failed: {e}");
        corelix::hlt_loop();
    });

    sync::init().unwrap_or_else(|e| {
        log::error!("sync pool init failed: {e}");
        corelix::hlt_loop();
    });

    interrupts::init();

    // `tty::install` wires a concrete framebuffer Painter and font blob;
    // that's the graphics collaborator's job, out of this core's scope.
    // Without it the TTY task still runs, it just renders nothing.
    let tty_slot = task::create(tty::tty_task).unwrap_or_else(|e| {
        log::error!("failed to create tty task: {e}");
        corelix::hlt_loop();
    });
    let shell_slot = task::create(tty::shell_task).unwrap_or_else(|e| {
        log::error!("failed to create shell task: {e}");
        corelix::hlt_loop();
    });

    task::schedule(tty_slot);
    task::schedule(shell_slot);

    log::info!("corelix boot complete, entering idle loop");
    corelix::hlt_loop();
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    log::error!("panic: {info}");
    serial::write_bytes(b"PANIC\n");
    corelix::hlt_loop();
}
