#![no_std]
#![feature(abi_x86_interrupt)]

extern crate alloc;

pub mod boot;
pub mod config;
pub mod error;
#[cfg(target_arch = "x86_64")]
pub mod gdt;
pub mod graphics;
#[cfg(target_arch = "x86_64")]
pub mod interrupts;
pub mod io;
pub mod keyboard;
pub mod logger;
#[cfg(target_arch = "x86_64")]
pub mod memory;
pub mod serial;
#[cfg(target_arch = "x86_64")]
pub mod sync;
#[cfg(target_arch = "x86_64")]
pub mod syscall;
#[cfg(target_arch = "x86_64")]
pub mod task;
pub mod tty;
pub mod format;

#[cfg(target_arch = "x86_64")]
#[global_allocator]
static ALLOCATOR: memory::heap::KernelHeap = memory::heap::KernelHeap;

/// Halts the CPU in a loop, interrupts enabled so a future tick can still
/// land — used after a fatal bring-up failure and by the sentinel task.
#[cfg(target_arch = "x86_64")]
pub fn hlt_loop() -> ! {
    loop {
        x86_64::instructions::hlt();
    }
}

