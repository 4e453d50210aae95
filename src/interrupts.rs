//! IDT installation, PIC remap, and the interrupt entry stubs.
//!
//! Most vectors are ordinary CPU exceptions or PIC IRQs and use the
//! `x86-interrupt` calling convention the `x86_64` crate provides. The
//! timer (IRQ 0) and the voluntary-sleep software interrupt are different:
//! they must hand the scheduler a raw pointer to a [`RegisterFrame`] and
//! may return a *different* frame pointer to resume into, so their entry
//! points are naked stubs operating on the frame layout directly.

use conquer_once::spin::OnceCell;
use pic8259::ChainedPics;
use x86_64::structures::idt::{InterruptDescriptorTable, InterruptStackFrame};

use crate::gdt::IST1_INDEX;
use crate::task;

pub const PIC_1_OFFSET: u8 = 32;
pub const PIC_2_OFFSET: u8 = PIC_1_OFFSET + 8;

pub const TIMER_VECTOR: u8 = PIC_1_OFFSET;
pub const KEYBOARD_VECTOR: u8 = PIC_1_OFFSET + 1;
pub const SYSCALL_VECTOR: u8 = 0x40;

pub static PICS: spin::Mutex<ChainedPics> =
    spin::Mutex::new(unsafe { ChainedPics::new(PIC_1_OFFSET, PIC_2_OFFSET) });

static IDT: OnceCell<InterruptDescriptorTable> = OnceCell::uninit();

/// The register-save frame every ISR entry stub agrees on, bit-for-bit.
/// Indices 16-20 are pushed by the CPU itself on interrupt entry; indices
/// 0-15 are pushed by the assembly stub.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RegisterFrame {
    pub padding: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

core::arch::global_asm!(
    "
    .macro save_registers
        push rbp
        push rdi
        push rsi
        push r15
        push r14
        push r13
        push r12
        push r11
        push r10
        push r9
        push r8
        push rdx
        push rcx
        push rbx
        push rax
        sub rsp, 8
    .endmacro

    .macro restore_registers
        add rsp, 8
        pop rax
        pop rbx
        pop rcx
        pop rdx
        pop r8
        pop r9
        pop r10
        pop r11
        pop r12
        pop r13
        pop r14
        pop r15
        pop rsi
        pop rdi
        pop rbp
    .endmacro

    .global timer_entry
    timer_entry:
        save_registers
        mov rdi, rsp
        call {timer_handler}
        mov rsp, rax
        restore_registers
        iretq

    .global syscall_entry
    syscall_entry:
        save_registers
        mov rdi, rsp
        call {syscall_handler}
        mov rsp, rax
        restore_registers
        iretq
    ",
    timer_handler = sym timer_handler,
    syscall_handler = sym syscall_handler,
);

extern "C" {
    fn timer_entry();
    fn syscall_entry();
}

/// Called from `timer_entry` with the interrupted task's frame; returns
/// the frame of whichever task should run next.
extern "C" fn timer_handler(frame: *mut RegisterFrame) -> *mut RegisterFrame {
    task::tick();
    let next = task::switch(frame);
    unsafe {
        PICS.lock().notify_end_of_interrupt(TIMER_VECTOR);
    }
    next
}

/// Called from `syscall_entry`; dispatches on the frame's `rax` (syscall
/// id) and `rdi`/`rsi`/`rdx`/`rcx` (up to four arguments), per
/// [`crate::syscall`].
extern "C" fn syscall_handler(frame: *mut RegisterFrame) -> *mut RegisterFrame {
    crate::syscall::dispatch(frame)
}

extern "x86-interrupt" fn divide_by_zero_handler(stack: InterruptStackFrame) {
    log::error!("divide-by-zero at {:#x}", stack.instruction_pointer.as_u64());
}

extern "x86-interrupt" fn invalid_opcode_handler(stack: InterruptStackFrame) {
    log::error!("invalid opcode at {:#x}", stack.instruction_pointer.as_u64());
}

extern "x86-interrupt" fn general_protection_fault_handler(stack: InterruptStackFrame, code: u64) {
    log::error!(
        "general protection fault (code {:#x}) at {:#x}",
        code,
        stack.instruction_pointer.as_u64()
    );
}

extern "x86-interrupt" fn page_fault_handler(
    stack: InterruptStackFrame,
    code: x86_64::structures::idt::PageFaultErrorCode,
) {
    let addr = x86_64::registers::control::Cr2::read();
    log::error!(
        "page fault accessing {:?} (code {:?}) at {:#x}",
        addr,
        code,
        stack.instruction_pointer.as_u64()
    );
}

extern "x86-interrupt" fn double_fault_handler(stack: InterruptStackFrame, code: u64) -> ! {
    panic!("double fault (code {code:#x}) at {:#x}", stack.instruction_pointer.as_u64());
}

extern "x86-interrupt" fn generic_handler(_stack: InterruptStackFrame) {
    log::warn!("unhandled interrupt vector");
}

extern "x86-interrupt" fn keyboard_handler(_stack: InterruptStackFrame) {
    let scancode: u8 = unsafe { x86_64::instructions::port::Port::new(0x60).read() };
    crate::keyboard::handle_scancode(scancode);
    unsafe {
        PICS.lock().notify_end_of_interrupt(KEYBOARD_VECTOR);
    }
}

/// Remaps the legacy PIC to vectors 32-47, installs the IDT, and enables
/// interrupts.
pub fn init() {
    unsafe {
        PICS.lock().initialize();
    }

    IDT.init_once(|| {
        let mut idt = InterruptDescriptorTable::new();

        // Vector 0 uses IST1; every other gate runs on whatever stack was
        // current when the interrupt fired.
        unsafe {
            idt.divide_error.set_handler_fn(divide_by_zero_handler).set_stack_index(IST1_INDEX);
        }
        idt.invalid_opcode.set_handler_fn(invalid_opcode_handler);
        idt.general_protection_fault.set_handler_fn(general_protection_fault_handler);
        idt.page_fault.set_handler_fn(page_fault_handler);
        idt.double_fault.set_handler_fn(double_fault_handler);

        // The handful of low vectors whose gates are a plain HandlerFunc
        // (no error code, non-diverging) and aren't claimed above. The
        // rest of 0-31 (invalid_tss, segment_not_present,
        // stack_segment_fault, alignment_check, machine_check,
        // cp_protection_exception, vmm_communication_exception,
        // security_exception, non_maskable_interrupt, and the truly
        // reserved slots) are left untouched: `Index<usize>` panics for
        // the error-code/diverging ones, and there's no generic_handler
        // signature that fits them.
        idt.debug.set_handler_fn(generic_handler);
        idt.breakpoint.set_handler_fn(generic_handler);
        idt.overflow.set_handler_fn(generic_handler);
        idt.bound_range_exceeded.set_handler_fn(generic_handler);
        idt.device_not_available.set_handler_fn(generic_handler);
        idt.coprocessor_segment_overrun.set_handler_fn(generic_handler);
        idt.x87_floating_point.set_handler_fn(generic_handler);
        idt.simd_floating_point.set_handler_fn(generic_handler);
        idt.virtualization.set_handler_fn(generic_handler);
        idt.hv_injection_exception.set_handler_fn(generic_handler);

        for vector in 32usize..=255 {
            if vector == TIMER_VECTOR as usize
                || vector == KEYBOARD_VECTOR as usize
                || vector == SYSCALL_VECTOR as usize
            {
                continue;
            }
            idt[vector].set_handler_fn(generic_handler);
        }

        idt[KEYBOARD_VECTOR as usize].set_handler_fn(keyboard_handler);
        unsafe {
            idt[TIMER_VECTOR as usize].set_handler_addr(x86_64::VirtAddr::new(timer_entry as u64));
            idt[SYSCALL_VECTOR as usize].set_handler_addr(x86_64::VirtAddr::new(syscall_entry as u64));
        }

        idt
    });

    IDT.get().unwrap().load();
    x86_64::instructions::interrupts::enable();
    log::info!("IDT loaded, PIC remapped to vectors {}-{}", PIC_1_OFFSET, PIC_2_OFFSET as u16 + 7);
}
