//! Global Descriptor Table and Task State Segment bring-up.

use conquer_once::spin::OnceCell;
use core::sync::atomic::{AtomicPtr, Ordering};
use x86_64::structures::gdt::{Descriptor, GlobalDescriptorTable, SegmentSelector};
use x86_64::structures::tss::TaskStateSegment;
use x86_64::VirtAddr;

use crate::error::KernelResult;
use crate::memory::{frame_allocator, PAGE_SIZE};

/// Vector 0 (divide-by-zero) and any handler requiring a guaranteed-good
/// stack run on IST1.
pub const IST1_INDEX: u16 = 0;

static TSS: OnceCell<TaskStateSegment> = OnceCell::uninit();
static GDT: OnceCell<(GlobalDescriptorTable, Selectors)> = OnceCell::uninit();
static TSS_PTR: AtomicPtr<TaskStateSegment> = AtomicPtr::new(core::ptr::null_mut());

struct Selectors {
    code_selector: SegmentSelector,
    data_selector: SegmentSelector,
    tss_selector: SegmentSelector,
}

/// Builds the two-page IST1 stack, the TSS, and the five-entry GDT (null,
/// code, data, and the two-slot TSS descriptor), then loads GDTR/TR.
pub fn init() -> KernelResult<()> {
    use x86_64::instructions::segmentation::{Segment, CS, DS};
    use x86_64::instructions::tables::load_tss;

    let ist1_base = frame_allocator::alloc_pages(2)?;
    let ist1_top = VirtAddr::new(ist1_base + 2 * PAGE_SIZE);

    TSS.init_once(|| {
        let mut tss = TaskStateSegment::new();
        tss.interrupt_stack_table[IST1_INDEX as usize] = ist1_top;
        tss.iomap_base = core::mem::size_of::<TaskStateSegment>() as u16;
        tss
    });

    let tss_ref = TSS.get().unwrap();
    TSS_PTR.store(tss_ref as *const _ as *mut _, Ordering::Release);
    log::debug!("TSS located at {:p}, IST1 top {:#x}", tss_ref, ist1_top.as_u64());

    GDT.init_once(|| {
        let mut gdt = GlobalDescriptorTable::new();
        let code_selector = gdt.append(Descriptor::kernel_code_segment());
        let data_selector = gdt.append(Descriptor::kernel_data_segment());
        let tss_selector = gdt.append(Descriptor::tss_segment(TSS.get().unwrap()));
        (gdt, Selectors { code_selector, data_selector, tss_selector })
    });

    let (gdt, selectors) = GDT.get().unwrap();
    gdt.load();
    unsafe {
        CS::set_reg(selectors.code_selector);
        DS::set_reg(selectors.data_selector);
        load_tss(selectors.tss_selector);
    }

    log::info!(
        "GDT initialized: code={:#x} data={:#x} tss={:#x}",
        selectors.code_selector.0, selectors.data_selector.0, selectors.tss_selector.0
    );

    Ok(())
}
