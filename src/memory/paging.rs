//! Paging bootstrap: one PML4 pointing at one PDPT of 512 1 GiB pages,
//! identity-mapping the first 512 GiB of physical memory, plus a small
//! ledger for handing out MMIO virtual windows within that range.

use conquer_once::spin::OnceCell;
use spin::Mutex;
use x86_64::registers::control::{Cr3, Cr3Flags, Cr4, Cr4Flags};
use x86_64::structures::paging::page_table::{PageTable, PageTableFlags};
use x86_64::structures::paging::PhysFrame;
use x86_64::PhysAddr;

use crate::error::{KernelError, KernelResult};
use crate::memory::frame_allocator;

const GIB: u64 = 1 << 30;
const IDENTITY_WINDOW_BYTES: u64 = 512 * GIB;
const MAX_MAP_ENTRIES: usize = 64;

#[derive(Debug, Clone, Copy)]
struct MapEntry {
    physical_start: u64,
    physical_end: u64,
    virtual_start: u64,
}

struct PagingState {
    map_ledger: [Option<MapEntry>; MAX_MAP_ENTRIES],
}

static STATE: OnceCell<Mutex<PagingState>> = OnceCell::uninit();

/// Allocates the PML4 and a single PDPT, wires the PDPT's 512 entries to
/// 1 GiB huge pages covering physical 0..512GiB, and loads CR3.
pub fn init() -> KernelResult<()> {
    let pml4_addr = frame_allocator::alloc_pages(1)?;
    let pdpt_addr = frame_allocator::alloc_pages(1)?;

    let pml4 = unsafe { &mut *(pml4_addr as *mut PageTable) };
    let pdpt = unsafe { &mut *(pdpt_addr as *mut PageTable) };

    pml4.zero();
    pdpt.zero();

    for i in 0..512u64 {
        pdpt[i as usize].set_addr(
            PhysAddr::new(i * GIB),
            PageTableFlags::PRESENT | PageTableFlags::WRITABLE | PageTableFlags::HUGE_PAGE,
        );
    }

    pml4[0].set_addr(
        PhysAddr::new(pdpt_addr),
        PageTableFlags::PRESENT | PageTableFlags::WRITABLE,
    );

    let frame = PhysFrame::containing_address(PhysAddr::new(pml4_addr));
    unsafe {
        Cr3::write(frame, Cr3Flags::empty());
        Cr4::update(|flags| flags.insert(Cr4Flags::PAGE_GLOBAL));
    }

    STATE
        .try_init_once(|| Mutex::new(PagingState { map_ledger: [None; MAX_MAP_ENTRIES] }))
        .map_err(|_| KernelError::InvalidArgument)?;

    log::info!("paging initialized: PML4={:#x} PDPT={:#x}", pml4_addr, pdpt_addr);
    Ok(())
}

/// Returns a kernel-visible virtual address for `[phys_lo, phys_hi)`.
/// Within the 512 GiB identity window, virtual == physical; a
/// [`MapEntry`] is still recorded so the window can be enumerated later.
pub fn map_range(phys_lo: u64, phys_hi: u64) -> KernelResult<u64> {
    if phys_hi > IDENTITY_WINDOW_BYTES {
        log::warn!("map_range({phys_lo:#x}, {phys_hi:#x}) exceeds the 512 GiB identity window");
        return Err(KernelError::OutOfAddressSpace);
    }

    let state = STATE.get().expect("paging not initialized");
    let mut state = state.lock();

    let slot = state
        .map_ledger
        .iter_mut()
        .find(|e| e.is_none())
        .ok_or(KernelError::OutOfMemory)?;

    *slot = Some(MapEntry { physical_start: phys_lo, physical_end: phys_hi, virtual_start: phys_lo });
    Ok(phys_lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_window_boundary() {
        assert!(IDENTITY_WINDOW_BYTES == 512 * GIB);
    }
}
