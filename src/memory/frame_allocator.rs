//! Physical page allocator and reservation ledger.
//!
//! The allocator ingests the firmware memory map, keeps a small pool of
//! conventional regions, and tracks outstanding allocations in a ledger of
//! page reservations seeded inside the first sufficiently large region.

use conquer_once::spin::OnceCell;
use spin::Mutex;

use crate::error::{KernelError, KernelResult};
use crate::memory::{MemoryKind, MemoryMapEntry, PAGE_SIZE};

const MAX_MEM_ENTRIES: usize = 32;
const MAX_PAGE_RES: usize = 1000;
/// Pages reserved for the ledger itself; ledger entry 0 describes them.
const LEDGER_PAGES: u64 = 8;

#[derive(Debug, Clone, Copy)]
struct PoolEntry {
    physical_base: u64,
    page_count: u64,
}

#[derive(Debug, Clone, Copy)]
struct PageRes {
    region_index: usize,
    physical_base: u64,
    page_count: u64,
    available: bool,
}

struct FrameAllocator {
    pool: [PoolEntry; MAX_MEM_ENTRIES],
    pool_count: usize,
    ledger: *mut PageRes,
}

// The ledger lives in ordinary (identity-mapped) physical RAM and is only
// ever touched while `STATE`'s mutex is held.
unsafe impl Send for FrameAllocator {}

static STATE: OnceCell<Mutex<FrameAllocator>> = OnceCell::uninit();

impl FrameAllocator {
    fn ledger_slice(&self) -> &[PageRes] {
        unsafe { core::slice::from_raw_parts(self.ledger, MAX_PAGE_RES) }
    }

    fn ledger_slice_mut(&mut self) -> &mut [PageRes] {
        unsafe { core::slice::from_raw_parts_mut(self.ledger, MAX_PAGE_RES) }
    }

    fn alloc_pages(&mut self, n: u64) -> KernelResult<u64> {
        for region_index in 0..self.pool_count {
            let region = self.pool[region_index];
            if region.page_count < n {
                continue;
            }

            let mut req_start = region.physical_base;
            let mut req_end = req_start + n * PAGE_SIZE - 1;

            for entry in self.ledger_slice() {
                if entry.region_index != region_index || entry.available {
                    continue;
                }
                let res_start = entry.physical_base;
                let res_end = res_start + entry.page_count * PAGE_SIZE - 1;

                let overlaps = (req_start >= res_start && req_start <= res_end)
                    || (res_start >= req_start && res_start <= req_end);
                if overlaps {
                    req_start = res_end + 1;
                    req_end = req_start + n * PAGE_SIZE - 1;
                }
            }

            let region_end = region.physical_base + region.page_count * PAGE_SIZE - 1;
            if req_end > region_end {
                continue;
            }

            for entry in self.ledger_slice_mut() {
                if entry.available {
                    *entry = PageRes {
                        region_index,
                        physical_base: req_start,
                        page_count: n,
                        available: false,
                    };
                    return Ok(req_start);
                }
            }

            log::warn!("page ledger is full; cannot record a new reservation");
            return Err(KernelError::OutOfMemory);
        }

        log::warn!("no conventional region can satisfy a {n}-page allocation");
        Err(KernelError::OutOfMemory)
    }

    fn free_pages(&mut self, addr: u64) {
        for (i, entry) in self.ledger_slice_mut().iter_mut().enumerate() {
            if i == 0 {
                continue; // the root reservation is never freed
            }
            if !entry.available && entry.physical_base == addr {
                entry.available = true;
                return;
            }
        }
    }
}

/// Builds the RAM pool from the firmware memory map and seeds the page
/// ledger inside the first region with at least `LEDGER_PAGES` pages.
pub fn init(mmap: &[MemoryMapEntry]) -> KernelResult<()> {
    let mut pool = [PoolEntry { physical_base: 0, page_count: 0 }; MAX_MEM_ENTRIES];
    let mut pool_count = 0;

    for entry in mmap {
        if entry.kind != MemoryKind::Conventional {
            continue;
        }
        if pool_count >= MAX_MEM_ENTRIES {
            break;
        }
        pool[pool_count] = PoolEntry {
            physical_base: entry.physical_base,
            page_count: entry.page_count,
        };
        pool_count += 1;
    }

    for (region_index, region) in pool[..pool_count].iter().enumerate() {
        if region.page_count < LEDGER_PAGES {
            continue;
        }

        let ledger_ptr = region.physical_base as *mut PageRes;
        unsafe {
            for slot in 0..MAX_PAGE_RES {
                core::ptr::write(
                    ledger_ptr.add(slot),
                    PageRes {
                        region_index: 0,
                        physical_base: 0,
                        page_count: 0,
                        available: true,
                    },
                );
            }
            core::ptr::write(
                ledger_ptr,
                PageRes {
                    region_index,
                    physical_base: region.physical_base,
                    page_count: LEDGER_PAGES,
                    available: false,
                },
            );
        }

        let allocator = FrameAllocator { pool, pool_count, ledger: ledger_ptr };
        STATE
            .try_init_once(|| Mutex::new(allocator))
            .map_err(|_| KernelError::InvalidArgument)?;

        log::info!(
            "physical allocator seeded: {pool_count} region(s), ledger at {:#x}",
            region.physical_base
        );
        return Ok(());
    }

    log::error!("no conventional region is large enough to hold the page ledger");
    Err(KernelError::OutOfMemory)
}

/// Allocates a contiguous run of `n` 4 KiB pages and returns its base
/// physical address.
pub fn alloc_pages(n: u64) -> KernelResult<u64> {
    let state = STATE.get().expect("frame allocator not initialized");
    state.lock().alloc_pages(n)
}

/// Releases a run previously returned by [`alloc_pages`]. Unknown
/// addresses are ignored; a double free is a no-op by design.
pub fn free_pages(addr: u64) {
    let state = STATE.get().expect("frame allocator not initialized");
    state.lock().free_pages(addr);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(base: u64, pages: u64) -> MemoryMapEntry {
        MemoryMapEntry { kind: MemoryKind::Conventional, physical_base: base, page_count: pages }
    }

    // The hosted tests build a throwaway allocator instance directly
    // rather than going through the process-global `STATE`, so many tests
    // can run independently without sharing ledger state.
    fn fresh(mmap: &[MemoryMapEntry], ledger_storage: *mut PageRes) -> FrameAllocator {
        let mut pool = [PoolEntry { physical_base: 0, page_count: 0 }; MAX_MEM_ENTRIES];
        let mut pool_count = 0;
        for entry in mmap {
            pool[pool_count] = PoolEntry {
                physical_base: entry.physical_base,
                page_count: entry.page_count,
            };
            pool_count += 1;
        }
        unsafe {
            for slot in 0..MAX_PAGE_RES {
                core::ptr::write(
                    ledger_storage.add(slot),
                    PageRes { region_index: 0, physical_base: 0, page_count: 0, available: true },
                );
            }
            core::ptr::write(
                ledger_storage,
                PageRes {
                    region_index: 0,
                    physical_base: pool[0].physical_base,
                    page_count: LEDGER_PAGES,
                    available: false,
                },
            );
        }
        FrameAllocator { pool, pool_count, ledger: ledger_storage }
    }

    #[test]
    fn alloc_free_alloc_disjoint() {
        let mut ledger = [PageRes { region_index: 0, physical_base: 0, page_count: 0, available: true }; MAX_PAGE_RES];
        let mut a = fresh(&[region(0x100000, 64)], ledger.as_mut_ptr());

        let p1 = a.alloc_pages(8).unwrap();
        let p2 = a.alloc_pages(4).unwrap();
        assert_ne!(p1, p2);
        a.free_pages(p1);
        let p3 = a.alloc_pages(12).unwrap();
        assert_eq!(p3 % PAGE_SIZE, 0);
        assert_ne!(p3, p2);
    }

    #[test]
    fn exhausts_region() {
        let mut ledger = [PageRes { region_index: 0, physical_base: 0, page_count: 0, available: true }; MAX_PAGE_RES];
        let mut a = fresh(&[region(0x100000, 16)], ledger.as_mut_ptr());

        // 8 pages for the ledger root are already reserved, 16 total.
        assert!(a.alloc_pages(8).is_ok());
        assert_eq!(a.alloc_pages(1), Err(KernelError::OutOfMemory));
    }

    #[test]
    fn free_of_unknown_address_is_noop() {
        let mut ledger = [PageRes { region_index: 0, physical_base: 0, page_count: 0, available: true }; MAX_PAGE_RES];
        let mut a = fresh(&[region(0x100000, 64)], ledger.as_mut_ptr());
        a.free_pages(0xdead_0000);
        assert!(a.alloc_pages(8).is_ok());
    }

    #[test]
    fn deterministic_given_same_calls() {
        let mut l1 = [PageRes { region_index: 0, physical_base: 0, page_count: 0, available: true }; MAX_PAGE_RES];
        let mut l2 = l1;
        let mut a1 = fresh(&[region(0x100000, 64)], l1.as_mut_ptr());
        let mut a2 = fresh(&[region(0x100000, 64)], l2.as_mut_ptr());

        let seq1: [u64; 2] = [a1.alloc_pages(4).unwrap(), a1.alloc_pages(2).unwrap()];
        let seq2: [u64; 2] = [a2.alloc_pages(4).unwrap(), a2.alloc_pages(2).unwrap()];
        assert_eq!(seq1, seq2);
    }
}
