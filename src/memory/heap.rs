//! Byte-granularity heap: a singly-linked freelist of [`HeapHeader`]s over
//! a 128 KiB run obtained from the physical allocator, exposed as the
//! crate's `#[global_allocator]`.

use core::alloc::{GlobalAlloc, Layout};
use core::mem::size_of;
use core::ptr::NonNull;

use spin::Mutex;

use crate::error::{KernelError, KernelResult};
use crate::memory::{frame_allocator, PAGE_SIZE};

/// Describes one region of the heap span: `next` is `None` for the last
/// header in the list, and when set, `addr(next) == addr(self) +
/// size_of::<HeapHeader>() + self.size_bytes`.
#[repr(C)]
struct HeapHeader {
    next: Option<NonNull<HeapHeader>>,
    size_bytes: usize,
    available: bool,
}

struct Heap {
    base: *mut HeapHeader,
}

// The heap's internal pointers only ever move under `LOCK`.
unsafe impl Send for Heap {}

static LOCK: Mutex<Option<Heap>> = Mutex::new(None);

fn header_at(addr: *mut HeapHeader) -> &'static mut HeapHeader {
    unsafe { &mut *addr }
}

/// Allocates `heap_pages` pages from the physical allocator and lays down
/// the initial single free header spanning the whole run.
pub fn init(heap_pages: u64) -> KernelResult<()> {
    let base_addr = frame_allocator::alloc_pages(heap_pages)?;
    let base = base_addr as *mut HeapHeader;
    let span_bytes = heap_pages * PAGE_SIZE;

    let header = header_at(base);
    header.next = None;
    header.size_bytes = span_bytes as usize - size_of::<HeapHeader>();
    header.available = true;

    *LOCK.lock() = Some(Heap { base });
    log::info!("kernel heap initialized: {span_bytes} bytes at {:#x}", base_addr);
    Ok(())
}

fn data_ptr(header: *mut HeapHeader) -> *mut u8 {
    unsafe { (header as *mut u8).add(size_of::<HeapHeader>()) }
}

fn alloc_inner(n: usize) -> KernelResult<*mut u8> {
    let mut guard = LOCK.lock();
    let heap = guard.as_mut().expect("heap not initialized");

    let mut cursor = heap.base;
    loop {
        let h = header_at(cursor);
        if h.available && h.size_bytes >= n {
            break;
        }
        match h.next {
            Some(next) => cursor = next.as_ptr(),
            None => return Err(KernelError::OutOfMemory),
        }
    }

    let h = header_at(cursor);
    let region_end = data_ptr(cursor) as usize + h.size_bytes;

    if h.size_bytes >= n + size_of::<HeapHeader>() + 1 {
        let new_header_addr = (data_ptr(cursor) as usize + n) as *mut HeapHeader;
        let new_header = header_at(new_header_addr);
        new_header.next = h.next;
        new_header.size_bytes = region_end - (new_header_addr as usize + size_of::<HeapHeader>());
        new_header.available = true;

        let h = header_at(cursor);
        h.size_bytes = n;
        h.next = NonNull::new(new_header_addr);
    }

    let h = header_at(cursor);
    h.available = false;

    Ok(data_ptr(cursor))
}

fn free_inner(ptr: *mut u8) {
    let mut guard = LOCK.lock();
    let _heap = guard.as_mut().expect("heap not initialized");

    let header_addr = unsafe { ptr.sub(size_of::<HeapHeader>()) } as *mut HeapHeader;
    header_at(header_addr).available = true;
}

pub struct KernelHeap;

unsafe impl GlobalAlloc for KernelHeap {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        match alloc_inner(layout.size().max(1)) {
            Ok(p) => p,
            Err(_) => core::ptr::null_mut(),
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        free_inner(ptr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The hosted tests build the heap over a plain byte array instead of
    // physical pages, since the frame allocator isn't initialized here.
    fn heap_over(buf: &mut [u8]) -> Heap {
        let base = buf.as_mut_ptr() as *mut HeapHeader;
        let header = header_at(base);
        header.next = None;
        header.size_bytes = buf.len() - size_of::<HeapHeader>();
        header.available = true;
        Heap { base }
    }

    fn test_alloc(heap: &Heap, n: usize) -> KernelResult<*mut u8> {
        let mut cursor = heap.base;
        loop {
            let h = header_at(cursor);
            if h.available && h.size_bytes >= n {
                break;
            }
            match h.next {
                Some(next) => cursor = next.as_ptr(),
                None => return Err(KernelError::OutOfMemory),
            }
        }
        let h = header_at(cursor);
        let region_end = data_ptr(cursor) as usize + h.size_bytes;
        if h.size_bytes >= n + size_of::<HeapHeader>() + 1 {
            let new_header_addr = (data_ptr(cursor) as usize + n) as *mut HeapHeader;
            let new_header = header_at(new_header_addr);
            new_header.next = h.next;
            new_header.size_bytes = region_end - (new_header_addr as usize + size_of::<HeapHeader>());
            new_header.available = true;
            let h = header_at(cursor);
            h.size_bytes = n;
            h.next = NonNull::new(new_header_addr);
        }
        let h = header_at(cursor);
        h.available = false;
        Ok(data_ptr(cursor))
    }

    fn test_free(ptr: *mut u8) {
        let header_addr = unsafe { ptr.sub(size_of::<HeapHeader>()) } as *mut HeapHeader;
        header_at(header_addr).available = true;
    }

    #[test]
    fn split_sums_to_span() {
        let mut buf = [0u8; 4096];
        let span = buf.len();
        let heap = heap_over(&mut buf);

        let _p1 = test_alloc(&heap, 64).unwrap();
        let _p2 = test_alloc(&heap, 128).unwrap();

        let mut total_headers = 0usize;
        let mut total_payload = 0usize;
        let mut cursor = heap.base;
        loop {
            let h = header_at(cursor);
            total_headers += size_of::<HeapHeader>();
            total_payload += h.size_bytes;
            match h.next {
                Some(next) => cursor = next.as_ptr(),
                None => break,
            }
        }
        assert_eq!(total_headers + total_payload, span);
    }

    #[test]
    fn free_then_alloc_round_trips() {
        let mut buf = [0u8; 4096];
        let heap = heap_over(&mut buf);

        let p1 = test_alloc(&heap, 256).unwrap();
        test_free(p1);
        let p2 = test_alloc(&heap, 256).unwrap();
        assert_eq!(p1, p2);
    }

    #[test]
    fn exhausting_the_span_fails() {
        let mut buf = [0u8; 256];
        let heap = heap_over(&mut buf);
        assert!(test_alloc(&heap, 4096).is_err());
    }
}
