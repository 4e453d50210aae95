//! Mutex locks and counting semaphores, backed by a small pool of 64-bit
//! words and tied into task sleep for the blocking case.

use core::sync::atomic::{AtomicI64, Ordering};

use spin::Mutex;

use crate::error::{KernelError, KernelResult};
use crate::memory::{frame_allocator, PAGE_SIZE};

/// Traps into the SLEEP_SYNC syscall, blocking until the kernel's wake
/// predicate for `kind` observes `value` and resumes this task.
fn trap_sleep_sync(kind_code: u64, value: *const i64) {
    unsafe {
        core::arch::asm!(
            "int 0x40",
            in("rax") crate::syscall::SYS_SLEEP_SYNC,
            in("rsi") kind_code,
            in("rdx") value as u64,
            out("rcx") _,
            out("r11") _,
        );
    }
}

const MAX_WORDS: usize = (PAGE_SIZE as usize) / core::mem::size_of::<i64>();

struct Pool {
    base: *mut AtomicI64,
    bitmap: [u64; MAX_WORDS / 64],
}

unsafe impl Send for Pool {}

static POOL: Mutex<Option<Pool>> = Mutex::new(None);

/// Allocates the 4 KiB word pool backing up to 512 locks/semaphores.
pub fn init() -> KernelResult<()> {
    let base = frame_allocator::alloc_pages(1)? as *mut AtomicI64;
    *POOL.lock() = Some(Pool { base, bitmap: [0; MAX_WORDS / 64] });
    log::info!("sync pool initialized: {MAX_WORDS} words");
    Ok(())
}

fn word_at(base: *mut AtomicI64, slot: usize) -> &'static AtomicI64 {
    unsafe { &*base.add(slot) }
}

fn alloc_slot() -> KernelResult<usize> {
    let mut pool = POOL.lock();
    let pool = pool.as_mut().expect("sync pool not initialized");

    for bit in 0..MAX_WORDS {
        let (word, b) = (bit / 64, bit % 64);
        if pool.bitmap[word] & (1 << b) == 0 {
            pool.bitmap[word] |= 1 << b;
            word_at(pool.base, bit).store(0, Ordering::Relaxed);
            return Ok(bit);
        }
    }
    Err(KernelError::OutOfMemory)
}

fn free_slot(slot: usize) {
    let mut pool = POOL.lock();
    let pool = pool.as_mut().expect("sync pool not initialized");
    let (word, b) = (slot / 64, slot % 64);
    pool.bitmap[word] &= !(1 << b);
}

fn slot_ptr(slot: usize) -> *const i64 {
    let pool = POOL.lock();
    let pool = pool.as_ref().expect("sync pool not initialized");
    word_at(pool.base, slot) as *const AtomicI64 as *const i64
}

/// A binary lock: 0 is free, 1 is held.
pub struct Lock {
    slot: usize,
}

impl Lock {
    pub fn create() -> KernelResult<Lock> {
        Ok(Lock { slot: alloc_slot()? })
    }

    fn word(&self) -> &AtomicI64 {
        let pool = POOL.lock();
        let pool = pool.as_ref().expect("sync pool not initialized");
        word_at(pool.base, self.slot)
    }

    /// Acquires the lock. When `spin` is true, busy-waits; otherwise
    /// transitions the calling task to SLEEPING keyed to this lock's word
    /// until the scheduler observes it free.
    pub fn acquire(&self, spin: bool) {
        loop {
            if self
                .word()
                .compare_exchange_weak(0, 1, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return;
            }
            if spin {
                core::hint::spin_loop();
            } else {
                trap_sleep_sync(1, self.sync_value_ptr());
            }
        }
    }

    pub fn release(&self) {
        self.word().store(0, Ordering::Release);
    }

    pub fn sync_value_ptr(&self) -> *const i64 {
        slot_ptr(self.slot)
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        free_slot(self.slot);
    }
}

/// A counting semaphore: positive values indicate available permits.
pub struct Semaphore {
    slot: usize,
}

impl Semaphore {
    pub fn create(initial: i64) -> KernelResult<Semaphore> {
        let slot = alloc_slot()?;
        let sem = Semaphore { slot };
        sem.word().store(initial, Ordering::Relaxed);
        Ok(sem)
    }

    fn word(&self) -> &AtomicI64 {
        let pool = POOL.lock();
        let pool = pool.as_ref().expect("sync pool not initialized");
        word_at(pool.base, self.slot)
    }

    /// Attempts to take one permit. Returns true if a permit was taken;
    /// false means the caller should spin or sleep (per `spin`) and retry.
    pub fn try_wait(&self) -> bool {
        let mut cur = self.word().load(Ordering::Acquire);
        loop {
            if cur <= 0 {
                return false;
            }
            match self.word().compare_exchange_weak(
                cur,
                cur - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => cur = observed,
            }
        }
    }

    pub fn wait(&self, spin: bool) {
        loop {
            if self.try_wait() {
                return;
            }
            if spin {
                core::hint::spin_loop();
            } else {
                trap_sleep_sync(2, self.sync_value_ptr());
            }
        }
    }

    pub fn signal(&self) {
        self.word().fetch_add(1, Ordering::AcqRel);
    }

    pub fn sync_value_ptr(&self) -> *const i64 {
        slot_ptr(self.slot)
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        free_slot(self.slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_bit_ops_are_consistent() {
        let word = AtomicI64::new(0);
        assert!(word
            .compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed)
            .is_ok());
        assert!(word
            .compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed)
            .is_err());
        word.store(0, Ordering::Release);
        assert!(word
            .compare_exchange(0, 1, Ordering::Acquire, Ordering::Relaxed)
            .is_ok());
    }

    #[test]
    fn semaphore_wait_signal_balance() {
        let word = AtomicI64::new(0);
        let try_wait = |w: &AtomicI64| -> bool {
            let mut cur = w.load(Ordering::Acquire);
            loop {
                if cur <= 0 {
                    return false;
                }
                match w.compare_exchange_weak(cur, cur - 1, Ordering::AcqRel, Ordering::Acquire) {
                    Ok(_) => return true,
                    Err(o) => cur = o,
                }
            }
        };
        assert!(!try_wait(&word));
        word.fetch_add(3, Ordering::AcqRel);
        assert!(try_wait(&word));
        assert!(try_wait(&word));
        assert!(try_wait(&word));
        assert!(!try_wait(&word));
    }
}
