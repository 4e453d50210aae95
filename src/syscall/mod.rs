//! System call dispatch table.
//!
//! A single software interrupt (vector [`crate::interrupts::SYSCALL_VECTOR`])
//! carries `(id, d1, d2, d3, d4)` in `rax`/`rdi`/`rsi`/`rdx`/`rcx`. Only
//! `STOP`, `SLEEP_SYNC`, and `SLEEP_TICK` context-switch; `WRITE`/`READ`
//! return a byte count in `rax` on the same frame.

use crate::interrupts::RegisterFrame;
use crate::io::StreamKind;
use crate::task::{self, SyncKind};

pub const SYS_START: u64 = 1;
pub const SYS_STOP: u64 = 2;
pub const SYS_SLEEP_SYNC: u64 = 3;
pub const SYS_SLEEP_TICK: u64 = 4;
pub const SYS_WRITE: u64 = 5;
pub const SYS_READ: u64 = 6;

/// Dispatches a syscall trapped via `syscall_entry`. Returns the frame
/// pointer execution should resume into: the same frame for non-blocking
/// IDs, or whatever [`task::switch`] selects for the blocking ones.
pub fn dispatch(frame: *mut RegisterFrame) -> *mut RegisterFrame {
    let f = unsafe { &mut *frame };
    let id = f.rax;

    match id {
        SYS_START => frame,

        SYS_STOP => task::stop(frame),

        SYS_SLEEP_SYNC => {
            let kind = match f.rsi {
                1 => SyncKind::Lock,
                2 => SyncKind::Semaphore,
                _ => SyncKind::None,
            };
            let value = f.rdx as *const i64;
            task::sleep_sync(frame, kind, value)
        }

        SYS_SLEEP_TICK => {
            let deadline = f.rsi;
            task::sleep_ticks(frame, deadline)
        }

        SYS_WRITE => {
            let kind = StreamKind::from_raw(f.rdi);
            let src = f.rsi as *const u8;
            let n = f.rdx as usize;
            f.rax = crate::io::write(kind, unsafe { core::slice::from_raw_parts(src, n) }) as u64;
            frame
        }

        SYS_READ => {
            let kind = StreamKind::from_raw(f.rdi);
            let dst = f.rsi as *mut u8;
            let n = f.rdx as usize;
            f.rax = crate::io::read(kind, unsafe { core::slice::from_raw_parts_mut(dst, n) }) as u64;
            frame
        }

        other => {
            log::warn!("syscall id {other} not recognized");
            f.rax = u64::MAX;
            frame
        }
    }
}
