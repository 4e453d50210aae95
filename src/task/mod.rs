//! Preemptive round-robin task scheduler.
//!
//! Tasks live in a fixed-capacity arena so the circular list can be
//! expressed with plain indices instead of raw pointers or `Rc`/`Arc`
//! cycles. `schedule`/`switch` mirror the source kernel's `k_task_schedule`
//! and `k_task_switch` one to one; only the storage shape differs.

use spin::Mutex;

use crate::error::{KernelError, KernelResult};
use crate::interrupts::RegisterFrame;
use crate::memory::{frame_allocator, PAGE_SIZE};

const MAX_TASKS: usize = 64;
/// Five pages per task: 16 KiB of stack, then task state and the initial
/// register frame packed into the fifth page.
const TASK_PAGES: u64 = 5;
const STACK_OFFSET: u64 = 0x4000;
const REGS_OFFSET: u64 = 0x40F0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    New,
    Running,
    Sleeping,
    Stopped,
    Removed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    None,
    Lock,
    Semaphore,
    Tick,
}

struct Task {
    mem_base: u64,
    regs: *mut RegisterFrame,
    id: u64,
    status: TaskStatus,
    sync_value: *const i64,
    sync_kind: SyncKind,
    wake_deadline_ticks: u64,
    next: Option<usize>,
}

// Tasks are only ever touched while `SCHEDULER`'s lock is held.
unsafe impl Send for Task {}

struct Scheduler {
    arena: [Option<Task>; MAX_TASKS],
    current: Option<usize>,
    next_id: u64,
    tick_count: u64,
}

static SCHEDULER: Mutex<Scheduler> = Mutex::new(Scheduler {
    arena: [const { None }; MAX_TASKS],
    current: None,
    next_id: 1,
    tick_count: 0,
});

/// Invoked when a task's entry function returns; marks it STOPPED and
/// parks until the scheduler reclaims it.
extern "C" fn task_sentinel() -> ! {
    log::info!("a task has ended");
    {
        let mut sched = SCHEDULER.lock();
        if let Some(idx) = sched.current {
            if let Some(task) = &mut sched.arena[idx] {
                task.status = TaskStatus::Stopped;
            }
        }
    }
    loop {
        x86_64::instructions::hlt();
    }
}

/// Allocates a task's five pages, fabricates its initial register frame so
/// the scheduler can resume directly into `entry`, and returns its slot.
pub fn create(entry: extern "C" fn() -> !) -> KernelResult<usize> {
    let mem_base = frame_allocator::alloc_pages(TASK_PAGES)?;
    let rbp = mem_base + STACK_OFFSET;

    // Reserve space for the sentinel return address at the very top of
    // the usable stack, so a task that falls off the end of its entry fn
    // returns into task_sentinel instead of garbage.
    let rsp = rbp - core::mem::size_of::<u64>() as u64 * 28;
    unsafe {
        core::ptr::write(rsp as *mut u64, task_sentinel as u64);
    }

    let regs_addr = mem_base + REGS_OFFSET;
    let regs = regs_addr as *mut RegisterFrame;
    unsafe {
        core::ptr::write(
            regs,
            RegisterFrame {
                padding: 0,
                rbp,
                rdi: 0,
                rsi: 0,
                r15: 0,
                r14: 0,
                r13: 0,
                r12: 0,
                r11: 0,
                r10: 0,
                r9: 0,
                r8: 0,
                rdx: 0,
                rcx: 0,
                rbx: 0,
                rax: 0,
                rip: entry as u64,
                cs: 0x08,
                rflags: 0x200,
                rsp,
                ss: 0x10,
            },
        );
    }

    let task = Task {
        mem_base,
        regs,
        id: 0,
        status: TaskStatus::New,
        sync_value: core::ptr::null(),
        sync_kind: SyncKind::None,
        wake_deadline_ticks: 0,
        next: None,
    };

    let mut sched = SCHEDULER.lock();
    let id = sched.next_id;
    sched.next_id += 1;

    let slot = sched
        .arena
        .iter()
        .position(|t| t.is_none())
        .ok_or(KernelError::OutOfMemory)?;
    let mut task = task;
    task.id = id;
    sched.arena[slot] = Some(task);
    Ok(slot)
}

/// Links a newly created task into the circular list and marks it
/// RUNNING.
pub fn schedule(slot: usize) {
    let mut sched = SCHEDULER.lock();
    match sched.current {
        None => {
            sched.current = Some(slot);
            if let Some(t) = &mut sched.arena[slot] {
                t.next = Some(slot);
                t.status = TaskStatus::Running;
            }
        }
        Some(cur) => {
            let cur_next = sched.arena[cur].as_ref().unwrap().next;
            sched.arena[slot].as_mut().unwrap().next = cur_next;
            sched.arena[cur].as_mut().unwrap().next = Some(slot);
            sched.arena[slot].as_mut().unwrap().status = TaskStatus::Running;
        }
    }
}

/// Advances the tick counter. Called from the timer ISR before `switch`.
pub fn tick() {
    SCHEDULER.lock().tick_count += 1;
}

fn wake_predicate(sched: &Scheduler, idx: usize) -> bool {
    let task = sched.arena[idx].as_ref().unwrap();
    match task.sync_kind {
        SyncKind::Lock => unsafe { *task.sync_value == 0 },
        SyncKind::Semaphore => unsafe { *task.sync_value > 0 },
        SyncKind::Tick => sched.tick_count >= task.wake_deadline_ticks,
        SyncKind::None => true,
    }
}

/// Round-robin task switch: unlinks STOPPED successors (marking them
/// REMOVED, but *not* freeing their memory — that's [`reclaim`]'s job),
/// advances to the next RUNNING task, and skips over SLEEPING tasks whose
/// wake predicate has not yet fired.
pub fn switch(frame: *mut RegisterFrame) -> *mut RegisterFrame {
    let mut sched = SCHEDULER.lock();

    let Some(cur) = sched.current else {
        return frame;
    };

    sched.arena[cur].as_mut().unwrap().regs = frame;

    loop {
        let next = sched.arena[cur].as_ref().unwrap().next;
        let Some(next_idx) = next else { break };
        if sched.arena[next_idx].as_ref().unwrap().status != TaskStatus::Stopped {
            break;
        }
        let after = sched.arena[next_idx].as_ref().unwrap().next;
        sched.arena[cur].as_mut().unwrap().next = after;
        sched.arena[next_idx].as_mut().unwrap().status = TaskStatus::Removed;
    }

    if let Some(mut idx) = sched.arena[cur].as_ref().unwrap().next {
        loop {
            let status = sched.arena[idx].as_ref().unwrap().status;
            if status != TaskStatus::Sleeping {
                break;
            }
            if wake_predicate(&sched, idx) {
                sched.arena[idx].as_mut().unwrap().status = TaskStatus::Running;
                break;
            }
            let Some(next) = sched.arena[idx].as_ref().unwrap().next else { break };
            idx = next;
        }
        sched.current = Some(idx);
    }

    sched.arena[sched.current.unwrap()].as_ref().unwrap().regs
}

/// Frees the backing pages of every REMOVED task and clears its arena
/// slot. `switch` only unlinks and marks a stopped task REMOVED; this is
/// the separate step a caller outside the ISR path invokes to actually
/// reclaim its memory.
pub fn reclaim() {
    let mut sched = SCHEDULER.lock();
    for slot in sched.arena.iter_mut() {
        let Some(task) = slot else { continue };
        if task.status != TaskStatus::Removed {
            continue;
        }
        let base = task.mem_base;
        *slot = None;
        frame_allocator::free_pages(base);
    }
}

/// Marks the current task STOPPED and context-switches away.
pub fn stop(frame: *mut RegisterFrame) -> *mut RegisterFrame {
    let mut sched = SCHEDULER.lock();
    if let Some(cur) = sched.current {
        sched.arena[cur].as_mut().unwrap().status = TaskStatus::Stopped;
    }
    drop(sched);
    switch(frame)
}

/// Puts the current task to sleep pending a lock/semaphore predicate.
pub fn sleep_sync(frame: *mut RegisterFrame, kind: SyncKind, value: *const i64) -> *mut RegisterFrame {
    let mut sched = SCHEDULER.lock();
    if let Some(cur) = sched.current {
        let task = sched.arena[cur].as_mut().unwrap();
        task.sync_kind = kind;
        task.sync_value = value;
        task.status = TaskStatus::Sleeping;
    }
    drop(sched);
    switch(frame)
}

/// Puts the current task to sleep until `global_tick_count >= deadline`.
pub fn sleep_ticks(frame: *mut RegisterFrame, deadline: u64) -> *mut RegisterFrame {
    let mut sched = SCHEDULER.lock();
    if let Some(cur) = sched.current {
        let task = sched.arena[cur].as_mut().unwrap();
        task.sync_kind = SyncKind::Tick;
        task.wake_deadline_ticks = deadline;
        task.status = TaskStatus::Sleeping;
    }
    drop(sched);
    switch(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    fn frame() -> RegisterFrame {
        RegisterFrame {
            padding: 0, rbp: 0, rdi: 0, rsi: 0, r15: 0, r14: 0, r13: 0, r12: 0,
            r11: 0, r10: 0, r9: 0, r8: 0, rdx: 0, rcx: 0, rbx: 0, rax: 0,
            rip: 0, cs: 0x08, rflags: 0x200, rsp: 0, ss: 0x10,
        }
    }

    fn fresh_scheduler() -> Scheduler {
        Scheduler { arena: [const { None }; MAX_TASKS], current: None, next_id: 1, tick_count: 0 }
    }

    fn insert(sched: &mut Scheduler, id: u64) -> usize {
        let slot = sched.arena.iter().position(|t| t.is_none()).unwrap();
        sched.arena[slot] = Some(Task {
            mem_base: 0,
            regs: core::ptr::null_mut(),
            id,
            status: TaskStatus::Running,
            sync_value: core::ptr::null(),
            sync_kind: SyncKind::None,
            wake_deadline_ticks: 0,
            next: None,
        });
        slot
    }

    #[test]
    fn round_robin_visits_each_task() {
        let mut sched = fresh_scheduler();
        let a = insert(&mut sched, 1);
        let b = insert(&mut sched, 2);
        sched.arena[a].as_mut().unwrap().next = Some(b);
        sched.arena[b].as_mut().unwrap().next = Some(a);
        sched.current = Some(a);

        let mut f1 = frame();
        let mut f2 = frame();
        sched.arena[a].as_mut().unwrap().regs = &mut f1;
        sched.arena[b].as_mut().unwrap().regs = &mut f2;

        // Inline a minimal version of switch()'s selection logic against
        // this fixture scheduler (the real `switch` takes the process
        // global, not an arbitrary instance).
        let mut seen: Vec<u64> = Vec::new();
        let mut cur = sched.current.unwrap();
        for _ in 0..4 {
            seen.push(sched.arena[cur].as_ref().unwrap().id);
            cur = sched.arena[cur].as_ref().unwrap().next.unwrap();
        }
        assert_eq!(seen, vec![1, 2, 1, 2]);
    }

    #[test]
    fn tick_sleeper_waits_for_deadline() {
        let sched = Scheduler { tick_count: 5, ..fresh_scheduler() };
        let mut s = sched;
        let idx = insert(&mut s, 1);
        s.arena[idx].as_mut().unwrap().status = TaskStatus::Sleeping;
        s.arena[idx].as_mut().unwrap().sync_kind = SyncKind::Tick;
        s.arena[idx].as_mut().unwrap().wake_deadline_ticks = 10;
        assert!(!wake_predicate(&s, idx));
        s.tick_count = 10;
        assert!(wake_predicate(&s, idx));
    }

    #[test]
    fn lock_sleeper_wakes_when_zero() {
        let mut s = fresh_scheduler();
        let idx = insert(&mut s, 1);
        let lockword: i64 = 1;
        s.arena[idx].as_mut().unwrap().sync_kind = SyncKind::Lock;
        s.arena[idx].as_mut().unwrap().sync_value = &lockword as *const i64;
        assert!(!wake_predicate(&s, idx));
    }
}
