//! PS/2 scancode set 1 decoder and the lock-free key-event ring it feeds.

pub mod modifiers;
pub mod scancodes;

use core::sync::atomic::{AtomicUsize, Ordering};

use spin::Mutex;

const EVENT_BUF_SIZE: usize = 1024;
const KEY_STATE_COUNT: usize = 103;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventType {
    Pressed,
    Released,
}

#[derive(Debug, Clone, Copy)]
pub struct KeyEvent {
    pub index: u8,
    pub kind: KeyEventType,
}

struct EventRing {
    buf: [KeyEvent; EVENT_BUF_SIZE],
}

unsafe impl Send for EventRing {}
unsafe impl Sync for EventRing {}

const EMPTY_EVENT: KeyEvent = KeyEvent { index: 0, kind: KeyEventType::Released };

static RING: Mutex<EventRing> = Mutex::new(EventRing { buf: [EMPTY_EVENT; EVENT_BUF_SIZE] });
static WRITER: AtomicUsize = AtomicUsize::new(0);
static READER: AtomicUsize = AtomicUsize::new(0);

static KEY_STATES: Mutex<[bool; KEY_STATE_COUNT]> = Mutex::new([false; KEY_STATE_COUNT]);

/// Pending multi-byte scancode sequence. Single producer (the keyboard
/// IRQ handler), so plain state is fine.
struct Decoder {
    seq: [u8; 6],
    len: usize,
}

static DECODER: Mutex<Decoder> = Mutex::new(Decoder { seq: [0; 6], len: 0 });

fn push_event(e: KeyEvent) {
    let writer = WRITER.load(Ordering::Relaxed);
    let next = (writer + 1) % EVENT_BUF_SIZE;
    if next == READER.load(Ordering::Acquire) {
        return; // ring full; drop rather than overwrite
    }
    RING.lock().buf[writer] = e;
    WRITER.store(next, Ordering::Release);
    KEY_STATES.lock()[e.index as usize] = e.kind == KeyEventType::Pressed;
}

/// Consumes the next queued key event, if any.
pub fn consume_event() -> Option<KeyEvent> {
    let reader = READER.load(Ordering::Relaxed);
    if reader == WRITER.load(Ordering::Acquire) {
        return None;
    }
    let e = RING.lock().buf[reader];
    READER.store((reader + 1) % EVENT_BUF_SIZE, Ordering::Release);
    Some(e)
}

/// Returns whether `index` is currently pressed.
pub fn is_pressed(index: u8) -> bool {
    KEY_STATES.lock()[index as usize]
}

/// Feeds one scancode byte from the IRQ handler into the decoder state
/// machine, resolving single-byte, `0xE0`-prefixed two-byte, four-byte
/// (Print Screen), and six-byte (Pause, no release event) sequences.
pub fn handle_scancode(sc: u8) {
    let mut dec = DECODER.lock();

    if dec.len > 0 {
        dec.seq[dec.len] = sc;
        dec.len += 1;

        if dec.len == 2 && dec.seq[0] == 0xE0 {
            if dec.seq[1] != 0xB7 && dec.seq[1] != 0x2A {
                if let Some(index) = scancodes::two_byte_index(dec.seq[1]) {
                    let kind = if dec.seq[1] < 0x90 { KeyEventType::Pressed } else { KeyEventType::Released };
                    dec.len = 0;
                    drop(dec);
                    push_event(KeyEvent { index, kind });
                }
            }
        } else if dec.len == 4 {
            if dec.seq[3] == 0x37 || dec.seq[3] == 0xAA {
                let kind = if dec.seq[3] == 0x37 { KeyEventType::Pressed } else { KeyEventType::Released };
                dec.len = 0;
                drop(dec);
                push_event(KeyEvent { index: scancodes::PRINT_SCREEN_INDEX, kind });
            }
        } else if dec.len >= 6 {
            dec.len = 0;
        }
    } else if sc == 0xE0 || sc == 0xE1 {
        dec.seq[0] = sc;
        dec.len = 1;
    } else if (sc & 0x7F) < 89 {
        let index = (sc & 0x7F) - 1;
        let kind = if sc & 0x80 != 0 { KeyEventType::Released } else { KeyEventType::Pressed };
        drop(dec);
        push_event(KeyEvent { index, kind });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_press_and_release() {
        // 0x1E is the scancode for 'A' (index 29) per scancode set 1.
        handle_scancode(0x1E);
        let e = consume_event().unwrap();
        assert_eq!(e.index, 29);
        assert_eq!(e.kind, KeyEventType::Pressed);

        handle_scancode(0x9E);
        let e = consume_event().unwrap();
        assert_eq!(e.index, 29);
        assert_eq!(e.kind, KeyEventType::Released);
    }

    #[test]
    fn two_byte_sequence_up_arrow() {
        handle_scancode(0xE0);
        handle_scancode(0x48);
        let e = consume_event().unwrap();
        assert_eq!(e.index, 91);
        assert_eq!(e.kind, KeyEventType::Pressed);
    }

    #[test]
    fn print_screen_press_sequence() {
        handle_scancode(0xE0);
        handle_scancode(0x2A);
        handle_scancode(0xE0);
        handle_scancode(0x37);
        let e = consume_event().unwrap();
        assert_eq!(e.index, scancodes::PRINT_SCREEN_INDEX);
        assert_eq!(e.kind, KeyEventType::Pressed);
    }

    #[test]
    fn pause_sequence_produces_no_event() {
        for b in [0xE1, 0x1D, 0x45, 0xE1, 0x9D, 0xC5] {
            handle_scancode(b);
        }
        assert!(consume_event().is_none());
    }
}
