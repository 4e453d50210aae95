//! FILE-stream machinery: a 1024-byte ring per stream, written and read
//! through the WRITE/READ syscalls.

use spin::Mutex;

use crate::serial;

const IO_BUF_SIZE: usize = 1024;

struct RingState {
    buf: [u8; IO_BUF_SIZE],
    writer: usize,
    reader: usize,
}

impl RingState {
    const fn new() -> Self {
        RingState { buf: [0; IO_BUF_SIZE], writer: 0, reader: 0 }
    }

    fn write(&mut self, src: &[u8]) -> usize {
        let mut count = 0;
        for &b in src {
            let next = (self.writer + 1) % IO_BUF_SIZE;
            if next == self.reader {
                break;
            }
            self.buf[self.writer] = b;
            self.writer = next;
            count += 1;
        }
        count
    }

    fn read(&mut self, dst: &mut [u8]) -> usize {
        if self.reader == self.writer {
            return 0;
        }
        let mut count = 0;
        for slot in dst.iter_mut() {
            if self.reader == self.writer {
                break;
            }
            *slot = self.buf[self.reader];
            self.reader = (self.reader + 1) % IO_BUF_SIZE;
            count += 1;
        }
        count
    }
}

/// A single FILE stream's ring buffer. Owned by whichever task created it;
/// identity is by address — there is no naming or directory of streams.
pub struct Stream {
    state: Mutex<RingState>,
}

impl Stream {
    pub const fn new() -> Self {
        Stream { state: Mutex::new(RingState::new()) }
    }

    pub fn write(&self, src: &[u8]) -> usize {
        self.state.lock().write(src)
    }

    pub fn read(&self, dst: &mut [u8]) -> usize {
        self.state.lock().read(dst)
    }
}

/// Which stream a syscall's `data1` argument names. The debug stream is
/// unbuffered and forwards straight to the serial port; all others are
/// raw pointers to a caller-owned [`Stream`].
pub enum StreamKind {
    Debug,
    Ring(*const Stream),
}

impl StreamKind {
    /// `raw == 0` is reserved for the debug stream; any other value is
    /// interpreted as the address of a `Stream`.
    pub fn from_raw(raw: u64) -> StreamKind {
        if raw == 0 {
            StreamKind::Debug
        } else {
            StreamKind::Ring(raw as *const Stream)
        }
    }
}

pub fn write(kind: StreamKind, src: &[u8]) -> usize {
    match kind {
        StreamKind::Debug => {
            serial::write_bytes(src);
            src.len()
        }
        StreamKind::Ring(ptr) => {
            if ptr.is_null() {
                return 0;
            }
            unsafe { (*ptr).write(src) }
        }
    }
}

pub fn read(kind: StreamKind, dst: &mut [u8]) -> usize {
    match kind {
        StreamKind::Debug => 0,
        StreamKind::Ring(ptr) => {
            if ptr.is_null() {
                return 0;
            }
            unsafe { (*ptr).read(dst) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let stream = Stream::new();
        assert_eq!(stream.write(b"hello"), 5);
        let mut buf = [0u8; 5];
        assert_eq!(stream.read(&mut buf), 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn write_refuses_when_full() {
        let stream = Stream::new();
        let chunk = [b'x'; IO_BUF_SIZE];
        let written = stream.write(&chunk);
        assert_eq!(written, IO_BUF_SIZE - 1);
        assert_eq!(stream.write(b"y"), 0);
    }

    #[test]
    fn read_of_empty_stream_returns_zero() {
        let stream = Stream::new();
        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf), 0);
    }
}
