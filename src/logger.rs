//! A `log::Log` implementation that writes to the stddbg serial path and
//! keeps a small in-memory ring of recent formatted lines so the TTY can
//! surface them on demand.

use core::fmt::Write;

use spin::Mutex;

use crate::serial;

const CAPTURE_LINES: usize = 64;
const LINE_CAP: usize = 120;

struct LineBuf {
    data: [u8; LINE_CAP],
    len: usize,
}

impl LineBuf {
    const fn empty() -> Self {
        LineBuf { data: [0; LINE_CAP], len: 0 }
    }

    fn as_str(&self) -> &str {
        core::str::from_utf8(&self.data[..self.len]).unwrap_or("")
    }
}

impl Write for LineBuf {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        for &b in s.as_bytes() {
            if self.len >= LINE_CAP {
                break;
            }
            self.data[self.len] = b;
            self.len += 1;
        }
        Ok(())
    }
}

struct LogBuffer {
    lines: [LineBuf; CAPTURE_LINES],
    next: usize,
}

impl LogBuffer {
    const fn new() -> Self {
        const EMPTY: LineBuf = LineBuf::empty();
        LogBuffer { lines: [EMPTY; CAPTURE_LINES], next: 0 }
    }

    fn push(&mut self, line: LineBuf) {
        self.lines[self.next] = line;
        self.next = (self.next + 1) % CAPTURE_LINES;
    }
}

static LOG_BUFFER: Mutex<LogBuffer> = Mutex::new(LogBuffer::new());

/// Returns the most recently captured log lines, oldest first.
pub fn recent_lines(out: &mut [heapless_line::Line]) -> usize {
    let buf = LOG_BUFFER.lock();
    let mut count = 0;
    for i in 0..CAPTURE_LINES {
        let idx = (buf.next + i) % CAPTURE_LINES;
        if buf.lines[idx].len == 0 {
            continue;
        }
        if count >= out.len() {
            break;
        }
        out[count].copy_from(buf.lines[idx].as_str());
        count += 1;
    }
    count
}

/// Tiny fixed-capacity string, avoiding a dependency on an external crate
/// purely for displaying captured log lines.
pub mod heapless_line {
    use super::LINE_CAP;

    pub struct Line {
        data: [u8; LINE_CAP],
        len: usize,
    }

    impl Line {
        pub const fn new() -> Self {
            Line { data: [0; LINE_CAP], len: 0 }
        }

        pub fn copy_from(&mut self, s: &str) {
            let n = s.len().min(LINE_CAP);
            self.data[..n].copy_from_slice(&s.as_bytes()[..n]);
            self.len = n;
        }

        pub fn as_str(&self) -> &str {
            core::str::from_utf8(&self.data[..self.len]).unwrap_or("")
        }
    }
}

struct KernelLogger;

static LOGGER: KernelLogger = KernelLogger;

impl log::Log for KernelLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut line = LineBuf::empty();
        let _ = write!(line, "[{:<5}] {}", record.level(), record.args());

        for &b in line.as_str().as_bytes() {
            serial::write_byte(b);
        }
        serial::write_byte(b'\n');

        LOG_BUFFER.lock().push(line);
    }

    fn flush(&self) {}
}

/// Installs the kernel logger. Must be called exactly once, before any
/// other subsystem logs, so bring-up failures are narrated.
pub fn init(level: log::LevelFilter) {
    log::set_logger(&LOGGER).expect("logger already installed");
    log::set_max_level(level);
}
