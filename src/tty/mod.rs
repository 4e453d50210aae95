//! The on-screen terminal: a TTY task that turns key events into a
//! command buffer and glyphs, and a shell task that demonstrates the
//! stream-pipe semantics by reading back its own stdout.

use conquer_once::spin::OnceCell;
use spin::Mutex;

use crate::graphics::font::{self, FontBlob};
use crate::graphics::{self, Painter};
use crate::io::{self, Stream, StreamKind};
use crate::keyboard::{self, KeyEventType};

const OUTPUT_BUF_SIZE: usize = 4096;
const COMMAND_BUF_SIZE: usize = 1024;
const TTY_COLS: usize = 80;
const TTY_ROWS: usize = 25;

static SHELL_STDOUT: Stream = Stream::new();

static PAINTER: OnceCell<Mutex<alloc::boxed::Box<dyn Painter + Send>>> = OnceCell::uninit();
static FONT_DATA: OnceCell<&'static [u8]> = OnceCell::uninit();

/// Hands the TTY a framebuffer collaborator and font blob. Must be called
/// once during boot, before `tty_task`/`shell_task` are scheduled.
pub fn install(painter: alloc::boxed::Box<dyn Painter + Send>, font_data: &'static [u8]) {
    PAINTER.init_once(|| Mutex::new(painter));
    FONT_DATA.init_once(|| font_data);
}

struct RingBuf<const N: usize> {
    data: [u8; N],
    len: usize,
}

impl<const N: usize> RingBuf<N> {
    const fn new() -> Self {
        RingBuf { data: [0; N], len: 0 }
    }

    fn push(&mut self, b: u8) {
        if self.len < N {
            self.data[self.len] = b;
            self.len += 1;
        }
    }

    fn pop(&mut self) {
        if self.len > 0 {
            self.len -= 1;
        }
    }

    fn as_str(&self) -> &str {
        core::str::from_utf8(&self.data[..self.len]).unwrap_or("")
    }
}

struct TtyState {
    output: RingBuf<OUTPUT_BUF_SIZE>,
    command: RingBuf<COMMAND_BUF_SIZE>,
}

impl TtyState {
    const fn new() -> Self {
        TtyState { output: RingBuf::new(), command: RingBuf::new() }
    }

    fn handle_press(&mut self, index: u8) -> bool {
        let shift = crate::keyboard::modifiers::shift_held();

        match crate::keyboard::modifiers::to_char(index, shift) {
            Some('\n') => {
                self.command.push(b'\n');
                self.output.push(b'\n');
                true
            }
            Some('\u{8}') => {
                if self.command.len > 0 {
                    self.command.pop();
                    self.output.pop();
                }
                true
            }
            Some(c) => {
                let mut buf = [0u8; 4];
                let s = c.encode_utf8(&mut buf);
                for &b in s.as_bytes() {
                    self.command.push(b);
                    self.output.push(b);
                }
                true
            }
            None => false,
        }
    }

    fn drain_shell_output(&mut self) -> bool {
        let mut buf = [0u8; 256];
        let n = io::read(StreamKind::Ring(&SHELL_STDOUT), &mut buf);
        for &b in &buf[..n] {
            self.output.push(b);
        }
        n > 0
    }
}

fn render(state: &TtyState) {
    let Some(painter_cell) = PAINTER.get() else { return };
    let Some(data) = FONT_DATA.get() else { return };
    let Some(blob) = FontBlob::new(data) else { return };

    let mut painter = painter_cell.lock();
    let mut col = 0usize;
    let mut row = 0usize;

    for &b in state.output.as_str().as_bytes() {
        if b == b'\n' || col >= TTY_COLS {
            col = 0;
            row += 1;
            if row >= TTY_ROWS {
                row = TTY_ROWS - 1;
            }
            if b == b'\n' {
                continue;
            }
        }
        graphics::draw_glyph(&mut **painter, &blob, b, col, row, 255, 255, 255);
        col += 1;
    }

    let _ = font::GLYPH_WIDTH;
    graphics::draw_cursor(&mut **painter, col, row, 80, 80, 80);
}

/// Pops queued key events, edits the command/output buffers, pulls in
/// anything the shell task has written to its stdout, and re-renders
/// whenever something changed.
pub extern "C" fn tty_task() -> ! {
    let mut state = TtyState::new();
    loop {
        let mut changed = false;

        while let Some(event) = keyboard::consume_event() {
            if event.kind == KeyEventType::Pressed {
                changed |= state.handle_press(event.index);
            }
        }

        changed |= state.drain_shell_output();

        if changed {
            render(&state);
        }

        yield_hint();
    }
}

/// Writes a banner to its own stdout, then reads it back — demonstrating
/// the pipe semantics a real shell's stdout redirection would rely on.
pub extern "C" fn shell_task() -> ! {
    const BANNER: &[u8] = b"ready\n";
    loop {
        SHELL_STDOUT.write(BANNER);

        let mut buf = [0u8; BANNER.len()];
        let n = SHELL_STDOUT.read(&mut buf);
        if n > 0 {
            log::debug!("shell echoed {} bytes", n);
        }

        yield_hint();
    }
}

fn yield_hint() {
    core::hint::spin_loop();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_press_appends_to_both_buffers() {
        let mut state = TtyState::new();
        // index 29 is 'A'; to_char(29, false) == 'a'.
        let changed = state.handle_press(29);
        assert!(changed);
        assert_eq!(state.command.as_str(), "a");
        assert_eq!(state.output.as_str(), "a");
    }

    #[test]
    fn backspace_removes_last_char() {
        let mut state = TtyState::new();
        state.handle_press(29);
        let bsp_index = 13; // "BSP" in KEY_NAMES
        state.handle_press(bsp_index);
        assert_eq!(state.command.as_str(), "");
    }

    #[test]
    fn enter_appends_newline_to_both_buffers() {
        let mut state = TtyState::new();
        state.handle_press(29);
        let enter_index = 27; // "ENT" in KEY_NAMES
        state.handle_press(enter_index);
        assert_eq!(state.output.as_str(), "a\n");
    }
}
