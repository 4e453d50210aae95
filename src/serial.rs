//! COM1 serial port, used as the stddbg debug-output path.

use spin::Mutex;
use uart_16550::SerialPort;

const COM1_PORT: u16 = 0x3F8;

static SERIAL1: Mutex<SerialPort> = Mutex::new(unsafe { SerialPort::new(COM1_PORT) });

/// Initializes the COM1 UART. Safe to call more than once.
pub fn init() {
    SERIAL1.lock().init();
}

/// Writes a single byte to the debug stream, blocking if the UART is busy.
pub fn write_byte(byte: u8) {
    use core::fmt::Write;
    let mut port = SERIAL1.lock();
    let _ = port.write_char(byte as char);
}

/// Writes a whole byte slice to the debug stream.
pub fn write_bytes(bytes: &[u8]) {
    for &b in bytes {
        write_byte(b);
    }
}
