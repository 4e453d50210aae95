//! Scancode set 1 string table and the secondary (`0xE0`-prefixed) index
//! table, kept mostly for debug printing; the decoder in
//! [`super::handle_scancode`] works from the numeric indices directly.

/// 103 entries: one-byte scancodes occupy indices 0-87, `0xE0`-prefixed
/// two-byte scancodes occupy 88-101, and Print Screen occupies 102. Pause
/// has no index since it generates no release event.
pub const KEY_NAMES: [&str; 103] = [
    "ESC", "1", "2", "3", "4", "5", "6", "7", "8", "9",
    "0", "-", "=", "BSP", "TAB", "Q", "W", "E", "R", "T",
    "Y", "U", "I", "O", "P", "[", "]", "ENT", "LCT", "A",
    "S", "D", "F", "G", "H", "J", "K", "L", ";", "'",
    "`", "LSH", "\\", "Z", "X", "C", "V", "B", "N", "M",
    ",", ".", "/", "RSH", "K*", "LAT", "SPC", "CAP", "F1", "F2",
    "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "NUM", "SCL",
    "K7", "K8", "K9", "K-", "K4", "K5", "K6", "K+", "K1", "K2",
    "K3", "K0", "K.", "", "", "", "F11", "F12",
    "RAT", "RCT", "LA", "UA", "RA", "DA",
    "HOM", "PGU", "END", "PGD", "INS", "DEL",
    "KEN", "K/",
    "PRT",
];

pub const PRINT_SCREEN_INDEX: u8 = 102;

/// Resolves the index for a two-byte (`0xE0`-prefixed) scancode's second
/// byte, or `None` for sequences this kernel does not decode.
pub fn two_byte_index(second: u8) -> Option<u8> {
    match second & 0x7F {
        0x4B => Some(90), // left arrow
        0x48 => Some(91), // up arrow
        0x4D => Some(92), // right arrow
        0x50 => Some(93), // down arrow
        0x38 => Some(88), // right alt
        0x1D => Some(89), // right control
        0x47 => Some(94), // home
        0x49 => Some(95), // page up
        0x4F => Some(96), // end
        0x51 => Some(97), // page down
        0x52 => Some(98), // insert
        0x53 => Some(99), // delete
        0x1C => Some(100), // keypad enter
        0x35 => Some(101), // keypad /
        _ => None,
    }
}
