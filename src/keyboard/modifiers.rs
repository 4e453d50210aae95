//! Shift/ctrl sampling used by the TTY to turn a pressed key index into a
//! printable character.

use super::scancodes::KEY_NAMES;

const LEFT_SHIFT_INDEX: u8 = 41;
const RIGHT_SHIFT_INDEX: u8 = 53;
const LEFT_CTRL_INDEX: u8 = 28;

/// True if either shift key is currently held, per the contemporaneous
/// key-state array the PS/2 decoder maintains.
pub fn shift_held() -> bool {
    super::is_pressed(LEFT_SHIFT_INDEX) || super::is_pressed(RIGHT_SHIFT_INDEX)
}

/// Returns the lowercase/uppercase printable character for `index`, or
/// `None` for keys this kernel does not render (function keys, arrows,
/// modifiers themselves).
pub fn to_char(index: u8, shift: bool) -> Option<char> {
    let name = KEY_NAMES.get(index as usize).copied().unwrap_or("");
    match name {
        "SPC" => Some(' '),
        "ENT" => Some('\n'),
        "BSP" => Some('\u{8}'),
        "TAB" => Some('\t'),
        _ if name.len() == 1 => {
            let c = name.chars().next().unwrap();
            if c.is_ascii_alphabetic() {
                Some(if shift { c.to_ascii_uppercase() } else { c.to_ascii_lowercase() })
            } else {
                Some(shifted_symbol(c, shift))
            }
        }
        _ if name.len() > 1 && name.chars().all(|c| c.is_ascii_digit()) => {
            Some(shifted_digit(name.chars().next().unwrap(), shift))
        }
        _ => None,
    }
}

fn shifted_digit(c: char, shift: bool) -> char {
    if !shift {
        return c;
    }
    match c {
        '1' => '!', '2' => '@', '3' => '#', '4' => '$', '5' => '%',
        '6' => '^', '7' => '&', '8' => '*', '9' => '(', '0' => ')',
        other => other,
    }
}

fn shifted_symbol(c: char, shift: bool) -> char {
    if !shift {
        return c;
    }
    match c {
        '-' => '_', '=' => '+', '[' => '{', ']' => '}', ';' => ':',
        '\'' => '"', '`' => '~', ',' => '<', '.' => '>', '/' => '?',
        '\\' => '|',
        other => other,
    }
}

/// True if `index` names either shift key.
pub fn is_shift(index: u8) -> bool {
    index == LEFT_SHIFT_INDEX || index == RIGHT_SHIFT_INDEX
}

/// True if `index` names the left control key (the only ctrl this decoder
/// assigns a single-byte index to).
pub fn is_ctrl(index: u8) -> bool {
    index == LEFT_CTRL_INDEX
}
