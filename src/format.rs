//! A small `printf`-style formatter, built as a pure state machine over
//! the format string. Rust has no C varargs, so the renderer instead
//! consumes a slice of [`Arg`] built at the call site by the `kprintf!`
//! macro — the idiomatic stand-in for `va_list` traversal.

use core::fmt::Write;

#[derive(Debug, Clone, Copy)]
pub enum Arg<'a> {
    Char(char),
    Str(&'a str),
    Signed(i64),
    Unsigned(u64),
    Pointer(u64),
}

#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    left_align: bool,
    force_sign: bool,
    space_sign: bool,
    alt_form: bool,
    zero_pad: bool,
}

#[derive(Debug, Clone, Copy)]
enum Conv {
    Char,
    Str,
    Signed,
    Unsigned,
    Octal,
    Hex { upper: bool },
    Pointer,
    Binary,
    Percent,
}

struct Spec {
    flags: Flags,
    width: usize,
    precision: Option<usize>,
    conv: Conv,
}

enum Token<'a> {
    Literal(&'a str),
    Spec(Spec),
}

/// Splits `fmt` into literal runs and specifier tokens. A malformed
/// trailing `%` is emitted as a literal `%`.
fn tokenize(fmt: &str) -> impl Iterator<Item = Token<'_>> {
    TokenIter { rest: fmt }
}

struct TokenIter<'a> {
    rest: &'a str,
}

impl<'a> Iterator for TokenIter<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        if self.rest.is_empty() {
            return None;
        }

        if !self.rest.starts_with('%') {
            let end = self.rest.find('%').unwrap_or(self.rest.len());
            let (lit, rest) = self.rest.split_at(end);
            self.rest = rest;
            return Some(Token::Literal(lit));
        }

        let bytes = self.rest.as_bytes();
        let mut i = 1; // skip '%'

        let mut flags = Flags::default();
        loop {
            match bytes.get(i) {
                Some(b'-') => { flags.left_align = true; i += 1; }
                Some(b'+') => { flags.force_sign = true; i += 1; }
                Some(b' ') => { flags.space_sign = true; i += 1; }
                Some(b'#') => { flags.alt_form = true; i += 1; }
                Some(b'0') => { flags.zero_pad = true; i += 1; }
                _ => break,
            }
        }

        let mut width = 0usize;
        while let Some(d @ b'0'..=b'9') = bytes.get(i) {
            width = width * 10 + (d - b'0') as usize;
            i += 1;
        }

        let mut precision = None;
        if bytes.get(i) == Some(&b'.') {
            i += 1;
            let mut p = 0usize;
            while let Some(d @ b'0'..=b'9') = bytes.get(i) {
                p = p * 10 + (d - b'0') as usize;
                i += 1;
            }
            precision = Some(p);
        }

        // length modifier: only `ll` affects anything here (64-bit args
        // are the only integer width this kernel passes).
        if bytes.get(i) == Some(&b'l') && bytes.get(i + 1) == Some(&b'l') {
            i += 2;
        } else if bytes.get(i) == Some(&b'l') {
            i += 1;
        }

        let conv = match bytes.get(i) {
            Some(b'c') => Conv::Char,
            Some(b's') => Conv::Str,
            Some(b'd') | Some(b'i') => Conv::Signed,
            Some(b'u') => Conv::Unsigned,
            Some(b'o') => Conv::Octal,
            Some(b'x') => Conv::Hex { upper: false },
            Some(b'X') => Conv::Hex { upper: true },
            Some(b'p') => Conv::Pointer,
            Some(b'b') => Conv::Binary,
            Some(b'%') => Conv::Percent,
            _ => {
                // Unrecognized/truncated specifier: treat the '%' as literal.
                let (lit, rest) = self.rest.split_at(1);
                self.rest = rest;
                return Some(Token::Literal(lit));
            }
        };
        i += 1;

        let spec_text = &self.rest[..i];
        self.rest = &self.rest[i..];
        let _ = spec_text;

        Some(Token::Spec(Spec { flags, width, precision, conv }))
    }
}

fn write_padded(out: &mut impl Write, s: &str, width: usize, left_align: bool, zero_pad: bool) -> core::fmt::Result {
    let pad = width.saturating_sub(s.chars().count());
    let fill = if zero_pad && !left_align { '0' } else { ' ' };

    if left_align {
        out.write_str(s)?;
        for _ in 0..pad {
            out.write_char(' ')?;
        }
    } else {
        for _ in 0..pad {
            out.write_char(fill)?;
        }
        out.write_str(s)?;
    }
    Ok(())
}

/// Renders `fmt` against `args` into `out`, one [`Arg`] consumed per
/// non-`%%` specifier encountered, in order.
pub fn render(out: &mut impl Write, fmt: &str, args: &[Arg]) -> core::fmt::Result {
    let mut arg_iter = args.iter();

    for token in tokenize(fmt) {
        match token {
            Token::Literal(lit) => out.write_str(lit)?,
            Token::Spec(spec) => {
                if let Conv::Percent = spec.conv {
                    out.write_char('%')?;
                    continue;
                }

                let arg = arg_iter.next().copied();
                render_one(out, &spec, arg)?;
            }
        }
    }
    Ok(())
}

fn render_one(out: &mut impl Write, spec: &Spec, arg: Option<Arg>) -> core::fmt::Result {
    let mut numbuf = [0u8; 24];

    match (spec.conv, arg) {
        (Conv::Char, Some(Arg::Char(c))) => write_padded(out, c.encode_utf8(&mut [0; 4]), spec.width, spec.flags.left_align, false),
        (Conv::Str, Some(Arg::Str(s))) => {
            let s = match spec.precision {
                Some(p) => &s[..p.min(s.len())],
                None => s,
            };
            write_padded(out, s, spec.width, spec.flags.left_align, false)
        }
        (Conv::Signed, Some(Arg::Signed(v))) => {
            let sign = if v < 0 { "-" } else if spec.flags.force_sign { "+" } else if spec.flags.space_sign { " " } else { "" };
            let mag = v.unsigned_abs();
            let digits = format_uint(mag, 10, false, &mut numbuf);
            write_padded(out, &alloc_concat(sign, digits), spec.width, spec.flags.left_align, spec.flags.zero_pad)
        }
        (Conv::Unsigned, Some(Arg::Unsigned(v))) => {
            let digits = format_uint(v, 10, false, &mut numbuf);
            write_padded(out, digits, spec.width, spec.flags.left_align, spec.flags.zero_pad)
        }
        (Conv::Octal, Some(Arg::Unsigned(v))) => {
            let digits = format_uint(v, 8, false, &mut numbuf);
            let prefix = if spec.flags.alt_form { "0" } else { "" };
            write_padded(out, &alloc_concat(prefix, digits), spec.width, spec.flags.left_align, spec.flags.zero_pad)
        }
        (Conv::Hex { upper }, Some(Arg::Unsigned(v))) => {
            let digits = format_uint(v, 16, upper, &mut numbuf);
            let prefix = if spec.flags.alt_form { if upper { "0X" } else { "0x" } } else { "" };
            write_padded(out, &alloc_concat(prefix, digits), spec.width, spec.flags.left_align, spec.flags.zero_pad)
        }
        (Conv::Pointer, Some(Arg::Pointer(v))) => {
            let digits = format_uint(v, 16, false, &mut numbuf);
            write_padded(out, &alloc_concat("0x", digits), spec.width, spec.flags.left_align, false)
        }
        (Conv::Binary, Some(Arg::Unsigned(v))) => {
            let width = spec.precision.unwrap_or(8).clamp(8, 64);
            let mut buf = [b'0'; 64];
            for i in 0..width {
                if v & (1 << (width - 1 - i)) != 0 {
                    buf[i] = b'1';
                }
            }
            let s = core::str::from_utf8(&buf[..width]).unwrap_or("");
            write_padded(out, s, spec.width, spec.flags.left_align, false)
        }
        _ => out.write_str("(missing-arg)"),
    }
}

fn format_uint(mut v: u64, base: u64, upper: bool, buf: &mut [u8; 24]) -> &str {
    let digits = if upper { b"0123456789ABCDEF" } else { b"0123456789abcdef" };
    let mut i = buf.len();
    if v == 0 {
        i -= 1;
        buf[i] = b'0';
    } else {
        while v > 0 {
            i -= 1;
            buf[i] = digits[(v % base) as usize];
            v /= base;
        }
    }
    core::str::from_utf8(&buf[i..]).unwrap_or("")
}

// Small helper since `alloc::format!` would pull in a heap allocation for
// every padded number; this concatenates sign/prefix and digits in a
// fixed-size buffer instead. Lives on the stack only for the call.
fn alloc_concat<'a>(prefix: &str, digits: &'a str) -> ConcatBuf {
    let mut buf = [0u8; 32];
    let mut len = 0;
    for &b in prefix.as_bytes() {
        buf[len] = b;
        len += 1;
    }
    for &b in digits.as_bytes() {
        buf[len] = b;
        len += 1;
    }
    ConcatBuf { buf, len }
}

struct ConcatBuf {
    buf: [u8; 32],
    len: usize,
}

impl core::ops::Deref for ConcatBuf {
    type Target = str;
    fn deref(&self) -> &str {
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sink(alloc::string::String);
    impl Write for Sink {
        fn write_str(&mut self, s: &str) -> core::fmt::Result {
            self.0.push_str(s);
            Ok(())
        }
    }

    fn run(fmt: &str, args: &[Arg]) -> alloc::string::String {
        let mut sink = Sink(alloc::string::String::new());
        render(&mut sink, fmt, args).unwrap();
        sink.0
    }

    #[test]
    fn literal_passthrough() {
        assert_eq!(run("hello", &[]), "hello");
    }

    #[test]
    fn signed_and_unsigned() {
        assert_eq!(run("%d", &[Arg::Signed(-42)]), "-42");
        assert_eq!(run("%u", &[Arg::Unsigned(42)]), "42");
    }

    #[test]
    fn hex_with_alt_form() {
        assert_eq!(run("%#x", &[Arg::Unsigned(255)]), "0xff");
        assert_eq!(run("%#X", &[Arg::Unsigned(255)]), "0XFF");
    }

    #[test]
    fn zero_padded_width() {
        assert_eq!(run("%04d", &[Arg::Signed(7)]), "0007");
    }

    #[test]
    fn percent_literal() {
        assert_eq!(run("100%%", &[]), "100%");
    }

    #[test]
    fn binary_with_precision() {
        assert_eq!(run("%.8b", &[Arg::Unsigned(5)]), "00000101");
    }

    #[test]
    fn string_precision_truncates() {
        assert_eq!(run("%.3s", &[Arg::Str("hello")]), "hel");
    }
}
