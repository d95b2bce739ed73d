//! Byte character classes.
//!
//! A single 256-entry table answers "is this byte whitespace / part of a
//! name / part of a number" for the lexer's run scanners.

/// Insignificant bytes: whitespace, line terminators and commas.
pub const SPACE: u8 = 0x01;
/// Name bytes: ASCII letters, digits and `_`.
pub const TOKEN: u8 = 0x02;
/// Numeric run bytes: digits, `.`, `e`, `E`, `+` and `-`.
pub const NUMBER: u8 = 0x04;
/// Bytes allowed to follow a number literal.
pub const TERM: u8 = 0x08;

const fn build() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut b = 0usize;
    while b < 256 {
        let c = b as u8;
        let mut flags = 0u8;
        if matches!(c, b' ' | b'\t' | b'\r' | b'\n' | b',') {
            flags |= SPACE | TERM;
        }
        if c.is_ascii_alphanumeric() || c == b'_' {
            flags |= TOKEN;
        }
        if c.is_ascii_digit() || matches!(c, b'.' | b'e' | b'E' | b'+' | b'-') {
            flags |= NUMBER;
        }
        if matches!(c, 0 | b'[' | b']' | b'{' | b'}' | b'(' | b')' | b'#') {
            flags |= TERM;
        }
        table[b] = flags;
        b += 1;
    }
    table
}

static CLASSES: [u8; 256] = build();

/// Returns true if `b` has any of the given class flags.
#[must_use]
#[inline]
pub fn is(b: u8, class: u8) -> bool {
    CLASSES[b as usize] & class != 0
}

/// Returns true for whitespace and commas.
#[must_use]
#[inline]
pub fn is_space(b: u8) -> bool {
    is(b, SPACE)
}

/// Returns true for name bytes.
#[must_use]
#[inline]
pub fn is_token(b: u8) -> bool {
    is(b, TOKEN)
}

/// Returns true for bytes that may appear in a numeric run.
#[must_use]
#[inline]
pub fn is_number(b: u8) -> bool {
    is(b, NUMBER)
}

/// Returns true for bytes that may terminate a numeric literal.
#[must_use]
#[inline]
pub fn is_term(b: u8) -> bool {
    is(b, TERM)
}

/// Describes a byte for error messages.
#[must_use]
pub fn describe(b: u8) -> String {
    match b {
        0 => "end of input".to_string(),
        b'\n' => "newline".to_string(),
        0x21..=0x7e => format!("'{}'", b as char),
        _ => format!("byte 0x{b:02x}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes() {
        assert!(is_space(b','));
        assert!(is_space(b'\t'));
        assert!(!is_space(b'a'));
        assert!(is_token(b'_'));
        assert!(is_token(b'9'));
        assert!(!is_token(b'-'));
        assert!(is_number(b'e'));
        assert!(is_number(b'-'));
        assert!(!is_number(b'x'));
        assert!(is_term(b']'));
        assert!(is_term(0));
        assert!(!is_term(b'x'));
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(0), "end of input");
        assert_eq!(describe(b'}'), "'}'");
    }
}
