//! Byte lexer shared by the SDL and executable grammars.
//!
//! The lexer does not produce a token stream. Parsers pull bytes with
//! [`Lexer::read_byte`], push one back with [`Lexer::unread`], and use the
//! run scanners ([`Lexer::read_token`], [`Lexer::read_number_token`],
//! [`Lexer::read_string`]) for multi-byte lexemes.

use crate::class;
use graft_core::{Error, Pos, Result};
use std::borrow::Cow;
use std::io::Read;

const BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// A byte reader over a source document.
pub struct Lexer<'a> {
    src: Cow<'a, [u8]>,
    offset: usize,
    line: u32,
    column: u32,
    /// Line/column before the last `read_byte`, for `unread`.
    prev: Option<(u32, u32)>,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer over text.
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self::from_bytes(source.as_bytes())
    }

    /// Creates a new lexer over raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        Self::with_source(Cow::Borrowed(bytes))
    }

    fn with_source(src: Cow<'a, [u8]>) -> Self {
        let offset = if src.starts_with(BOM) { BOM.len() } else { 0 };
        Self {
            src,
            offset,
            line: 1,
            column: 1,
            prev: None,
        }
    }
}

impl Lexer<'static> {
    /// Creates a lexer by draining a reader.
    ///
    /// An I/O failure is a hard parse error.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut buf = Vec::new();
        reader
            .read_to_end(&mut buf)
            .map_err(|e| Error::from(e).at(Pos::start()))?;
        Ok(Self::with_source(Cow::Owned(buf)))
    }
}

impl Lexer<'_> {
    /// Returns the position of the next unread byte.
    #[must_use]
    #[inline]
    pub fn pos(&self) -> Pos {
        Pos::new(self.line, self.column)
    }

    /// Returns true once every byte is consumed.
    #[must_use]
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.offset >= self.src.len()
    }

    /// Returns the next byte without consuming it, 0 at end of input.
    #[must_use]
    #[inline]
    pub fn peek(&self) -> u8 {
        self.peek_at(0)
    }

    /// Returns the byte `n` positions ahead, 0 past the end.
    #[must_use]
    #[inline]
    pub fn peek_at(&self, n: usize) -> u8 {
        self.src.get(self.offset + n).copied().unwrap_or(0)
    }

    /// Consumes and returns the next byte, 0 at end of input.
    pub fn read_byte(&mut self) -> u8 {
        let Some(&b) = self.src.get(self.offset) else {
            self.prev = None;
            return 0;
        };
        self.prev = Some((self.line, self.column));
        self.offset += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        b
    }

    /// Pushes the last byte read back. Only one byte of pushback exists.
    pub fn unread(&mut self) {
        if let Some((line, column)) = self.prev.take() {
            self.offset -= 1;
            self.line = line;
            self.column = column;
        }
    }

    fn advance(&mut self, n: usize) {
        for _ in 0..n {
            self.read_byte();
        }
    }

    /// Skips whitespace, commas and `#` comments, returning the next byte
    /// without consuming it.
    pub fn skip_space(&mut self) -> u8 {
        loop {
            let b = self.peek();
            if class::is_space(b) {
                self.read_byte();
            } else if b == b'#' {
                let rest = &self.src[self.offset..];
                let len = memchr::memchr(b'\n', rest).unwrap_or(rest.len());
                // A comment never contains a newline, so only the column moves.
                self.offset += len;
                self.column += u32::try_from(len).unwrap_or(u32::MAX);
                self.prev = None;
            } else {
                return b;
            }
        }
    }

    /// Consumes a maximal run of name bytes. Returns an empty string if the
    /// next byte is not a name byte.
    pub fn read_token(&mut self) -> String {
        self.read_run(class::TOKEN)
    }

    /// Consumes a maximal numeric run.
    pub fn read_number_token(&mut self) -> String {
        self.read_run(class::NUMBER)
    }

    fn read_run(&mut self, flags: u8) -> String {
        let start = self.offset;
        while class::is(self.peek(), flags) {
            self.read_byte();
        }
        // Runs are ASCII by construction.
        String::from_utf8_lossy(&self.src[start..self.offset]).into_owned()
    }

    /// Skips space, then reads a name. Errors if no name is present.
    pub fn read_name(&mut self, what: &str) -> Result<String> {
        let b = self.skip_space();
        let pos = self.pos();
        let name = self.read_token();
        if name.is_empty() {
            return Err(Error::parse(
                pos,
                format!("expected {what}, found {}", class::describe(b)),
            ));
        }
        Ok(name)
    }

    /// Skips space and consumes `expected`, or errors.
    pub fn expect(&mut self, expected: u8) -> Result<()> {
        let b = self.skip_space();
        if b == expected {
            self.read_byte();
            Ok(())
        } else {
            Err(self.unexpected(b, &format!("'{}'", expected as char)))
        }
    }

    /// Skips space and consumes `b` if it is next.
    pub fn consume(&mut self, b: u8) -> bool {
        if self.skip_space() == b {
            self.read_byte();
            true
        } else {
            false
        }
    }

    /// Skips space and consumes `...` if it is next.
    pub fn consume_spread(&mut self) -> bool {
        if self.skip_space() == b'.' && self.peek_at(1) == b'.' && self.peek_at(2) == b'.' {
            self.advance(3);
            true
        } else {
            false
        }
    }

    /// Builds an "expected X, found Y" error at the current position.
    #[must_use]
    pub fn unexpected(&self, found: u8, expected: &str) -> Error {
        Error::parse(
            self.pos(),
            format!("expected {expected}, found {}", class::describe(found)),
        )
    }

    /// Reads a quoted string. The next byte must be `"`; a `"""` opener reads
    /// a block string.
    pub fn read_string(&mut self) -> Result<String> {
        let start = self.pos();
        if self.peek() != b'"' {
            return Err(self.unexpected(self.peek(), "string"));
        }
        if self.peek_at(1) == b'"' && self.peek_at(2) == b'"' {
            self.advance(3);
            return self.read_block_string(start);
        }
        self.read_byte();

        let mut buf = Vec::new();
        loop {
            match self.read_byte() {
                0 | b'\n' => return Err(Error::parse(start, "unterminated string")),
                b'"' => break,
                b'\\' => self.read_escape(&mut buf)?,
                b => buf.push(b),
            }
        }
        String::from_utf8(buf).map_err(|_| Error::parse(start, "string is not valid UTF-8"))
    }

    fn read_escape(&mut self, buf: &mut Vec<u8>) -> Result<()> {
        let pos = self.pos();
        let c = match self.read_byte() {
            b'"' => '"',
            b'\\' => '\\',
            b'/' => '/',
            b'b' => '\u{8}',
            b'f' => '\u{c}',
            b'n' => '\n',
            b'r' => '\r',
            b't' => '\t',
            b'u' => self.read_unicode_escape(pos)?,
            b => {
                return Err(Error::parse(
                    pos,
                    format!("invalid escape sequence \\{}", b as char),
                ))
            }
        };
        let mut tmp = [0u8; 4];
        buf.extend_from_slice(c.encode_utf8(&mut tmp).as_bytes());
        Ok(())
    }

    fn read_hex4(&mut self, pos: Pos) -> Result<u32> {
        let mut code = 0u32;
        for _ in 0..4 {
            let b = self.read_byte();
            let digit = (b as char)
                .to_digit(16)
                .ok_or_else(|| Error::parse(pos, "invalid unicode escape"))?;
            code = code * 16 + digit;
        }
        Ok(code)
    }

    fn read_unicode_escape(&mut self, pos: Pos) -> Result<char> {
        let high = self.read_hex4(pos)?;
        if (0xD800..0xDC00).contains(&high) {
            if self.read_byte() != b'\\' || self.read_byte() != b'u' {
                return Err(Error::parse(pos, "unpaired surrogate in unicode escape"));
            }
            let low = self.read_hex4(pos)?;
            if !(0xDC00..0xE000).contains(&low) {
                return Err(Error::parse(pos, "unpaired surrogate in unicode escape"));
            }
            let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
            return char::from_u32(code).ok_or_else(|| Error::parse(pos, "invalid unicode escape"));
        }
        char::from_u32(high).ok_or_else(|| Error::parse(pos, "invalid unicode escape"))
    }

    fn read_block_string(&mut self, start: Pos) -> Result<String> {
        let mut buf = Vec::new();
        loop {
            match self.peek() {
                0 if self.is_eof() => return Err(Error::parse(start, "unterminated block string")),
                b'"' if self.peek_at(1) == b'"' && self.peek_at(2) == b'"' => {
                    self.advance(3);
                    break;
                }
                b'\\' if self.peek_at(1) == b'"' && self.peek_at(2) == b'"' && self.peek_at(3) == b'"' => {
                    self.advance(4);
                    buf.extend_from_slice(b"\"\"\"");
                }
                _ => buf.push(self.read_byte()),
            }
        }
        let raw =
            String::from_utf8(buf).map_err(|_| Error::parse(start, "string is not valid UTF-8"))?;
        Ok(block_string_value(&raw))
    }
}

/// Strips common indentation and leading/trailing blank lines from a block
/// string body.
#[must_use]
pub fn block_string_value(raw: &str) -> String {
    let lines: Vec<&str> = raw
        .split('\n')
        .map(|l| l.strip_suffix('\r').unwrap_or(l))
        .collect();

    let indent_of = |l: &str| l.len() - l.trim_start_matches([' ', '\t']).len();
    let is_blank = |l: &str| l.trim_start_matches([' ', '\t']).is_empty();

    let common = lines
        .iter()
        .skip(1)
        .filter(|l| !is_blank(l))
        .map(|l| indent_of(l))
        .min()
        .unwrap_or(0);

    let mut out: Vec<&str> = lines
        .iter()
        .enumerate()
        .map(|(i, l)| match i {
            0 => *l,
            _ if l.len() >= common => &l[common..],
            _ => "",
        })
        .collect();

    while out.first().is_some_and(|l| is_blank(l)) {
        out.remove(0);
    }
    while out.last().is_some_and(|l| is_blank(l)) {
        out.pop();
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_byte_tracks_position() {
        let mut lx = Lexer::new("ab\ncd");
        assert_eq!(lx.pos(), Pos::new(1, 1));
        assert_eq!(lx.read_byte(), b'a');
        assert_eq!(lx.read_byte(), b'b');
        assert_eq!(lx.read_byte(), b'\n');
        assert_eq!(lx.pos(), Pos::new(2, 1));
        assert_eq!(lx.read_byte(), b'c');
        assert_eq!(lx.pos(), Pos::new(2, 2));
    }

    #[test]
    fn test_unread() {
        let mut lx = Lexer::new("a\nb");
        lx.read_byte();
        lx.read_byte();
        assert_eq!(lx.pos(), Pos::new(2, 1));
        lx.unread();
        assert_eq!(lx.pos(), Pos::new(1, 2));
        assert_eq!(lx.read_byte(), b'\n');
    }

    #[test]
    fn test_eof_is_zero() {
        let mut lx = Lexer::new("x");
        assert_eq!(lx.read_byte(), b'x');
        assert_eq!(lx.read_byte(), 0);
        assert_eq!(lx.read_byte(), 0);
        assert!(lx.is_eof());
    }

    #[test]
    fn test_bom_skipped() {
        let src = b"\xEF\xBB\xBFtype";
        let mut lx = Lexer::from_bytes(src);
        assert_eq!(lx.read_token(), "type");
    }

    #[test]
    fn test_skip_space_and_comments() {
        let mut lx = Lexer::new("  , # a comment\n\t# another\n  name");
        assert_eq!(lx.skip_space(), b'n');
        assert_eq!(lx.pos(), Pos::new(3, 3));
        assert_eq!(lx.read_token(), "name");
    }

    #[test]
    fn test_read_runs() {
        let mut lx = Lexer::new("foo_9 -12.5e+3]");
        assert_eq!(lx.read_token(), "foo_9");
        lx.skip_space();
        assert_eq!(lx.read_number_token(), "-12.5e+3");
        assert_eq!(lx.peek(), b']');
    }

    #[test]
    fn test_read_string_escapes() {
        let mut lx = Lexer::new(r#""a\"b\\c\né😀""#);
        assert_eq!(lx.read_string().unwrap(), "a\"b\\c\n\u{e9}\u{1F600}");
    }

    #[test]
    fn test_unterminated_string() {
        let mut lx = Lexer::new("\"abc\ndef\"");
        let err = lx.read_string().unwrap_err();
        assert_eq!(err.to_string(), "parse error: unterminated string at 1:1");
    }

    #[test]
    fn test_block_string() {
        let src = "\"\"\"\n    Hello,\n      World!\n\n    Yours\n  \"\"\"";
        let mut lx = Lexer::new(src);
        assert_eq!(lx.read_string().unwrap(), "Hello,\n  World!\n\nYours");
    }

    #[test]
    fn test_block_string_escaped_quotes() {
        let mut lx = Lexer::new(r#""""say \""" twice""""#);
        assert_eq!(lx.read_string().unwrap(), r#"say """ twice"#);
    }

    #[test]
    fn test_expect() {
        let mut lx = Lexer::new("  { }");
        assert!(lx.expect(b'{').is_ok());
        let err = lx.expect(b'(').unwrap_err();
        assert_eq!(err.to_string(), "parse error: expected '(', found '}' at 1:5");
    }

    #[test]
    fn test_read_name_error() {
        let mut lx = Lexer::new(" :");
        let err = lx.read_name("type name").unwrap_err();
        assert_eq!(err.to_string(), "parse error: expected type name, found ':' at 1:2");
    }

    #[test]
    fn test_from_reader() {
        let lx = Lexer::from_reader(&b"query"[..]).unwrap();
        assert_eq!(lx.peek(), b'q');
    }
}
