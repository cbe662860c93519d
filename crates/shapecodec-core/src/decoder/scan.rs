//! Byte-level JSON lexing shared by the decoder, the validator and the
//! output splicer.

use std::borrow::Cow;

use crate::error::{CodecError, Result};

const REPLACEMENT: char = '\u{FFFD}';

pub(crate) struct Scanner<'i> {
    pub(crate) input: &'i [u8],
    pub(crate) pos: usize,
}

/// Render a byte for an error message.
fn quote_byte(b: u8) -> String {
    match b {
        b'\'' => r"'\''".to_string(),
        b'"' => "'\"'".to_string(),
        0x20..=0x7e => format!("'{}'", b as char),
        _ => format!("byte 0x{b:02x}"),
    }
}

impl<'i> Scanner<'i> {
    pub(crate) fn new(input: &'i [u8]) -> Self {
        Scanner { input, pos: 0 }
    }

    #[inline]
    pub(crate) fn skip_ws(&mut self) {
        while let Some(b' ' | b'\t' | b'\n' | b'\r') = self.input.get(self.pos) {
            self.pos += 1;
        }
    }

    #[inline]
    pub(crate) fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    #[inline]
    pub(crate) fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Syntax error at the current position.
    pub(crate) fn unexpected(&self, context: &str) -> CodecError {
        match self.peek() {
            None => CodecError::syntax("unexpected end of JSON input", self.pos),
            Some(b) => CodecError::syntax(format!("invalid character {} {context}", quote_byte(b)), self.pos),
        }
    }

    pub(crate) fn expect(&mut self, byte: u8, context: &str) -> Result<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected(context))
        }
    }

    /// Consume `word` (`true`, `false` or `null`).
    pub(crate) fn literal(&mut self, word: &'static [u8]) -> Result<()> {
        for (i, &want) in word.iter().enumerate() {
            match self.input.get(self.pos + i) {
                Some(&got) if got == want => {}
                Some(&got) => {
                    return Err(CodecError::syntax(
                        format!(
                            "invalid character {} in literal {} (expecting {})",
                            quote_byte(got),
                            String::from_utf8_lossy(word),
                            quote_byte(want)
                        ),
                        self.pos + i,
                    ))
                }
                None => return Err(CodecError::syntax("unexpected end of JSON input", self.pos + i)),
            }
        }
        self.pos += word.len();
        Ok(())
    }

    fn digits(&mut self) {
        while let Some(b'0'..=b'9') = self.peek() {
            self.pos += 1;
        }
    }

    /// Consume a number literal and return its text.
    pub(crate) fn number(&mut self) -> Result<&'i str> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        match self.peek() {
            Some(b'0') => self.pos += 1,
            Some(b'1'..=b'9') => self.digits(),
            _ => return Err(self.unexpected("in numeric literal")),
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(self.unexpected("after decimal point in numeric literal"));
            }
            self.digits();
        }
        if let Some(b'e' | b'E') = self.peek() {
            self.pos += 1;
            if let Some(b'+' | b'-') = self.peek() {
                self.pos += 1;
            }
            if !matches!(self.peek(), Some(b'0'..=b'9')) {
                return Err(self.unexpected("in exponent of numeric literal"));
            }
            self.digits();
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .map_err(|_| CodecError::syntax("invalid numeric literal", start))
    }

    /// Consume a string literal, validating escapes. Returns the content
    /// span (between the quotes) and whether it contains escapes.
    pub(crate) fn string_span(&mut self) -> Result<(usize, usize, bool)> {
        self.expect(b'"', "looking for beginning of string")?;
        let start = self.pos;
        let mut escaped = false;
        loop {
            let Some(b) = self.peek() else {
                return Err(CodecError::syntax("unexpected end of JSON input", self.pos));
            };
            match b {
                b'"' => {
                    let end = self.pos;
                    self.pos += 1;
                    return Ok((start, end, escaped));
                }
                b'\\' => {
                    escaped = true;
                    self.pos += 1;
                    match self.peek() {
                        Some(b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't') => self.pos += 1,
                        Some(b'u') => {
                            self.pos += 1;
                            for _ in 0..4 {
                                if !matches!(self.peek(), Some(b) if b.is_ascii_hexdigit()) {
                                    return Err(self.unexpected("in \\u hexadecimal character escape"));
                                }
                                self.pos += 1;
                            }
                        }
                        _ => return Err(self.unexpected("in string escape code")),
                    }
                }
                0x00..=0x1f => return Err(self.unexpected("in string literal")),
                _ => self.pos += 1,
            }
        }
    }

    /// Consume a string literal and return its unescaped text.
    /// Invalid UTF-8 and unpaired surrogates become U+FFFD.
    pub(crate) fn string(&mut self) -> Result<Cow<'i, str>> {
        let (start, end, escaped) = self.string_span()?;
        let raw = &self.input[start..end];
        if escaped {
            Ok(Cow::Owned(unescape(raw)))
        } else {
            Ok(String::from_utf8_lossy(raw))
        }
    }

    /// Consume one value of any shape, validating it. `depth_left` bounds
    /// the nesting allowed below the current position.
    pub(crate) fn skip_value(&mut self, depth_left: usize) -> Result<()> {
        let mut closers: Vec<u8> = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                Some(open @ (b'{' | b'[')) => {
                    if closers.len() >= depth_left {
                        return Err(CodecError::syntax("exceeded max depth", self.pos));
                    }
                    self.pos += 1;
                    self.skip_ws();
                    let close = if open == b'{' { b'}' } else { b']' };
                    if self.peek() == Some(close) {
                        self.pos += 1;
                    } else {
                        closers.push(close);
                        if open == b'{' {
                            self.object_key()?;
                        }
                        continue;
                    }
                }
                Some(b'"') => {
                    self.string_span()?;
                }
                Some(b't') => self.literal(b"true")?,
                Some(b'f') => self.literal(b"false")?,
                Some(b'n') => self.literal(b"null")?,
                Some(b'-' | b'0'..=b'9') => {
                    self.number()?;
                }
                _ => return Err(self.unexpected("looking for beginning of value")),
            }

            // A value is complete: close containers until one continues.
            loop {
                let Some(&close) = closers.last() else {
                    return Ok(());
                };
                self.skip_ws();
                match self.peek() {
                    Some(b',') => {
                        self.pos += 1;
                        if close == b'}' {
                            self.object_key()?;
                        }
                        break;
                    }
                    Some(c) if c == close => {
                        self.pos += 1;
                        closers.pop();
                    }
                    _ => {
                        return Err(self.unexpected(if close == b'}' {
                            "after object key:value pair"
                        } else {
                            "after array element"
                        }))
                    }
                }
            }
        }
    }

    /// `"key" :` inside an object being skipped or spliced.
    pub(crate) fn object_key(&mut self) -> Result<(usize, usize)> {
        self.skip_ws();
        if self.peek() != Some(b'"') {
            return Err(self.unexpected("looking for beginning of object key string"));
        }
        let start = self.pos;
        self.string_span()?;
        let end = self.pos;
        self.skip_ws();
        self.expect(b':', "after object key")?;
        Ok((start, end))
    }

    /// Everything after the top-level value must be whitespace.
    pub(crate) fn finish(&mut self) -> Result<()> {
        self.skip_ws();
        if self.at_end() {
            Ok(())
        } else {
            Err(self.unexpected("after top-level value"))
        }
    }
}

fn hex4(bytes: Option<&[u8]>) -> Option<u32> {
    let bytes = bytes?;
    if bytes.len() != 4 {
        return None;
    }
    let mut v = 0u32;
    for &b in bytes {
        v = (v << 4) | (b as char).to_digit(16)?;
    }
    Some(v)
}

/// Decode escapes in validated string content.
pub(crate) fn unescape(raw: &[u8]) -> String {
    let mut out: Vec<u8> = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        if b != b'\\' {
            out.push(b);
            i += 1;
            continue;
        }
        let Some(&code) = raw.get(i + 1) else {
            break;
        };
        i += 2;
        let simple = match code {
            b'"' => Some(b'"'),
            b'\\' => Some(b'\\'),
            b'/' => Some(b'/'),
            b'b' => Some(0x08),
            b'f' => Some(0x0c),
            b'n' => Some(b'\n'),
            b'r' => Some(b'\r'),
            b't' => Some(b'\t'),
            _ => None,
        };
        if let Some(byte) = simple {
            out.push(byte);
            continue;
        }
        let Some(unit) = hex4(raw.get(i..i + 4)) else {
            break;
        };
        i += 4;
        let ch = match unit {
            0xD800..=0xDBFF => {
                let low = if raw.get(i) == Some(&b'\\') && raw.get(i + 1) == Some(&b'u') {
                    hex4(raw.get(i + 2..i + 6)).filter(|low| (0xDC00..=0xDFFF).contains(low))
                } else {
                    None
                };
                match low {
                    Some(low) => {
                        i += 6;
                        char::from_u32(0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00)).unwrap_or(REPLACEMENT)
                    }
                    None => REPLACEMENT,
                }
            }
            0xDC00..=0xDFFF => REPLACEMENT,
            _ => char::from_u32(unit).unwrap_or(REPLACEMENT),
        };
        let mut buf = [0u8; 4];
        out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
    }
    match String::from_utf8(out) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

/// Whether `input` is exactly one well-formed JSON value (surrounding
/// whitespace allowed).
pub fn valid(input: &[u8]) -> bool {
    let mut sc = Scanner::new(input);
    sc.skip_value(usize::MAX).is_ok() && sc.finish().is_ok()
}
