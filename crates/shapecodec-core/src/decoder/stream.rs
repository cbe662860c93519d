//! Incremental decoding of consecutive top-level values from a reader.

use std::io::{self, Read};

use crate::cache;
use crate::context;
use crate::decoder::engine::consume_input;
use crate::describe::Describe;
use crate::error::{CodecError, Result};
use crate::options::DecodeOptions;
use crate::types::{Dynamic, Number};

const READ_CHUNK: usize = 4096;

/// One lexical step of the input, as returned by [`StreamDecoder::token`].
///
/// Commas and colons are consumed silently; object keys arrive as
/// [`Token::String`].
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// One of `[`, `]`, `{` or `}`.
    Delim(char),
    Bool(bool),
    /// A number, when `use_number` is set.
    Number(Number),
    Float(f64),
    String(String),
    Null,
}

/// Where the token reader stands inside the enclosing container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    TopValue,
    ArrayStart,
    ArrayValue,
    ArrayComma,
    ObjectStart,
    ObjectKey,
    ObjectColon,
    ObjectValue,
    ObjectComma,
}

impl Phase {
    fn value_allowed(self) -> bool {
        matches!(
            self,
            Phase::TopValue | Phase::ArrayStart | Phase::ArrayValue | Phase::ObjectValue
        )
    }

    /// State after a complete value has been read in this position.
    fn after_value(self) -> Phase {
        match self {
            Phase::ArrayStart | Phase::ArrayValue => Phase::ArrayComma,
            Phase::ObjectValue => Phase::ObjectComma,
            other => other,
        }
    }
}

/// Finds where the next top-level value ends. State survives across refills,
/// so bytes are examined once no matter how the input is chunked.
///
/// Only structure is tracked here; the value is validated when it is decoded.
#[derive(Debug, Default, Clone, Copy)]
struct Boundary {
    started: bool,
    depth: usize,
    in_string: bool,
    escaped: bool,
    scalar: bool,
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'\t' | b'\n' | b'\r' | b',' | b':' | b'[' | b']' | b'{' | b'}' | b'"'
    )
}

impl Boundary {
    /// Scan `bytes[from..]`. Returns the exclusive end of the value once it
    /// is complete.
    fn advance(&mut self, bytes: &[u8], from: usize) -> Option<usize> {
        for (i, &b) in bytes.iter().enumerate().skip(from) {
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                    if self.depth == 0 {
                        return Some(i + 1);
                    }
                }
                continue;
            }
            if self.scalar {
                if is_delimiter(b) {
                    return Some(i);
                }
                continue;
            }
            match b {
                b' ' | b'\t' | b'\n' | b'\r' => {}
                b'"' => {
                    self.started = true;
                    self.in_string = true;
                }
                b'{' | b'[' => {
                    self.started = true;
                    self.depth += 1;
                }
                // A stray closer at the top level ends the "value" too; the
                // decoder reports it.
                b'}' | b']' => {
                    self.started = true;
                    if self.depth <= 1 {
                        return Some(i + 1);
                    }
                    self.depth -= 1;
                }
                _ if self.depth > 0 => {}
                b',' | b':' => return Some(i + 1),
                _ => {
                    self.started = true;
                    self.scalar = true;
                }
            }
        }
        None
    }
}

/// Reads a sequence of JSON values from `R`.
///
/// ```
/// use shapecodec_core::StreamDecoder;
///
/// let mut dec = StreamDecoder::new(&b"1 [2] 3"[..]);
/// let (mut a, mut b, mut c) = (0u8, Vec::<u8>::new(), 0u8);
/// dec.decode(&mut a).unwrap();
/// dec.decode(&mut b).unwrap();
/// assert!(dec.more());
/// dec.decode(&mut c).unwrap();
/// assert!(!dec.more());
/// assert_eq!((a, b, c), (1, vec![2], 3));
/// ```
///
/// [`token`](Self::token) steps into containers, after which `decode` and
/// `more` operate on their elements:
///
/// ```
/// use shapecodec_core::{StreamDecoder, Token};
///
/// let mut dec = StreamDecoder::new(&b"[1, 2]"[..]);
/// assert_eq!(dec.token().unwrap(), Token::Delim('['));
/// let mut sum = 0u32;
/// while dec.more() {
///     let mut n = 0u32;
///     dec.decode(&mut n).unwrap();
///     sum += n;
/// }
/// assert_eq!(dec.token().unwrap(), Token::Delim(']'));
/// assert_eq!(sum, 3);
/// ```
pub struct StreamDecoder<R> {
    reader: R,
    buf: Vec<u8>,
    /// Start of unconsumed bytes in `buf`.
    pos: usize,
    /// Bytes of `buf` already examined by `boundary`.
    scan: usize,
    /// Stream offset of `buf[0]`.
    base: usize,
    boundary: Boundary,
    eof: bool,
    pending: Option<CodecError>,
    options: DecodeOptions,
    phase: Phase,
    /// Phases of the enclosing containers entered through `token`.
    parents: Vec<Phase>,
}

impl<R: Read> StreamDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self::with_options(reader, DecodeOptions::default())
    }

    pub fn with_options(reader: R, options: DecodeOptions) -> Self {
        StreamDecoder {
            reader,
            buf: Vec::new(),
            pos: 0,
            scan: 0,
            base: 0,
            boundary: Boundary::default(),
            eof: false,
            pending: None,
            options,
            phase: Phase::TopValue,
            parents: Vec::new(),
        }
    }

    pub fn options(&self) -> &DecodeOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut DecodeOptions {
        &mut self.options
    }

    /// Decode the next value into `dest`.
    ///
    /// At the end of the stream this fails with an I/O error of kind
    /// `UnexpectedEof`. Syntax offsets are relative to the whole stream.
    pub fn decode<T: Describe>(&mut self, dest: &mut T) -> Result<()> {
        if let Some(err) = self.pending.take() {
            return Err(err);
        }
        self.expect_value()?;
        self.read_value(dest)?;
        self.phase = self.phase.after_value();
        Ok(())
    }

    /// Read the next token.
    ///
    /// Delimiters move the reader into and out of containers; scalars are
    /// read whole. Misplaced delimiters, commas and colons are syntax
    /// errors. At the end of the stream this fails like [`decode`](Self::decode).
    pub fn token(&mut self) -> Result<Token> {
        if let Some(err) = self.pending.take() {
            return Err(err);
        }
        loop {
            let Some(b) = self.peek()? else {
                let message = if self.parents.is_empty() {
                    "no more JSON values"
                } else {
                    "unexpected end of JSON input"
                };
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, message).into());
            };
            match b {
                b'[' | b'{' => {
                    if !self.phase.value_allowed() {
                        return Err(self.misplaced(b));
                    }
                    self.consume();
                    self.parents.push(self.phase);
                    self.phase = if b == b'[' { Phase::ArrayStart } else { Phase::ObjectStart };
                    return Ok(Token::Delim(b as char));
                }
                b']' | b'}' => {
                    let closes = if b == b']' {
                        matches!(self.phase, Phase::ArrayStart | Phase::ArrayComma)
                    } else {
                        matches!(self.phase, Phase::ObjectStart | Phase::ObjectComma)
                    };
                    let Some(parent) = self.parents.last().copied().filter(|_| closes) else {
                        return Err(self.misplaced(b));
                    };
                    self.consume();
                    self.parents.pop();
                    self.phase = parent.after_value();
                    return Ok(Token::Delim(b as char));
                }
                b':' => {
                    if self.phase != Phase::ObjectColon {
                        return Err(self.misplaced(b));
                    }
                    self.consume();
                    self.phase = Phase::ObjectValue;
                }
                b',' => {
                    self.phase = match self.phase {
                        Phase::ArrayComma => Phase::ArrayValue,
                        Phase::ObjectComma => Phase::ObjectKey,
                        _ => return Err(self.misplaced(b)),
                    };
                    self.consume();
                }
                b'"' if matches!(self.phase, Phase::ObjectStart | Phase::ObjectKey) => {
                    let mut key = String::new();
                    self.read_value(&mut key)?;
                    self.phase = Phase::ObjectColon;
                    return Ok(Token::String(key));
                }
                _ => {
                    if !self.phase.value_allowed() {
                        return Err(self.misplaced(b));
                    }
                    let mut value = Dynamic::null();
                    self.read_value(&mut value)?;
                    self.phase = self.phase.after_value();
                    return Ok(scalar_token(&value));
                }
            }
        }
    }

    /// Whether another value follows in the current array, object or
    /// top-level sequence.
    ///
    /// A read error is remembered and returned by the next [`decode`](Self::decode).
    pub fn more(&mut self) -> bool {
        match self.peek() {
            Ok(Some(b)) => b != b']' && b != b'}',
            Ok(None) => false,
            Err(err) => {
                self.pending = Some(err);
                true
            }
        }
    }

    /// Stream offset just past the last consumed byte.
    pub fn input_offset(&self) -> usize {
        self.base + self.pos
    }

    /// Bytes read from the reader but not yet consumed.
    pub fn buffered(&self) -> &[u8] {
        &self.buf[self.pos..]
    }

    fn read_value<T: Describe>(&mut self, dest: &mut T) -> Result<()> {
        let program = cache::decoder_for::<T>()?;
        let end = self.next_value()?;
        let start = self.pos;
        let offset = self.base + start;

        let mut ctx = context::acquire();
        ctx.apply_decode(&self.options);
        let result = consume_input(&mut ctx, &program, &self.buf[start..end], dest);

        self.pos = end;
        self.scan = end;
        self.boundary = Boundary::default();
        tracing::trace!(offset, len = end - start, "decoded stream value");
        result.map(|_| ()).map_err(|e| e.rebase(offset))
    }

    /// Consume the separator owed before a value inside a container entered
    /// through `token`.
    fn expect_value(&mut self) -> Result<()> {
        let (byte, next) = match self.phase {
            Phase::ArrayComma => (b',', Phase::ArrayValue),
            Phase::ObjectColon => (b':', Phase::ObjectValue),
            _ => return Ok(()),
        };
        match self.peek()? {
            Some(b) if b == byte => {
                self.consume();
                self.phase = next;
                Ok(())
            }
            Some(b) => Err(self.misplaced(b)),
            None => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of JSON input").into()),
        }
    }

    /// Next non-whitespace byte, left unconsumed. `None` at end of input.
    fn peek(&mut self) -> Result<Option<u8>> {
        loop {
            while let Some(&b) = self.buf.get(self.pos) {
                if matches!(b, b' ' | b'\t' | b'\n' | b'\r') {
                    self.pos += 1;
                } else {
                    self.scan = self.scan.max(self.pos);
                    return Ok(Some(b));
                }
            }
            self.scan = self.scan.max(self.pos);
            if self.eof || !self.refill()? {
                return Ok(None);
            }
        }
    }

    fn consume(&mut self) {
        self.pos += 1;
        self.scan = self.pos;
        self.boundary = Boundary::default();
    }

    fn misplaced(&self, b: u8) -> CodecError {
        let what = match self.phase {
            Phase::ArrayComma => "after array element",
            Phase::ObjectStart | Phase::ObjectKey => "looking for object key",
            Phase::ObjectColon => "after object key",
            Phase::ObjectComma => "after object key:value pair",
            _ => "looking for beginning of value",
        };
        CodecError::syntax(
            format!("invalid character '{}' {what}", b as char),
            self.base + self.pos,
        )
    }

    fn next_value(&mut self) -> Result<usize> {
        loop {
            if let Some(end) = self.boundary.advance(&self.buf, self.scan) {
                return Ok(end);
            }
            self.scan = self.buf.len();
            if self.eof || !self.refill()? {
                if self.boundary.scalar {
                    return Ok(self.buf.len());
                }
                let message = if self.boundary.started {
                    "unexpected end of JSON input"
                } else {
                    "no more JSON values"
                };
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, message).into());
            }
        }
    }

    /// Read more bytes. `false` at end of input.
    fn refill(&mut self) -> Result<bool> {
        if self.options.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(CodecError::Cancelled);
        }
        if self.pos > 0 {
            self.buf.drain(..self.pos);
            self.base += self.pos;
            self.scan -= self.pos;
            self.pos = 0;
        }
        let len = self.buf.len();
        self.buf.resize(len + READ_CHUNK, 0);
        loop {
            match self.reader.read(&mut self.buf[len..]) {
                Ok(0) => {
                    self.buf.truncate(len);
                    self.eof = true;
                    return Ok(false);
                }
                Ok(n) => {
                    self.buf.truncate(len + n);
                    return Ok(true);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buf.truncate(len);
                    return Err(e.into());
                }
            }
        }
    }
}

fn scalar_token(value: &Dynamic) -> Token {
    if let Some(b) = value.as_bool() {
        Token::Bool(b)
    } else if let Some(s) = value.as_str() {
        Token::String(s.to_owned())
    } else if let Some(n) = value.as_number() {
        Token::Number(n.clone())
    } else if let Some(f) = value.as_f64() {
        Token::Float(f)
    } else {
        Token::Null
    }
}
