//! Input execution: one forward scan that resolves tokens straight into the
//! destination value.
//!
//! Typed destinations recurse once per container and are bounded by
//! [`TYPED_DEPTH_LIMIT`] as well as the configured maximum depth. `Dynamic`
//! values are built on an explicit stack, and raw or skipped values go
//! through the iterative scanner, so those are bounded by `max_depth` only.

use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;

use crate::context::{OptionFlags, RuntimeContext};
use crate::decoder::program::{DecodeNode, DecodeProgram, NodeRef, StructNode};
use crate::decoder::scan::Scanner;
use crate::describe::{HookContext, MapOps, Prim, SeqOps};
use crate::encoder::escape;
use crate::error::{CodecError, Result};
use crate::options::{CancelToken, TYPED_DEPTH_LIMIT};
use crate::types::{Dynamic, Number, RawValue};

/// Decode one JSON value from `input` into `dest` and return the number of
/// bytes consumed (always the whole input; anything but whitespace after the
/// value is a syntax error).
///
/// On failure `dest` may already hold some decoded fields.
pub fn consume_input(ctx: &mut RuntimeContext, program: &DecodeProgram, input: &[u8], dest: &mut dyn Any) -> Result<usize> {
    if (*dest).type_id() != program.key.id() {
        return Err(CodecError::InvalidTarget {
            expected: program.type_name(),
            found: "a value of another type",
        });
    }
    let mut reader = Reader {
        sc: Scanner::new(input),
        depth: 0,
        max_depth: ctx.max_depth,
        flags: ctx.flags,
        cancel: ctx.cancel.as_ref(),
    };
    reader
        .value(program.root.node()?, dest, false)
        .map_err(|e| within(e, |path| path.push('$')))?;
    reader.sc.finish()?;
    Ok(reader.sc.pos)
}

/// Prepend a path segment to a type mismatch travelling up the tree.
fn within(mut err: CodecError, segment: impl FnOnce(&mut String)) -> CodecError {
    if let CodecError::TypeMismatch { path, .. } = &mut err {
        let mut full = String::new();
        segment(&mut full);
        full.push_str(path);
        *path = full;
    }
    err
}

fn mismatch(found: &'static str, type_name: &'static str, offset: usize) -> CodecError {
    CodecError::TypeMismatch {
        found,
        type_name,
        path: String::new(),
        offset,
    }
}

fn wrong_target(expected: &'static str) -> CodecError {
    CodecError::InvalidTarget {
        expected,
        found: "a value of another type",
    }
}

fn store<T: 'static>(dest: &mut dyn Any, value: T, type_name: &'static str) -> Result<()> {
    *dest.downcast_mut::<T>().ok_or_else(|| wrong_target(type_name))? = value;
    Ok(())
}

/// Parse a number literal into a numeric primitive. `None` when it does not
/// fit the destination (overflow, fraction, out of float range).
fn put_number(prim: Prim, text: &str, dest: &mut dyn Any) -> Option<()> {
    macro_rules! int {
        ($ty:ty) => {
            *dest.downcast_mut::<$ty>()? = text.parse::<$ty>().ok()?
        };
    }
    match prim {
        Prim::I8 => int!(i8),
        Prim::I16 => int!(i16),
        Prim::I32 => int!(i32),
        Prim::I64 => int!(i64),
        Prim::Isize => int!(isize),
        Prim::U8 => int!(u8),
        Prim::U16 => int!(u16),
        Prim::U32 => int!(u32),
        Prim::U64 => int!(u64),
        Prim::Usize => int!(usize),
        Prim::F32 => {
            let v = text.parse::<f32>().ok().filter(|v| v.is_finite())?;
            *dest.downcast_mut::<f32>()? = v;
        }
        Prim::F64 => {
            let v = text.parse::<f64>().ok().filter(|v| v.is_finite())?;
            *dest.downcast_mut::<f64>()? = v;
        }
        _ => return None,
    }
    Some(())
}

struct Reader<'i, 'c> {
    sc: Scanner<'i>,
    depth: usize,
    max_depth: usize,
    flags: OptionFlags,
    cancel: Option<&'c CancelToken>,
}

impl<'i, 'c> Reader<'i, 'c> {
    /// Kind of the token at the cursor, for mismatch reports.
    fn token(&self) -> &'static str {
        match self.sc.peek() {
            Some(b'{') => "object",
            Some(b'[') => "array",
            Some(b'"') => "string",
            Some(b't' | b'f') => "bool",
            Some(b'n') => "null",
            Some(b'-' | b'0'..=b'9') => "number",
            _ => "value",
        }
    }

    fn depth_left(&self) -> usize {
        self.max_depth.saturating_sub(self.depth)
    }

    /// Reject the value at the cursor. The value is scanned first so that a
    /// syntax error inside it takes precedence over the mismatch.
    fn reject(&mut self, type_name: &'static str) -> CodecError {
        let offset = self.sc.pos;
        let found = self.token();
        match self.sc.skip_value(self.depth_left()) {
            Err(e) => e,
            Ok(()) => mismatch(found, type_name, offset),
        }
    }

    /// Nesting allowed for containers decoded by the recursive resolvers.
    fn typed_limit(&self) -> usize {
        self.max_depth.min(TYPED_DEPTH_LIMIT)
    }

    fn enter(&mut self, limit: usize) -> Result<()> {
        if self.depth >= limit {
            return Err(CodecError::syntax("exceeded max depth", self.sc.pos));
        }
        if self.cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(CodecError::Cancelled);
        }
        self.depth += 1;
        self.sc.pos += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    /// After a member or element: `true` when another one follows.
    fn separator(&mut self, close: u8) -> Result<bool> {
        self.sc.skip_ws();
        match self.sc.peek() {
            Some(b',') => {
                self.sc.pos += 1;
                Ok(true)
            }
            Some(c) if c == close => {
                self.sc.pos += 1;
                Ok(false)
            }
            _ => Err(self.sc.unexpected(if close == b'}' {
                "after object key:value pair"
            } else {
                "after array element"
            })),
        }
    }

    /// `"key":` at the start of an object member. Returns the key's offset
    /// and unescaped text.
    fn member_key(&mut self) -> Result<(usize, std::borrow::Cow<'i, str>)> {
        self.sc.skip_ws();
        if self.sc.peek() != Some(b'"') {
            return Err(self.sc.unexpected("looking for beginning of object key string"));
        }
        let offset = self.sc.pos;
        let key = self.sc.string()?;
        self.sc.skip_ws();
        self.sc.expect(b':', "after object key")?;
        Ok((offset, key))
    }

    /// Consume the opening bracket and report whether the container is
    /// empty (closing bracket consumed too).
    fn open(&mut self, close: u8, limit: usize) -> Result<bool> {
        self.enter(limit)?;
        self.sc.skip_ws();
        if self.sc.peek() == Some(close) {
            self.sc.pos += 1;
            self.leave();
            return Ok(true);
        }
        Ok(false)
    }

    fn value(&mut self, mut node: &DecodeNode, mut dest: &mut dyn Any, quoted: bool) -> Result<()> {
        self.sc.skip_ws();
        // Options and pointers are unwrapped in place rather than recursed into.
        loop {
            return match node {
                DecodeNode::Option { ops, inner, inner_name } => {
                    if self.sc.peek() == Some(b'n') {
                        self.sc.literal(b"null")?;
                        (ops.clear)(dest);
                        return Ok(());
                    }
                    dest = (ops.get_or_insert)(dest).ok_or(CodecError::UnsupportedType { type_name: *inner_name })?;
                    node = inner.node()?;
                    continue;
                }
                DecodeNode::Pointer { ops, inner, inner_name } => {
                    dest = (ops.deref_mut)(dest).ok_or(CodecError::UnsupportedType { type_name: *inner_name })?;
                    node = inner.node()?;
                    continue;
                }
                DecodeNode::Prim(prim) if quoted => self.quoted(node, prim.type_name(), dest),
                DecodeNode::Number if quoted => self.quoted(node, "Number", dest),
                DecodeNode::Prim(prim) => self.prim(*prim, dest),
                DecodeNode::Number => self.number(dest),
                DecodeNode::Raw => {
                    let start = self.sc.pos;
                    self.sc.skip_value(self.depth_left())?;
                    let text = String::from_utf8_lossy(&self.sc.input[start..self.sc.pos]).into_owned();
                    store(dest, RawValue::new(text), "RawValue")
                }
                DecodeNode::Dynamic => {
                    let value = self.dynamic()?;
                    store(dest, value, "Dynamic")
                }
                DecodeNode::Struct(node) => self.object(node, dest),
                DecodeNode::Seq {
                    ops,
                    elem,
                    elem_name,
                    fixed,
                    type_name,
                } => self.seq(ops, elem, *elem_name, *fixed, *type_name, dest),
                DecodeNode::Map {
                    ops,
                    value,
                    key_name,
                    type_name,
                } => self.map(ops, value, *key_name, *type_name, dest),
                DecodeNode::Hook { call, type_name } => {
                    let start = self.sc.pos;
                    self.sc.skip_value(self.depth_left())?;
                    let cx = HookContext {
                        flags: self.flags,
                        cancel: self.cancel,
                        depth: self.depth,
                    };
                    match call(dest, &self.sc.input[start..self.sc.pos], &cx) {
                        Some(Ok(())) => Ok(()),
                        Some(Err(source)) => Err(CodecError::Hook {
                            type_name: *type_name,
                            routine: "decode_json",
                            source,
                        }),
                        None => Err(wrong_target(*type_name)),
                    }
                }
                DecodeNode::Unsupported { type_name } => Err(CodecError::UnsupportedType { type_name: *type_name }),
            };
        }
    }

    fn prim(&mut self, prim: Prim, dest: &mut dyn Any) -> Result<()> {
        let type_name = prim.type_name();
        let start = self.sc.pos;
        match (prim, self.sc.peek()) {
            (_, Some(b'n')) => self.sc.literal(b"null"),
            (Prim::Bool, Some(b't')) => {
                self.sc.literal(b"true")?;
                store(dest, true, type_name)
            }
            (Prim::Bool, Some(b'f')) => {
                self.sc.literal(b"false")?;
                store(dest, false, type_name)
            }
            (Prim::String, Some(b'"')) => {
                let text = self.sc.string()?.into_owned();
                store(dest, text, type_name)
            }
            (Prim::Char, Some(b'"')) => {
                let text = self.sc.string()?;
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => store(dest, c, type_name),
                    _ => Err(mismatch("string", type_name, start)),
                }
            }
            (p, Some(b'-' | b'0'..=b'9')) if p.is_integer() || p.is_float() => {
                let text = self.sc.number()?;
                put_number(p, text, dest).ok_or_else(|| mismatch("number", type_name, start))
            }
            _ => Err(self.reject(type_name)),
        }
    }

    fn number(&mut self, dest: &mut dyn Any) -> Result<()> {
        let start = self.sc.pos;
        match self.sc.peek() {
            Some(b'n') => self.sc.literal(b"null"),
            Some(b'-' | b'0'..=b'9') => {
                let text = self.sc.number()?;
                store(dest, Number::new(text), "Number")
            }
            // A string holding a valid number literal is accepted as well.
            Some(b'"') => {
                let text = self.sc.string()?;
                if escape::is_number_literal(text.as_bytes()) {
                    store(dest, Number::new(text.into_owned()), "Number")
                } else {
                    Err(mismatch("string", "Number", start))
                }
            }
            _ => Err(self.reject("Number")),
        }
    }

    /// Field tagged `string`: the scalar arrives wrapped in a JSON string.
    fn quoted(&mut self, node: &DecodeNode, type_name: &'static str, dest: &mut dyn Any) -> Result<()> {
        match self.sc.peek() {
            Some(b'n') => self.sc.literal(b"null"),
            Some(b'"') => {
                let start = self.sc.pos;
                let text = self.sc.string()?;
                let mut inner = Reader {
                    sc: Scanner::new(text.as_bytes()),
                    depth: self.depth,
                    max_depth: self.max_depth,
                    flags: self.flags,
                    cancel: self.cancel,
                };
                inner
                    .value(node, dest, false)
                    .and_then(|()| inner.sc.finish())
                    .map_err(|_| mismatch("string", type_name, start))
            }
            _ => Err(self.reject(type_name)),
        }
    }

    fn seq(
        &mut self,
        ops: &SeqOps,
        elem: &NodeRef,
        elem_name: &'static str,
        fixed: bool,
        type_name: &'static str,
        dest: &mut dyn Any,
    ) -> Result<()> {
        match self.sc.peek() {
            Some(b'[') => {}
            Some(b'n') => {
                self.sc.literal(b"null")?;
                (ops.clear)(dest);
                return Ok(());
            }
            _ => return Err(self.reject(type_name)),
        }
        (ops.begin)(dest);
        let mut count = 0;
        if !self.open(b']', self.typed_limit())? {
            let elem = elem.node()?;
            loop {
                match (ops.slot)(dest, count) {
                    Some(slot) => {
                        self.value(elem, slot, false).map_err(|e| {
                            within(e, |path| {
                                let _ = write!(path, "[{count}]");
                            })
                        })?;
                        count += 1;
                    }
                    // Extra elements beyond a fixed array's length are dropped.
                    None if fixed => {
                        self.sc.skip_ws();
                        self.sc.skip_value(self.depth_left())?;
                    }
                    None => return Err(CodecError::UnsupportedType { type_name: elem_name }),
                }
                if !self.separator(b']')? {
                    break;
                }
            }
            self.leave();
        }
        (ops.finish)(dest, count);
        Ok(())
    }

    fn map(
        &mut self,
        ops: &MapOps,
        value: &NodeRef,
        key_name: &'static str,
        type_name: &'static str,
        dest: &mut dyn Any,
    ) -> Result<()> {
        match self.sc.peek() {
            Some(b'{') => {}
            Some(b'n') => {
                self.sc.literal(b"null")?;
                (ops.clear)(dest);
                return Ok(());
            }
            _ => return Err(self.reject(type_name)),
        }
        if self.open(b'}', self.typed_limit())? {
            return Ok(());
        }
        let value = value.node()?;
        let mut seen = self.flags.contains(OptionFlags::FIRST_WINS).then(HashSet::new);
        loop {
            let (offset, key) = self.member_key()?;
            let duplicate = seen.as_mut().is_some_and(|seen| !seen.insert(key.clone().into_owned()));
            if duplicate {
                self.sc.skip_ws();
                self.sc.skip_value(self.depth_left())?;
            } else {
                let slot = (ops.slot)(dest, &key).ok_or_else(|| mismatch("string", key_name, offset))?;
                self.value(value, slot, false).map_err(|e| {
                    within(e, |path| {
                        path.push('.');
                        path.push_str(&key);
                    })
                })?;
            }
            if !self.separator(b'}')? {
                break;
            }
        }
        self.leave();
        Ok(())
    }

    fn object(&mut self, node: &StructNode, dest: &mut dyn Any) -> Result<()> {
        match self.sc.peek() {
            Some(b'{') => {}
            Some(b'n') => return self.sc.literal(b"null"),
            _ => return Err(self.reject(node.type_name)),
        }
        if self.open(b'}', self.typed_limit())? {
            return Ok(());
        }
        let first_wins = self.flags.contains(OptionFlags::FIRST_WINS);
        let deny_unknown = self.flags.contains(OptionFlags::DENY_UNKNOWN);
        let mut seen = if first_wins { vec![false; node.slots.len()] } else { Vec::new() };
        loop {
            let (offset, key) = self.member_key()?;
            match node.lookup.find(&key) {
                Some(index) if first_wins && seen[index] => {
                    self.sc.skip_ws();
                    self.sc.skip_value(self.depth_left())?;
                }
                Some(index) => {
                    if first_wins {
                        seen[index] = true;
                    }
                    let slot = &node.slots[index];
                    let field = slot.path.get_mut(dest).ok_or_else(|| wrong_target(node.type_name))?;
                    self.value(slot.node.node()?, field, slot.quoted).map_err(|e| {
                        within(e, |path| {
                            path.push('.');
                            path.push_str(&slot.name);
                        })
                    })?;
                }
                None if deny_unknown => {
                    return Err(CodecError::UnknownField {
                        key: key.into_owned(),
                        type_name: node.type_name,
                        offset,
                    })
                }
                None => {
                    self.sc.skip_ws();
                    self.sc.skip_value(self.depth_left())?;
                }
            }
            if !self.separator(b'}')? {
                break;
            }
        }
        self.leave();
        Ok(())
    }

    /// Generic value for a [`Dynamic`] destination.
    fn dynamic(&mut self) -> Result<Dynamic> {
        let limit = self.max_depth;
        let first_wins = self.flags.contains(OptionFlags::FIRST_WINS);
        let mut stack: Vec<Open> = Vec::new();
        loop {
            self.sc.skip_ws();
            let mut value = match self.sc.peek() {
                Some(b'[') => {
                    if self.open(b']', limit)? {
                        Dynamic::new(Vec::<Dynamic>::new())
                    } else {
                        stack.push(Open::Array(Vec::new()));
                        continue;
                    }
                }
                Some(b'{') => {
                    if self.open(b'}', limit)? {
                        Dynamic::new(BTreeMap::<String, Dynamic>::new())
                    } else {
                        let (_, key) = self.member_key()?;
                        stack.push(Open::Object {
                            map: BTreeMap::new(),
                            key: key.into_owned(),
                        });
                        continue;
                    }
                }
                _ => self.dynamic_scalar()?,
            };
            // Hand the finished value to its parent, closing every container
            // it completes.
            loop {
                let Some(mut parent) = stack.pop() else {
                    return Ok(value);
                };
                let more = match &mut parent {
                    Open::Array(items) => {
                        items.push(value);
                        self.separator(b']')?
                    }
                    Open::Object { map, key } => {
                        map.insert(std::mem::take(key), value);
                        match self.next_member(map, first_wins)? {
                            Some(next) => {
                                *key = next;
                                true
                            }
                            None => false,
                        }
                    }
                };
                if more {
                    stack.push(parent);
                    break;
                }
                self.leave();
                value = parent.finish();
            }
        }
    }

    /// Key of the next member to keep, or `None` once the object closes.
    /// Under first-wins, members repeating a key already in `map` are
    /// validated and dropped.
    fn next_member(&mut self, map: &BTreeMap<String, Dynamic>, first_wins: bool) -> Result<Option<String>> {
        while self.separator(b'}')? {
            let (_, key) = self.member_key()?;
            if first_wins && map.contains_key(key.as_ref()) {
                self.sc.skip_ws();
                self.sc.skip_value(self.depth_left())?;
                continue;
            }
            return Ok(Some(key.into_owned()));
        }
        Ok(None)
    }

    fn dynamic_scalar(&mut self) -> Result<Dynamic> {
        match self.sc.peek() {
            Some(b'"') => Ok(Dynamic::new(self.sc.string()?.into_owned())),
            Some(b't') => {
                self.sc.literal(b"true")?;
                Ok(Dynamic::new(true))
            }
            Some(b'f') => {
                self.sc.literal(b"false")?;
                Ok(Dynamic::new(false))
            }
            Some(b'n') => {
                self.sc.literal(b"null")?;
                Ok(Dynamic::null())
            }
            Some(b'-' | b'0'..=b'9') => {
                let start = self.sc.pos;
                let text = self.sc.number()?;
                if self.flags.contains(OptionFlags::USE_NUMBER) {
                    return Ok(Dynamic::new(Number::new(text)));
                }
                match text.parse::<f64>() {
                    Ok(v) if v.is_finite() => Ok(Dynamic::new(v)),
                    _ => Err(mismatch("number", "f64", start)),
                }
            }
            _ => Err(self.sc.unexpected("looking for beginning of value")),
        }
    }
}

/// A container on the dynamic walk's stack, still collecting members.
enum Open {
    Array(Vec<Dynamic>),
    Object { map: BTreeMap<String, Dynamic>, key: String },
}

impl Open {
    fn finish(self) -> Dynamic {
        match self {
            Open::Array(items) => Dynamic::new(items),
            Open::Object { map, .. } => Dynamic::new(map),
        }
    }
}
