//! The output interpreter.
//!
//! A single loop over the program's instruction stream. Nested values are
//! tracked on explicit stacks (current-value stack, loop-state stack, call
//! frames for recursion and dynamic dispatch), so deep data never deepens the
//! native call stack.

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;

use crate::cache;
use crate::context::OptionFlags;
use crate::describe::{cast, HookContext, Prim};
use crate::encoder::emit::{Class, Emitter, Layout, Paint};
use crate::encoder::escape;
use crate::encoder::program::{EncodeProgram, Op};
use crate::encoder::splice::splice;
use crate::error::{CodecError, Result};
use crate::options::CancelToken;
use crate::types::{Dynamic, Number, RawValue};

enum Loop<'v> {
    Seq {
        seq: &'v dyn Any,
        get: fn(&dyn Any, usize) -> Option<&dyn Any>,
        index: usize,
        len: usize,
    },
    Map {
        entries: Vec<(Cow<'v, str>, &'v dyn Any)>,
        index: usize,
    },
}

struct Frame<'v> {
    program: Arc<EncodeProgram>,
    pc: usize,
    cur: &'v dyn Any,
    /// In-flight address to release when the callee returns.
    release: Option<usize>,
}

enum Step<'v> {
    Next,
    Jump(usize),
    Call {
        program: Arc<EncodeProgram>,
        cur: &'v dyn Any,
        release: Option<usize>,
    },
}

pub(crate) struct Machine<'r, L, P> {
    pub(crate) emit: Emitter<'r, L, P>,
    pub(crate) in_flight: &'r mut HashSet<usize>,
    pub(crate) max_depth: usize,
    pub(crate) cancel: Option<&'r CancelToken>,
    pub(crate) flags: OptionFlags,
    pub(crate) unordered: bool,
    pub(crate) debug: bool,
}

fn mismatch(expected: &'static str) -> CodecError {
    CodecError::InvalidTarget {
        expected,
        found: "a value of another type",
    }
}

fn corrupt(what: &str) -> CodecError {
    CodecError::unsupported_value(format!("malformed encode program: {what}"))
}

fn cycle(type_name: &str) -> CodecError {
    CodecError::unsupported_value(format!("encountered a cycle via {type_name}"))
}

impl<L: Layout, P: Paint> Machine<'_, L, P> {
    pub(crate) fn run(&mut self, program: &Arc<EncodeProgram>, root: &dyn Any) -> Result<()> {
        let result = self.exec(program, root);
        if self.debug {
            if let Err(err) = &result {
                tracing::debug!(error = %err, "encode failed\n{program}");
            }
        }
        result
    }

    fn check_cancelled(&self) -> Result<()> {
        match self.cancel {
            Some(token) if token.is_cancelled() => Err(CodecError::Cancelled),
            _ => Ok(()),
        }
    }

    fn descend(&self, depth: &mut usize) -> Result<()> {
        self.check_cancelled()?;
        *depth += 1;
        if *depth > self.max_depth {
            return Err(CodecError::unsupported_value(format!(
                "exceeded max depth of {}",
                self.max_depth
            )));
        }
        Ok(())
    }

    fn exec<'v>(&mut self, root_program: &Arc<EncodeProgram>, root: &'v dyn Any) -> Result<()> {
        let mut program = root_program.clone();
        let mut pc = 0usize;
        let mut cur: &'v dyn Any = root;
        let mut values: Vec<&'v dyn Any> = Vec::new();
        let mut loops: Vec<Loop<'v>> = Vec::new();
        let mut frames: Vec<Frame<'v>> = Vec::new();
        let mut tracked: Vec<usize> = Vec::new();
        let mut depth = 0usize;

        loop {
            if pc >= program.ops.len() {
                let Some(frame) = frames.pop() else {
                    return Ok(());
                };
                if let Some(addr) = frame.release {
                    self.in_flight.remove(&addr);
                }
                depth -= 1;
                program = frame.program;
                pc = frame.pc;
                cur = frame.cur;
                continue;
            }

            let op = &program.ops[pc];
            if self.debug {
                tracing::trace!(program = program.type_name(), pc, op = ?op, "exec");
            }

            let step = match op {
                Op::Prim { prim, quoted } => {
                    write_prim(&mut self.emit, *prim, cur, *quoted)?;
                    Step::Next
                }
                Op::Number { quoted } => {
                    let n = cast::<Number>(cur).ok_or_else(|| mismatch("Number"))?;
                    write_number(&mut self.emit, n, *quoted)?;
                    Step::Next
                }
                Op::Raw => {
                    let raw = cast::<RawValue>(cur).ok_or_else(|| mismatch("RawValue"))?;
                    if raw.get().is_empty() {
                        self.emit.null();
                    } else {
                        splice(&mut self.emit, raw.get().as_bytes()).map_err(|e| CodecError::Hook {
                            type_name: "RawValue",
                            routine: "encode_json",
                            source: Box::new(e),
                        })?;
                    }
                    Step::Next
                }
                Op::BeginObject => {
                    self.descend(&mut depth)?;
                    self.emit.begin_object();
                    Step::Next
                }
                Op::EndObject => {
                    self.emit.end_object();
                    depth -= 1;
                    Step::Next
                }
                Op::Key { plain, html } => {
                    self.emit.key_literal(if self.emit.escape_html() { html } else { plain });
                    Step::Next
                }
                Op::Enter { field, path } => {
                    let value = path.get(cur).ok_or_else(|| corrupt(&format!("field {field} not reachable")))?;
                    values.push(cur);
                    cur = value;
                    Step::Next
                }
                Op::Leave => {
                    cur = values.pop().ok_or_else(|| corrupt("value stack underflow"))?;
                    Step::Next
                }
                Op::SkipIfEmpty { check, target } => {
                    if check.is_empty(cur) {
                        Step::Jump(*target)
                    } else {
                        Step::Next
                    }
                }
                Op::OptionEnter { ops, target } => match (ops.get)(cur) {
                    Some(inner) => {
                        values.push(cur);
                        cur = inner;
                        Step::Next
                    }
                    None => {
                        self.emit.null();
                        Step::Jump(*target)
                    }
                },
                Op::Deref { ops, shared, type_name } => {
                    let inner = (ops.deref)(cur).ok_or_else(|| mismatch(*type_name))?;
                    if *shared {
                        let addr = (ops.addr)(cur);
                        if !self.in_flight.insert(addr) {
                            return Err(cycle(type_name));
                        }
                        tracked.push(addr);
                    }
                    values.push(cur);
                    cur = inner;
                    Step::Next
                }
                Op::LeaveDeref { shared } => {
                    if *shared {
                        if let Some(addr) = tracked.pop() {
                            self.in_flight.remove(&addr);
                        }
                    }
                    cur = values.pop().ok_or_else(|| corrupt("value stack underflow"))?;
                    Step::Next
                }
                Op::SeqBegin { ops, end } => {
                    self.descend(&mut depth)?;
                    self.emit.begin_array();
                    let len = (ops.len)(cur);
                    if len == 0 {
                        self.emit.end_array();
                        depth -= 1;
                        Step::Jump(*end)
                    } else {
                        let first = (ops.get)(cur, 0).ok_or_else(|| corrupt("sequence element missing"))?;
                        loops.push(Loop::Seq {
                            seq: cur,
                            get: ops.get,
                            index: 0,
                            len,
                        });
                        values.push(cur);
                        self.emit.element();
                        cur = first;
                        Step::Next
                    }
                }
                Op::SeqNext { body } => {
                    self.check_cancelled()?;
                    let Some(Loop::Seq { seq, get, index, len }) = loops.last_mut() else {
                        return Err(corrupt("sequence loop state missing"));
                    };
                    *index += 1;
                    if *index < *len {
                        let item = (*get)(*seq, *index).ok_or_else(|| corrupt("sequence element missing"))?;
                        self.emit.element();
                        cur = item;
                        Step::Jump(*body)
                    } else {
                        loops.pop();
                        cur = values.pop().ok_or_else(|| corrupt("value stack underflow"))?;
                        self.emit.end_array();
                        depth -= 1;
                        Step::Next
                    }
                }
                Op::MapBegin { ops, end } => {
                    self.descend(&mut depth)?;
                    self.emit.begin_object();
                    let mut entries = (ops.entries)(cur);
                    if entries.is_empty() {
                        self.emit.end_object();
                        depth -= 1;
                        Step::Jump(*end)
                    } else {
                        if !self.unordered {
                            entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
                        }
                        let (key, value) = (&entries[0].0, entries[0].1);
                        self.emit.key_str(key);
                        values.push(cur);
                        cur = value;
                        loops.push(Loop::Map { entries, index: 0 });
                        Step::Next
                    }
                }
                Op::MapNext { body } => {
                    self.check_cancelled()?;
                    let Some(Loop::Map { entries, index }) = loops.last_mut() else {
                        return Err(corrupt("map loop state missing"));
                    };
                    *index += 1;
                    if let Some((key, value)) = entries.get(*index) {
                        self.emit.key_str(key);
                        cur = *value;
                        Step::Jump(*body)
                    } else {
                        loops.pop();
                        cur = values.pop().ok_or_else(|| corrupt("value stack underflow"))?;
                        self.emit.end_object();
                        depth -= 1;
                        Step::Next
                    }
                }
                Op::Recurse { type_name, cell } => {
                    let target = cell
                        .get()
                        .ok_or_else(|| corrupt(&format!("unfilled placeholder for {type_name}")))?;
                    Step::Call {
                        program: target.clone(),
                        cur,
                        release: None,
                    }
                }
                Op::Dynamic => {
                    let dynamic = cast::<Dynamic>(cur).ok_or_else(|| mismatch("Dynamic"))?;
                    match (dynamic.value(), dynamic.addr()) {
                        (Some(held), Some(addr)) => {
                            let tref = held.type_ref();
                            if !self.in_flight.insert(addr) {
                                return Err(cycle(tref.name()));
                            }
                            Step::Call {
                                program: cache::encoder_for_ref(tref)?,
                                cur: held.as_any(),
                                release: Some(addr),
                            }
                        }
                        _ => {
                            self.emit.null();
                            Step::Next
                        }
                    }
                }
                Op::Hook { hook, type_name } => {
                    let type_name = *type_name;
                    let cx = HookContext {
                        flags: self.flags,
                        cancel: self.cancel,
                        depth,
                    };
                    let bytes = match hook(cur, &cx) {
                        None => return Err(mismatch(type_name)),
                        Some(Err(source)) => {
                            return Err(CodecError::Hook {
                                type_name,
                                routine: "encode_json",
                                source,
                            })
                        }
                        Some(Ok(bytes)) => bytes,
                    };
                    splice(&mut self.emit, &bytes).map_err(|e| CodecError::Hook {
                        type_name,
                        routine: "encode_json",
                        source: Box::new(e),
                    })?;
                    Step::Next
                }
                Op::Unsupported { type_name } => {
                    return Err(CodecError::UnsupportedType { type_name: *type_name });
                }
            };

            match step {
                Step::Next => pc += 1,
                Step::Jump(target) => pc = target,
                Step::Call {
                    program: callee,
                    cur: value,
                    release,
                } => {
                    if let Err(err) = self.descend(&mut depth) {
                        if let Some(addr) = release {
                            self.in_flight.remove(&addr);
                        }
                        return Err(err);
                    }
                    let caller = std::mem::replace(&mut program, callee);
                    frames.push(Frame {
                        program: caller,
                        pc: pc + 1,
                        cur,
                        release,
                    });
                    pc = 0;
                    cur = value;
                }
            }
        }
    }
}

macro_rules! write_int {
    ($emit:expr, $value:expr, $ty:ty, $class:expr, $quoted:expr) => {{
        let n = *cast::<$ty>($value).ok_or_else(|| mismatch(stringify!($ty)))?;
        $emit.scalar($class, $quoted, |out| escape::write_display(out, n));
    }};
}

fn write_prim<L: Layout, P: Paint>(
    emit: &mut Emitter<'_, L, P>,
    prim: Prim,
    value: &dyn Any,
    quoted: bool,
) -> Result<()> {
    match prim {
        Prim::Bool => {
            let b = *cast::<bool>(value).ok_or_else(|| mismatch("bool"))?;
            emit.scalar(Class::Bool, quoted, |out| {
                out.extend_from_slice(if b { b"true" } else { b"false" })
            });
        }
        Prim::I8 => write_int!(emit, value, i8, Class::Int, quoted),
        Prim::I16 => write_int!(emit, value, i16, Class::Int, quoted),
        Prim::I32 => write_int!(emit, value, i32, Class::Int, quoted),
        Prim::I64 => write_int!(emit, value, i64, Class::Int, quoted),
        Prim::Isize => write_int!(emit, value, isize, Class::Int, quoted),
        Prim::U8 => write_int!(emit, value, u8, Class::Uint, quoted),
        Prim::U16 => write_int!(emit, value, u16, Class::Uint, quoted),
        Prim::U32 => write_int!(emit, value, u32, Class::Uint, quoted),
        Prim::U64 => write_int!(emit, value, u64, Class::Uint, quoted),
        Prim::Usize => write_int!(emit, value, usize, Class::Uint, quoted),
        Prim::F32 => {
            let f = *cast::<f32>(value).ok_or_else(|| mismatch("f32"))?;
            emit.scalar(Class::Float, quoted, |out| escape::write_f32(out, f))?;
        }
        Prim::F64 => {
            let f = *cast::<f64>(value).ok_or_else(|| mismatch("f64"))?;
            emit.scalar(Class::Float, quoted, |out| escape::write_f64(out, f))?;
        }
        Prim::Char => {
            let c = *cast::<char>(value).ok_or_else(|| mismatch("char"))?;
            let mut buf = [0u8; 4];
            write_text(emit, c.encode_utf8(&mut buf), quoted);
        }
        Prim::String => {
            let s = cast::<String>(value).ok_or_else(|| mismatch("String"))?;
            write_text(emit, s, quoted);
        }
        Prim::StaticStr => {
            let s = *cast::<&'static str>(value).ok_or_else(|| mismatch("&str"))?;
            write_text(emit, s, quoted);
        }
    }
    Ok(())
}

/// A quoted string field is encoded twice: the JSON string literal itself
/// becomes the content of the outer string.
fn write_text<L: Layout, P: Paint>(emit: &mut Emitter<'_, L, P>, s: &str, quoted: bool) {
    if quoted {
        let mut inner = Vec::with_capacity(s.len() + 2);
        escape::write_str(&mut inner, s, emit.escape_html());
        emit.string(&String::from_utf8_lossy(&inner));
    } else {
        emit.string(s);
    }
}

fn write_number<L: Layout, P: Paint>(emit: &mut Emitter<'_, L, P>, n: &Number, quoted: bool) -> Result<()> {
    let text = if n.as_str().is_empty() { "0" } else { n.as_str() };
    if !escape::is_number_literal(text.as_bytes()) {
        return Err(CodecError::unsupported_value(format!("invalid number literal {text:?}")));
    }
    let class = if text.contains(['.', 'e', 'E']) {
        Class::Float
    } else if text.starts_with('-') {
        Class::Int
    } else {
        Class::Uint
    };
    emit.scalar(class, quoted, |out| out.extend_from_slice(text.as_bytes()));
    Ok(())
}
