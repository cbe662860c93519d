//! Compiled output programs.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::describe::{EncodeHookFn, FieldPath, MapOps, OptionOps, PointerOps, Prim, SeqOps, TypeKey};
use crate::types::{Dynamic, Number, RawValue};

/// Flat instruction stream for one type.
pub struct EncodeProgram {
    pub(crate) key: TypeKey,
    pub(crate) ops: Vec<Op>,
}

impl EncodeProgram {
    pub fn type_key(&self) -> TypeKey {
        self.key
    }

    pub fn type_name(&self) -> &'static str {
        self.key.name()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Program listing, one instruction per line.
impl fmt::Display for EncodeProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "program {} ({} ops)", self.key.name(), self.ops.len())?;
        for (pc, op) in self.ops.iter().enumerate() {
            writeln!(f, "{pc:>5}  {op:?}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for EncodeProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodeProgram")
            .field("type", &self.key.name())
            .field("ops", &self.ops.len())
            .finish()
    }
}

/// Placeholder for a program still being compiled; filled exactly once.
#[derive(Default)]
pub(crate) struct ProgramCell(OnceLock<Arc<EncodeProgram>>);

impl ProgramCell {
    pub(crate) fn get(&self) -> Option<&Arc<EncodeProgram>> {
        self.0.get()
    }

    pub(crate) fn fill(&self, program: Arc<EncodeProgram>) {
        let _ = self.0.set(program);
    }
}

/// Emptiness test for omit-if-empty fields.
#[derive(Clone, Copy)]
pub(crate) enum EmptyCheck {
    Prim(Prim),
    Len(fn(&dyn Any) -> usize),
    Absent(fn(&dyn Any) -> Option<&dyn Any>),
    Number,
    Raw,
    Dynamic,
    Never,
}

impl EmptyCheck {
    pub(crate) fn is_empty(&self, value: &dyn Any) -> bool {
        match self {
            EmptyCheck::Prim(prim) => prim.is_empty(value),
            EmptyCheck::Len(len) => len(value) == 0,
            EmptyCheck::Absent(get) => get(value).is_none(),
            EmptyCheck::Number => value.downcast_ref::<Number>().is_some_and(|n| n.as_str().is_empty()),
            EmptyCheck::Raw => value.downcast_ref::<RawValue>().is_some_and(|r| r.get().is_empty()),
            EmptyCheck::Dynamic => value.downcast_ref::<Dynamic>().is_some_and(Dynamic::is_null),
            EmptyCheck::Never => false,
        }
    }
}

pub(crate) enum Op {
    Prim {
        prim: Prim,
        quoted: bool,
    },
    Number {
        quoted: bool,
    },
    Raw,
    BeginObject,
    EndObject,
    /// Pre-quoted key text, without and with markup escaping.
    Key {
        plain: Box<[u8]>,
        html: Box<[u8]>,
    },
    /// Descend into a struct field.
    Enter {
        field: &'static str,
        path: FieldPath,
    },
    Leave,
    /// Jump to `target` when the current value is empty.
    SkipIfEmpty {
        check: EmptyCheck,
        target: usize,
    },
    /// Descend into a present optional; otherwise write `null` and jump.
    OptionEnter {
        ops: OptionOps,
        target: usize,
    },
    Deref {
        ops: PointerOps,
        shared: bool,
        type_name: &'static str,
    },
    LeaveDeref {
        shared: bool,
    },
    /// Open an array; jump to `end` when empty.
    SeqBegin {
        ops: SeqOps,
        end: usize,
    },
    /// Advance to the next element (jump to `body`) or close the array.
    SeqNext {
        body: usize,
    },
    MapBegin {
        ops: MapOps,
        end: usize,
    },
    MapNext {
        body: usize,
    },
    /// Run another type's program against the current value.
    Recurse {
        type_name: &'static str,
        cell: Arc<ProgramCell>,
    },
    Dynamic,
    Hook {
        hook: EncodeHookFn,
        type_name: &'static str,
    },
    Unsupported {
        type_name: &'static str,
    },
}

impl fmt::Debug for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Prim { prim, quoted } => write!(f, "prim {prim:?}{}", if *quoted { " quoted" } else { "" }),
            Op::Number { quoted } => write!(f, "number{}", if *quoted { " quoted" } else { "" }),
            Op::Raw => f.write_str("raw"),
            Op::BeginObject => f.write_str("begin_object"),
            Op::EndObject => f.write_str("end_object"),
            Op::Key { plain, .. } => write!(f, "key {}", String::from_utf8_lossy(plain)),
            Op::Enter { field, path } => write!(f, "enter {field} (depth {})", path.depth()),
            Op::Leave => f.write_str("leave"),
            Op::SkipIfEmpty { target, .. } => write!(f, "skip_if_empty -> {target}"),
            Op::OptionEnter { target, .. } => write!(f, "option_enter else -> {target}"),
            Op::Deref { shared, type_name, .. } => {
                write!(f, "deref {type_name}{}", if *shared { " tracked" } else { "" })
            }
            Op::LeaveDeref { .. } => f.write_str("leave_deref"),
            Op::SeqBegin { end, .. } => write!(f, "seq_begin empty -> {end}"),
            Op::SeqNext { body } => write!(f, "seq_next -> {body}"),
            Op::MapBegin { end, .. } => write!(f, "map_begin empty -> {end}"),
            Op::MapNext { body } => write!(f, "map_next -> {body}"),
            Op::Recurse { type_name, cell } => {
                write!(f, "recurse {type_name}{}", if cell.get().is_some() { "" } else { " (unfilled)" })
            }
            Op::Dynamic => f.write_str("dynamic"),
            Op::Hook { type_name, .. } => write!(f, "hook {type_name}"),
            Op::Unsupported { type_name } => write!(f, "unsupported {type_name}"),
        }
    }
}
