//! Container shapes and the type-erased operations the engines call on them.

use std::any::Any;
use std::borrow::Cow;

use super::TypeRef;

/// Scalar kinds with a direct JSON literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Prim {
    Bool,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    Char,
    String,
    /// `&'static str`: encodable, never decodable.
    StaticStr,
}

impl Prim {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Prim::I8
                | Prim::I16
                | Prim::I32
                | Prim::I64
                | Prim::Isize
                | Prim::U8
                | Prim::U16
                | Prim::U32
                | Prim::U64
                | Prim::Usize
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, Prim::F32 | Prim::F64)
    }

    pub fn type_name(self) -> &'static str {
        match self {
            Prim::Bool => "bool",
            Prim::I8 => "i8",
            Prim::I16 => "i16",
            Prim::I32 => "i32",
            Prim::I64 => "i64",
            Prim::Isize => "isize",
            Prim::U8 => "u8",
            Prim::U16 => "u16",
            Prim::U32 => "u32",
            Prim::U64 => "u64",
            Prim::Usize => "usize",
            Prim::F32 => "f32",
            Prim::F64 => "f64",
            Prim::Char => "char",
            Prim::String => "String",
            Prim::StaticStr => "&str",
        }
    }

    pub fn is_textual(self) -> bool {
        matches!(self, Prim::String | Prim::StaticStr | Prim::Char)
    }

    /// Whether `value` holds this primitive's zero value (omit-if-empty).
    pub fn is_empty(self, value: &dyn Any) -> bool {
        fn eq<T: PartialEq + 'static>(value: &dyn Any, zero: T) -> bool {
            value.downcast_ref::<T>() == Some(&zero)
        }
        match self {
            Prim::Bool => eq(value, false),
            Prim::I8 => eq(value, 0i8),
            Prim::I16 => eq(value, 0i16),
            Prim::I32 => eq(value, 0i32),
            Prim::I64 => eq(value, 0i64),
            Prim::Isize => eq(value, 0isize),
            Prim::U8 => eq(value, 0u8),
            Prim::U16 => eq(value, 0u16),
            Prim::U32 => eq(value, 0u32),
            Prim::U64 => eq(value, 0u64),
            Prim::Usize => eq(value, 0usize),
            Prim::F32 => eq(value, 0f32),
            Prim::F64 => eq(value, 0f64),
            Prim::Char => false,
            Prim::String => value.downcast_ref::<String>().is_some_and(String::is_empty),
            Prim::StaticStr => value.downcast_ref::<&'static str>().is_some_and(|s| s.is_empty()),
        }
    }
}

/// Operations over a homogeneous sequence (`Vec`, `VecDeque`, fixed arrays).
#[derive(Clone, Copy)]
pub struct SeqOps {
    pub len: fn(&dyn Any) -> usize,
    pub get: fn(&dyn Any, usize) -> Option<&dyn Any>,
    /// Prepare for decoding a new array (growable sequences clear here).
    pub begin: fn(&mut dyn Any),
    /// Slot for element `index`, creating it if the sequence grows.
    /// `None` means the sequence is full (fixed arrays) or cannot grow.
    pub slot: fn(&mut dyn Any, usize) -> Option<&mut dyn Any>,
    /// Called with the number of elements read; fixed arrays reset the tail.
    pub finish: fn(&mut dyn Any, usize),
    /// Decoding `null` into the sequence.
    pub clear: fn(&mut dyn Any),
}

pub struct SeqShape {
    pub elem: TypeRef,
    pub ops: SeqOps,
    /// Length of a fixed array; `None` for growable sequences.
    pub fixed_len: Option<usize>,
}

/// Operations over a string-keyed map.
#[derive(Clone, Copy)]
pub struct MapOps {
    pub len: fn(&dyn Any) -> usize,
    pub entries: for<'a> fn(&'a dyn Any) -> Vec<(Cow<'a, str>, &'a dyn Any)>,
    /// Insert or replace `key` with a fresh value and return it.
    /// `None` when the key text does not parse as the key type.
    pub slot: for<'a> fn(&'a mut dyn Any, &str) -> Option<&'a mut dyn Any>,
    pub clear: fn(&mut dyn Any),
}

pub struct MapShape {
    pub key: TypeRef,
    pub value: TypeRef,
    pub ops: MapOps,
}

/// Operations over an optional value (`Option<T>`, `OnceLock<T>`).
#[derive(Clone, Copy)]
pub struct OptionOps {
    pub get: fn(&dyn Any) -> Option<&dyn Any>,
    /// Present payload, creating a zero one if absent.
    pub get_or_insert: fn(&mut dyn Any) -> Option<&mut dyn Any>,
    pub clear: fn(&mut dyn Any),
}

pub struct OptionShape {
    pub inner: TypeRef,
    pub ops: OptionOps,
}

/// Operations over an owning pointer (`Box`, `Arc`, `Rc`).
#[derive(Clone, Copy)]
pub struct PointerOps {
    pub deref: fn(&dyn Any) -> Option<&dyn Any>,
    /// Mutable access to the pointee; shared pointers that are not unique
    /// are replaced by a fresh allocation first.
    pub deref_mut: fn(&mut dyn Any) -> Option<&mut dyn Any>,
    /// Address of the pointee, used for cycle detection.
    pub addr: fn(&dyn Any) -> usize,
}

pub struct PointerShape {
    pub inner: TypeRef,
    pub ops: PointerOps,
    /// Shared pointers can form cycles and are tracked while in flight.
    pub shared: bool,
}
