//! Type descriptors: a one-time structural description of a Rust type.
//!
//! A type opts in by implementing [`Describe`]. The descriptor it returns is
//! never walked on the hot path; the compilers in [`crate::encoder`] and
//! [`crate::decoder`] turn it into a program once, and the program is cached
//! by type identity.
//!
//! Child types are referenced through [`TypeRef`], which carries a function
//! pointer instead of an eagerly built descriptor. Describing a type therefore
//! never recurses into its children, and self-referential types describe
//! themselves without special handling.
//!
//! # Example
//!
//! ```
//! use shapecodec_core::describe::{Describe, StructBuilder, TypeDescriptor};
//!
//! #[derive(Default)]
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! impl Describe for Person {
//!     fn describe() -> TypeDescriptor {
//!         StructBuilder::<Person>::new()
//!             .field("Name", |p: &Person| &p.name, |p: &mut Person| &mut p.name)
//!             .field("Age", |p: &Person| &p.age, |p: &mut Person| &mut p.age)
//!             .build()
//!     }
//!
//!     fn zero() -> Option<Self> {
//!         Some(Person::default())
//!     }
//! }
//!
//! let json = shapecodec_core::to_string(&Person { name: "Ann".into(), age: 3 }).unwrap();
//! assert_eq!(json, r#"{"Name":"Ann","Age":3}"#);
//! ```

mod fields;
mod hooks;
mod impls;
mod shapes;

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub use fields::{FieldAccess, FieldDecl, FieldPath, FieldTag, SelectedField, StructBuilder, StructShape};
pub use hooks::{DecodeHook, DecodeHookFn, EncodeHook, EncodeHookFn, HookContext, Hooks};
pub use impls::MapKey;
pub use shapes::{MapOps, MapShape, OptionOps, OptionShape, PointerOps, PointerShape, Prim, SeqOps, SeqShape};

/// A type that can describe its own shape.
///
/// `zero` supplies the fresh value the decoder writes into when it has to
/// create one (a new sequence element, a map value, the payload of an
/// `Option`). Types that cannot be decoded into return `None`.
pub trait Describe: 'static {
    fn describe() -> TypeDescriptor;

    fn zero() -> Option<Self>
    where
        Self: Sized;
}

/// Stable identity of a type for the lifetime of the process.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        TypeKey {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Lazy reference to a type's descriptor.
#[derive(Clone, Copy)]
pub struct TypeRef {
    key: TypeKey,
    describe: fn() -> TypeDescriptor,
}

impl TypeRef {
    pub fn of<T: Describe>() -> Self {
        TypeRef {
            key: TypeKey::of::<T>(),
            describe: T::describe,
        }
    }

    #[inline]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.key.name
    }

    /// Cached, field-selected descriptor for this type.
    pub fn descriptor(&self) -> Arc<TypeDescriptor> {
        crate::cache::descriptor_of(*self)
    }

    /// Runs the type's `describe` function without touching the cache.
    pub(crate) fn describe_raw(&self) -> TypeDescriptor {
        (self.describe)()
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeRef({})", self.key.name)
    }
}

/// Kind tag of a described type.
pub enum Kind {
    Prim(Prim),
    /// Number kept as its literal text.
    Number,
    /// Pre-encoded JSON text, spliced verbatim (after validation).
    Raw,
    Struct(StructShape),
    Seq(SeqShape),
    Map(MapShape),
    Option(OptionShape),
    Pointer(PointerShape),
    /// Value whose concrete type is only known at run time.
    Dynamic,
    /// No JSON representation (function pointers, channels).
    Unsupported,
}

impl Kind {
    pub fn label(&self) -> &'static str {
        match self {
            Kind::Prim(_) => "primitive",
            Kind::Number => "number",
            Kind::Raw => "raw",
            Kind::Struct(_) => "struct",
            Kind::Seq(_) => "sequence",
            Kind::Map(_) => "map",
            Kind::Option(_) => "option",
            Kind::Pointer(_) => "pointer",
            Kind::Dynamic => "dynamic",
            Kind::Unsupported => "unsupported",
        }
    }
}

/// Immutable structural description of one type.
pub struct TypeDescriptor {
    key: TypeKey,
    kind: Kind,
    hooks: Hooks,
}

impl TypeDescriptor {
    pub fn new<T: ?Sized + 'static>(kind: Kind) -> Self {
        TypeDescriptor {
            key: TypeKey::of::<T>(),
            kind,
            hooks: Hooks::default(),
        }
    }

    /// Descriptor for a type with no JSON representation of its own.
    /// Pair it with hooks to make it encodable or decodable.
    pub fn opaque<T: 'static>() -> Self {
        Self::new::<T>(Kind::Unsupported)
    }

    #[inline]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    #[inline]
    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    #[inline]
    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Substitute `T::encode_json` for the generated output instructions.
    pub fn with_encode_hook<T: EncodeHook + 'static>(mut self) -> Self {
        debug_assert!(self.key.id == TypeId::of::<T>(), "hook type must match the described type");
        self.hooks.encode = Some(hooks::encode_hook_fn::<T>());
        self
    }

    /// Substitute `T::decode_json` for the generated input resolver.
    pub fn with_decode_hook<T: DecodeHook + 'static>(mut self) -> Self {
        debug_assert!(self.key.id == TypeId::of::<T>(), "hook type must match the described type");
        self.hooks.decode = Some(hooks::decode_hook_fn::<T>());
        self
    }

    pub(crate) fn kind_mut(&mut self) -> &mut Kind {
        &mut self.kind
    }

    /// True when neither a kind nor a hook gives this type a representation.
    pub fn is_unsupported(&self) -> bool {
        matches!(self.kind, Kind::Unsupported)
            && self.hooks.encode.is_none()
            && self.hooks.decode.is_none()
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("type", &self.key.name)
            .field("kind", &self.kind.label())
            .finish()
    }
}

/// Cached descriptor for `T` (built and field-selected on first use).
pub fn describe<T: Describe>() -> Arc<TypeDescriptor> {
    crate::cache::descriptor_of(TypeRef::of::<T>())
}

/// Build the final descriptor for a type: run its `describe` function and,
/// for structs, resolve the selected field list.
pub(crate) fn build(tref: TypeRef) -> TypeDescriptor {
    let mut desc = tref.describe_raw();
    if let Kind::Struct(shape) = desc.kind_mut() {
        shape.select_fields(tref.key());
    }
    desc
}

/// Zero value helper used by generic container operations.
#[inline]
pub(crate) fn zero_of<T: Describe>() -> Option<T> {
    T::zero()
}

/// Downcast helper shared by container operations.
#[inline]
pub(crate) fn cast<T: 'static>(value: &dyn Any) -> Option<&T> {
    value.downcast_ref::<T>()
}

#[inline]
pub(crate) fn cast_mut<T: 'static>(value: &mut dyn Any) -> Option<&mut T> {
    value.downcast_mut::<T>()
}
