//! Struct fields: declaration, tags, accessors and field selection.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{Describe, Kind, TypeDescriptor, TypeKey, TypeRef};

/// Safe replacement for a field byte offset: borrows one field out of its
/// owning struct.
pub trait FieldAccess: Send + Sync {
    fn get<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any>;
    fn get_mut<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Any>;
}

struct Accessor<S, F> {
    get: fn(&S) -> &F,
    get_mut: fn(&mut S) -> &mut F,
}

impl<S: 'static, F: 'static> FieldAccess for Accessor<S, F> {
    fn get<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any> {
        let owner = owner.downcast_ref::<S>()?;
        Some((self.get)(owner) as &dyn Any)
    }

    fn get_mut<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        let owner = owner.downcast_mut::<S>()?;
        Some((self.get_mut)(owner) as &mut dyn Any)
    }
}

/// Parsed field tag: `"name,omitempty,string"`, or `"-"` to skip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTag {
    pub rename: Option<String>,
    pub omit_empty: bool,
    pub quoted: bool,
    pub skip: bool,
}

impl FieldTag {
    /// Parse a tag string.
    ///
    /// ```
    /// use shapecodec_core::describe::FieldTag;
    ///
    /// let tag = FieldTag::parse("id,omitempty,string");
    /// assert_eq!(tag.rename.as_deref(), Some("id"));
    /// assert!(tag.omit_empty && tag.quoted);
    /// assert!(FieldTag::parse("-").skip);
    /// assert_eq!(FieldTag::parse("-,").rename.as_deref(), Some("-"));
    /// ```
    pub fn parse(tag: &str) -> Self {
        if tag == "-" {
            return FieldTag {
                skip: true,
                ..FieldTag::default()
            };
        }
        let mut parts = tag.split(',');
        let name = parts.next().unwrap_or_default();
        let mut parsed = FieldTag {
            rename: (!name.is_empty()).then(|| name.to_string()),
            ..FieldTag::default()
        };
        for opt in parts {
            match opt.trim() {
                "omitempty" => parsed.omit_empty = true,
                "string" => parsed.quoted = true,
                _ => {}
            }
        }
        parsed
    }
}

/// One declared field, before selection.
#[derive(Clone)]
pub struct FieldDecl {
    pub name: &'static str,
    pub tag: FieldTag,
    pub visible: bool,
    pub embedded: bool,
    pub ty: TypeRef,
    pub access: Arc<dyn FieldAccess>,
}

impl fmt::Debug for FieldDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDecl")
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("visible", &self.visible)
            .field("embedded", &self.embedded)
            .field("ty", &self.ty)
            .finish()
    }
}

/// Accessor chain from the top-level struct down to a (possibly promoted)
/// field.
#[derive(Clone)]
pub struct FieldPath(Arc<[Arc<dyn FieldAccess>]>);

impl FieldPath {
    pub fn get<'a>(&self, owner: &'a dyn Any) -> Option<&'a dyn Any> {
        let mut cur = owner;
        for step in self.0.iter() {
            cur = step.get(cur)?;
        }
        Some(cur)
    }

    pub fn get_mut<'a>(&self, owner: &'a mut dyn Any) -> Option<&'a mut dyn Any> {
        let mut cur = owner;
        for step in self.0.iter() {
            cur = step.get_mut(cur)?;
        }
        Some(cur)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

/// A field that survived selection, in output order.
#[derive(Clone)]
pub struct SelectedField {
    /// Serialized key.
    pub name: String,
    pub declared: &'static str,
    pub ty: TypeRef,
    pub path: FieldPath,
    pub omit_empty: bool,
    pub quoted: bool,
}

impl fmt::Debug for SelectedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectedField")
            .field("name", &self.name)
            .field("declared", &self.declared)
            .field("ty", &self.ty)
            .field("depth", &self.path.depth())
            .field("omit_empty", &self.omit_empty)
            .field("quoted", &self.quoted)
            .finish()
    }
}

pub struct StructShape {
    decls: Vec<FieldDecl>,
    fields: Vec<SelectedField>,
}

impl StructShape {
    pub fn decls(&self) -> &[FieldDecl] {
        &self.decls
    }

    /// Selected fields. Empty until the descriptor has been built through
    /// the descriptor cache.
    pub fn fields(&self) -> &[SelectedField] {
        &self.fields
    }

    pub(crate) fn select_fields(&mut self, owner: TypeKey) {
        let mut candidates = Vec::new();
        let mut visiting = vec![owner.id()];
        collect(&self.decls, &[], &mut visiting, &mut candidates);

        // Shallowest wins; first declared wins among equals.
        let mut keep = vec![false; candidates.len()];
        {
            let mut winner: HashMap<&str, usize> = HashMap::new();
            for (i, c) in candidates.iter().enumerate() {
                match winner.get(c.name.as_str()) {
                    Some(&w) if candidates[w].depth <= c.depth => {}
                    _ => {
                        winner.insert(c.name.as_str(), i);
                    }
                }
            }
            for i in winner.into_values() {
                keep[i] = true;
            }
        }

        self.fields = candidates
            .into_iter()
            .zip(keep)
            .filter_map(|(c, keep)| keep.then_some(c))
            .map(|c| SelectedField {
                name: c.name,
                declared: c.decl.name,
                ty: c.decl.ty,
                path: FieldPath(c.path.into()),
                omit_empty: c.decl.tag.omit_empty,
                quoted: c.decl.tag.quoted,
            })
            .collect();
    }
}

struct Candidate {
    name: String,
    depth: usize,
    decl: FieldDecl,
    path: Vec<Arc<dyn FieldAccess>>,
}

fn collect(
    decls: &[FieldDecl],
    prefix: &[Arc<dyn FieldAccess>],
    visiting: &mut Vec<TypeId>,
    out: &mut Vec<Candidate>,
) {
    for decl in decls {
        if decl.tag.skip {
            continue;
        }
        let mut path = prefix.to_vec();
        path.push(decl.access.clone());

        if decl.embedded && decl.tag.rename.is_none() {
            let inner = decl.ty.describe_raw();
            if let Kind::Struct(shape) = inner.kind() {
                let id = decl.ty.key().id();
                if !visiting.contains(&id) {
                    visiting.push(id);
                    collect(&shape.decls, &path, visiting, out);
                    visiting.pop();
                }
                continue;
            }
        }
        if !decl.visible {
            continue;
        }
        out.push(Candidate {
            name: decl.tag.rename.clone().unwrap_or_else(|| decl.name.to_string()),
            depth: prefix.len(),
            decl: decl.clone(),
            path,
        });
    }
}

/// Builds a struct descriptor field by field.
///
/// Accessors are plain function pointers, so non-capturing closures work:
///
/// ```
/// # use shapecodec_core::describe::{Describe, StructBuilder, TypeDescriptor};
/// #[derive(Default)]
/// struct Base { id: u64 }
/// #[derive(Default)]
/// struct Item { base: Base, label: String, secret: String }
///
/// # impl Describe for Base {
/// #     fn describe() -> TypeDescriptor {
/// #         StructBuilder::<Base>::new().field("ID", |b: &Base| &b.id, |b: &mut Base| &mut b.id).build()
/// #     }
/// #     fn zero() -> Option<Self> { Some(Base::default()) }
/// # }
/// impl Describe for Item {
///     fn describe() -> TypeDescriptor {
///         StructBuilder::<Item>::new()
///             .embed("Base", |i: &Item| &i.base, |i: &mut Item| &mut i.base)
///             .field_tagged("Label", "label,omitempty", |i: &Item| &i.label, |i: &mut Item| &mut i.label)
///             .private("secret", |i: &Item| &i.secret, |i: &mut Item| &mut i.secret)
///             .build()
///     }
///     fn zero() -> Option<Self> { Some(Item::default()) }
/// }
///
/// let out = shapecodec_core::to_string(&Item { base: Base { id: 7 }, ..Item::default() }).unwrap();
/// assert_eq!(out, r#"{"ID":7}"#);
/// ```
pub struct StructBuilder<S> {
    decls: Vec<FieldDecl>,
    _owner: PhantomData<fn() -> S>,
}

impl<S: Describe> Default for StructBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Describe> StructBuilder<S> {
    pub fn new() -> Self {
        StructBuilder {
            decls: Vec::new(),
            _owner: PhantomData,
        }
    }

    fn push<F: Describe>(
        mut self,
        name: &'static str,
        tag: FieldTag,
        visible: bool,
        embedded: bool,
        get: fn(&S) -> &F,
        get_mut: fn(&mut S) -> &mut F,
    ) -> Self {
        self.decls.push(FieldDecl {
            name,
            tag,
            visible,
            embedded,
            ty: TypeRef::of::<F>(),
            access: Arc::new(Accessor { get, get_mut }),
        });
        self
    }

    /// A public field serialized under its declared name.
    pub fn field<F: Describe>(self, name: &'static str, get: fn(&S) -> &F, get_mut: fn(&mut S) -> &mut F) -> Self {
        self.push(name, FieldTag::default(), true, false, get, get_mut)
    }

    /// A public field with a tag (`"rename,omitempty,string"` or `"-"`).
    pub fn field_tagged<F: Describe>(
        self,
        name: &'static str,
        tag: &str,
        get: fn(&S) -> &F,
        get_mut: fn(&mut S) -> &mut F,
    ) -> Self {
        self.push(name, FieldTag::parse(tag), true, false, get, get_mut)
    }

    /// A field that is not externally visible; never serialized.
    pub fn private<F: Describe>(self, name: &'static str, get: fn(&S) -> &F, get_mut: fn(&mut S) -> &mut F) -> Self {
        self.push(name, FieldTag::default(), false, false, get, get_mut)
    }

    /// An embedded field whose own fields are promoted into this struct.
    pub fn embed<F: Describe>(self, name: &'static str, get: fn(&S) -> &F, get_mut: fn(&mut S) -> &mut F) -> Self {
        self.push(name, FieldTag::default(), true, true, get, get_mut)
    }

    /// An embedded field with a tag. A rename turns it into an ordinary field.
    pub fn embed_tagged<F: Describe>(
        self,
        name: &'static str,
        tag: &str,
        get: fn(&S) -> &F,
        get_mut: fn(&mut S) -> &mut F,
    ) -> Self {
        self.push(name, FieldTag::parse(tag), true, true, get, get_mut)
    }

    pub fn build(self) -> TypeDescriptor {
        TypeDescriptor::new::<S>(Kind::Struct(StructShape {
            decls: self.decls,
            fields: Vec::new(),
        }))
    }
}
