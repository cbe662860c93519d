//! Fixture types shared by the integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use shapecodec_core::context::OptionFlags;
use shapecodec_core::describe::{DecodeHook, Describe, EncodeHook, HookContext, StructBuilder, TypeDescriptor};
use shapecodec_core::error::BoxError;
use shapecodec_core::Dynamic;

/// `\uXXXX` escape text for expected outputs.
pub fn u(code: &str) -> String {
    format!("{}u{code}", '\\')
}

// ============================================================================
// Plain records
// ============================================================================

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Person {
    pub name: String,
    pub age: u32,
}

impl Describe for Person {
    fn describe() -> TypeDescriptor {
        StructBuilder::<Person>::new()
            .field("Name", |p: &Person| &p.name, |p: &mut Person| &mut p.name)
            .field("Age", |p: &Person| &p.age, |p: &mut Person| &mut p.age)
            .build()
    }

    fn zero() -> Option<Self> {
        Some(Person::default())
    }
}

/// A single field named `a`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Keyed {
    pub a: i64,
}

impl Describe for Keyed {
    fn describe() -> TypeDescriptor {
        StructBuilder::<Keyed>::new()
            .field("a", |k: &Keyed| &k.a, |k: &mut Keyed| &mut k.a)
            .build()
    }

    fn zero() -> Option<Self> {
        Some(Keyed::default())
    }
}

/// Exercises every field tag option and most container kinds.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Inventory {
    pub id: u64,
    pub title: String,
    pub price: f64,
    pub tags: Vec<String>,
    pub counts: BTreeMap<String, u32>,
    pub owner: Option<Person>,
    pub serial: i64,
    pub note: String,
    pub flags: [bool; 3],
    pub internal: u8,
}

impl Describe for Inventory {
    fn describe() -> TypeDescriptor {
        StructBuilder::<Inventory>::new()
            .field_tagged("ID", "id", |i: &Inventory| &i.id, |i: &mut Inventory| &mut i.id)
            .field("title", |i: &Inventory| &i.title, |i: &mut Inventory| &mut i.title)
            .field("price", |i: &Inventory| &i.price, |i: &mut Inventory| &mut i.price)
            .field_tagged("Tags", "tags,omitempty", |i: &Inventory| &i.tags, |i: &mut Inventory| &mut i.tags)
            .field("counts", |i: &Inventory| &i.counts, |i: &mut Inventory| &mut i.counts)
            .field_tagged("Owner", "owner,omitempty", |i: &Inventory| &i.owner, |i: &mut Inventory| &mut i.owner)
            .field_tagged("Serial", "serial,string", |i: &Inventory| &i.serial, |i: &mut Inventory| &mut i.serial)
            .field_tagged("Note", "-", |i: &Inventory| &i.note, |i: &mut Inventory| &mut i.note)
            .field("flags", |i: &Inventory| &i.flags, |i: &mut Inventory| &mut i.flags)
            .private("internal", |i: &Inventory| &i.internal, |i: &mut Inventory| &mut i.internal)
            .build()
    }

    fn zero() -> Option<Self> {
        Some(Inventory::default())
    }
}

// ============================================================================
// Recursive and embedded shapes
// ============================================================================

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Node {
    pub value: i32,
    pub children: Vec<Node>,
    pub next: Option<Box<Node>>,
}

impl Describe for Node {
    fn describe() -> TypeDescriptor {
        StructBuilder::<Node>::new()
            .field("value", |n: &Node| &n.value, |n: &mut Node| &mut n.value)
            .field_tagged(
                "children",
                "children,omitempty",
                |n: &Node| &n.children,
                |n: &mut Node| &mut n.children,
            )
            .field_tagged("next", "next,omitempty", |n: &Node| &n.next, |n: &mut Node| &mut n.next)
            .build()
    }

    fn zero() -> Option<Self> {
        Some(Node::default())
    }
}

impl Node {
    pub fn leaf(value: i32) -> Self {
        Node {
            value,
            ..Node::default()
        }
    }

    /// A chain `depth` nodes long through `next`.
    pub fn chain(depth: usize) -> Self {
        let mut node = Node::leaf(depth as i32);
        for v in (0..depth.saturating_sub(1)).rev() {
            node = Node {
                value: v as i32,
                children: Vec::new(),
                next: Some(Box::new(node)),
            };
        }
        node
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Base {
    pub id: u64,
    pub kind: String,
}

impl Describe for Base {
    fn describe() -> TypeDescriptor {
        StructBuilder::<Base>::new()
            .field("ID", |b: &Base| &b.id, |b: &mut Base| &mut b.id)
            .field("Kind", |b: &Base| &b.kind, |b: &mut Base| &mut b.kind)
            .build()
    }

    fn zero() -> Option<Self> {
        Some(Base::default())
    }
}

/// Embeds `Base`; its own `Kind` shadows the promoted one.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Derived {
    pub base: Base,
    pub kind: String,
    pub extra: bool,
}

impl Describe for Derived {
    fn describe() -> TypeDescriptor {
        StructBuilder::<Derived>::new()
            .embed("Base", |d: &Derived| &d.base, |d: &mut Derived| &mut d.base)
            .field("Kind", |d: &Derived| &d.kind, |d: &mut Derived| &mut d.kind)
            .field("Extra", |d: &Derived| &d.extra, |d: &mut Derived| &mut d.extra)
            .build()
    }

    fn zero() -> Option<Self> {
        Some(Derived::default())
    }
}

// ============================================================================
// Hooks and unsupported members
// ============================================================================

/// Encodes as `"#rrggbb"` through hooks.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl EncodeHook for Rgb {
    fn encode_json(&self) -> Result<Vec<u8>, BoxError> {
        Ok(format!("\"#{:02x}{:02x}{:02x}\"", self.0, self.1, self.2).into_bytes())
    }
}

impl DecodeHook for Rgb {
    fn decode_json(&mut self, input: &[u8]) -> Result<(), BoxError> {
        let text = std::str::from_utf8(input)?;
        let hex = text
            .strip_prefix("\"#")
            .and_then(|t| t.strip_suffix('"'))
            .filter(|h| h.len() == 6 && h.is_ascii())
            .ok_or_else(|| format!("not a colour: {text}"))?;
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
        *self = Rgb(channel(0)?, channel(2)?, channel(4)?);
        Ok(())
    }
}

impl Describe for Rgb {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::opaque::<Rgb>()
            .with_encode_hook::<Rgb>()
            .with_decode_hook::<Rgb>()
    }

    fn zero() -> Option<Self> {
        Some(Rgb::default())
    }
}

/// Output hook that always fails.
#[derive(Debug, Default)]
pub struct Broken;

impl EncodeHook for Broken {
    fn encode_json(&self) -> Result<Vec<u8>, BoxError> {
        Err("boom".into())
    }
}

impl Describe for Broken {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::opaque::<Broken>().with_encode_hook::<Broken>()
    }

    fn zero() -> Option<Self> {
        Some(Broken)
    }
}

/// Output hook producing malformed JSON.
#[derive(Debug, Default)]
pub struct Garbled;

impl EncodeHook for Garbled {
    fn encode_json(&self) -> Result<Vec<u8>, BoxError> {
        Ok(b"{\"open\":".to_vec())
    }
}

impl Describe for Garbled {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::opaque::<Garbled>().with_encode_hook::<Garbled>()
    }

    fn zero() -> Option<Self> {
        Some(Garbled)
    }
}

/// Hooks that report the call state they were handed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Gauge {
    pub depth: usize,
    pub use_number: bool,
    pub cancellable: bool,
}

impl EncodeHook for Gauge {
    fn encode_json(&self) -> Result<Vec<u8>, BoxError> {
        Ok(b"null".to_vec())
    }

    fn encode_json_with(&self, cx: &HookContext<'_>) -> Result<Vec<u8>, BoxError> {
        if cx.is_cancelled() {
            return Err("cancelled".into());
        }
        Ok(cx.depth().to_string().into_bytes())
    }
}

impl DecodeHook for Gauge {
    fn decode_json(&mut self, _: &[u8]) -> Result<(), BoxError> {
        Ok(())
    }

    fn decode_json_with(&mut self, _: &[u8], cx: &HookContext<'_>) -> Result<(), BoxError> {
        *self = Gauge {
            depth: cx.depth(),
            use_number: cx.flags().contains(OptionFlags::USE_NUMBER),
            cancellable: cx.cancel_token().is_some(),
        };
        Ok(())
    }
}

impl Describe for Gauge {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::opaque::<Gauge>()
            .with_encode_hook::<Gauge>()
            .with_decode_hook::<Gauge>()
    }

    fn zero() -> Option<Self> {
        Some(Gauge::default())
    }
}

#[derive(Debug, Default)]
pub struct Palette {
    pub name: String,
    pub colors: Vec<Rgb>,
}

impl Describe for Palette {
    fn describe() -> TypeDescriptor {
        StructBuilder::<Palette>::new()
            .field("name", |p: &Palette| &p.name, |p: &mut Palette| &mut p.name)
            .field("colors", |p: &Palette| &p.colors, |p: &mut Palette| &mut p.colors)
            .build()
    }

    fn zero() -> Option<Self> {
        Some(Palette::default())
    }
}

/// Holds a member with no JSON representation.
pub struct WithCallback {
    pub label: String,
    pub callback: Option<fn() -> u8>,
}

impl Describe for WithCallback {
    fn describe() -> TypeDescriptor {
        StructBuilder::<WithCallback>::new()
            .field("label", |w: &WithCallback| &w.label, |w: &mut WithCallback| &mut w.label)
            .field_tagged(
                "callback",
                "callback,omitempty",
                |w: &WithCallback| &w.callback,
                |w: &mut WithCallback| &mut w.callback,
            )
            .build()
    }

    fn zero() -> Option<Self> {
        Some(WithCallback {
            label: String::new(),
            callback: None,
        })
    }
}

pub fn seven() -> u8 {
    7
}

// ============================================================================
// Dynamic cycles
// ============================================================================

/// A node that can point back at itself through a dynamic value.
#[derive(Default)]
pub struct Link {
    pub name: String,
    pub next: OnceLock<Dynamic>,
}

impl Describe for Link {
    fn describe() -> TypeDescriptor {
        StructBuilder::<Link>::new()
            .field("name", |l: &Link| &l.name, |l: &mut Link| &mut l.name)
            .field_tagged("next", "next,omitempty", |l: &Link| &l.next, |l: &mut Link| &mut l.next)
            .build()
    }

    fn zero() -> Option<Self> {
        Some(Link::default())
    }
}

/// `a -> b -> a`, reachable through `Dynamic` values.
pub fn looped_links() -> Dynamic {
    let a = Arc::new(Link {
        name: "a".into(),
        next: OnceLock::new(),
    });
    let b = Arc::new(Link {
        name: "b".into(),
        next: OnceLock::new(),
    });
    let _ = b.next.set(Dynamic::from_arc(a.clone()));
    let _ = a.next.set(Dynamic::from_arc(b));
    Dynamic::from_arc(a)
}
