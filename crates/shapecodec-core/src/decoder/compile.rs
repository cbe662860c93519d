//! Descriptor → input resolver tree.
//!
//! Every distinct type gets one node per program. The node's cell is
//! registered before its children are built, so a child that names a type
//! still under construction links to the pending cell instead of recursing.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::decoder::program::{DecodeNode, DecodeProgram, FieldLookup, NodeRef, Slot, StructNode};
use crate::describe::{Kind, Prim, TypeDescriptor, TypeRef};
use crate::error::{CodecError, Result};

/// Compile the input program for `tref`.
///
/// A top-level type that cannot be decoded fails here; nested ones compile
/// to a node that fails only when input actually reaches it.
pub fn compile_decoder(tref: TypeRef) -> Result<Arc<DecodeProgram>> {
    let desc = tref.descriptor();
    if desc.hooks().decode.is_none() && !decodable(desc.kind()) {
        return Err(CodecError::UnsupportedType {
            type_name: tref.name(),
        });
    }

    let mut session = Session::default();
    let root = session.node(tref);
    let program = Arc::new(DecodeProgram {
        key: tref.key(),
        root,
        nodes: session.cells.len(),
    });
    tracing::debug!(type_name = tref.name(), nodes = program.nodes, "compiled decode program");
    Ok(program)
}

fn decodable(kind: &Kind) -> bool {
    !matches!(kind, Kind::Unsupported | Kind::Prim(Prim::StaticStr))
}

#[derive(Default)]
struct Session {
    cells: HashMap<TypeId, NodeRef>,
}

impl Session {
    fn node(&mut self, tref: TypeRef) -> NodeRef {
        let id = tref.key().id();
        if let Some(cell) = self.cells.get(&id) {
            return cell.clone();
        }
        let cell = NodeRef::default();
        self.cells.insert(id, cell.clone());
        let desc = tref.descriptor();
        let node = self.build(tref, &desc);
        tracing::trace!(type_name = tref.name(), node = node.label(), "built decode node");
        cell.set(node);
        cell
    }

    fn build(&mut self, tref: TypeRef, desc: &TypeDescriptor) -> DecodeNode {
        if let Some(call) = desc.hooks().decode {
            return DecodeNode::Hook {
                call,
                type_name: tref.name(),
            };
        }
        match desc.kind() {
            Kind::Prim(Prim::StaticStr) | Kind::Unsupported => DecodeNode::Unsupported {
                type_name: tref.name(),
            },
            Kind::Prim(prim) => DecodeNode::Prim(*prim),
            Kind::Number => DecodeNode::Number,
            Kind::Raw => DecodeNode::Raw,
            Kind::Dynamic => DecodeNode::Dynamic,
            Kind::Struct(shape) => {
                let slots: Vec<Slot> = shape
                    .fields()
                    .iter()
                    .map(|field| Slot {
                        name: field.name.clone(),
                        path: field.path.clone(),
                        node: self.node(field.ty),
                        quoted: field.quoted,
                    })
                    .collect();
                let lookup = FieldLookup::new(slots.iter().enumerate().map(|(i, s)| (Box::from(s.name.as_str()), i)));
                DecodeNode::Struct(StructNode {
                    type_name: tref.name(),
                    slots,
                    lookup,
                })
            }
            Kind::Seq(shape) => DecodeNode::Seq {
                ops: shape.ops,
                elem: self.node(shape.elem),
                elem_name: shape.elem.name(),
                fixed: shape.fixed_len.is_some(),
                type_name: tref.name(),
            },
            Kind::Map(shape) => DecodeNode::Map {
                ops: shape.ops,
                value: self.node(shape.value),
                key_name: shape.key.name(),
                type_name: tref.name(),
            },
            Kind::Option(shape) => DecodeNode::Option {
                ops: shape.ops,
                inner: self.node(shape.inner),
                inner_name: shape.inner.name(),
            },
            Kind::Pointer(shape) => DecodeNode::Pointer {
                ops: shape.ops,
                inner: self.node(shape.inner),
                inner_name: shape.inner.name(),
            },
        }
    }
}
