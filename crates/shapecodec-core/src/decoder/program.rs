//! Input resolver trees.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::describe::{DecodeHookFn, FieldPath, MapOps, OptionOps, PointerOps, Prim, SeqOps, TypeKey};
use crate::error::{CodecError, Result};

// Threshold for switching from a linear scan to binary search.
const LOOKUP_THRESHOLD: usize = 8;

/// Compiled input program for one type.
///
/// Unlike the output side this is a tree of resolver nodes rather than a
/// flat instruction list: each node knows how to consume one JSON value into
/// a destination of its type. Recursive types close the tree into a graph
/// through shared [`NodeCell`]s.
pub struct DecodeProgram {
    pub(crate) key: TypeKey,
    pub(crate) root: NodeRef,
    pub(crate) nodes: usize,
}

impl DecodeProgram {
    pub fn type_key(&self) -> TypeKey {
        self.key
    }

    pub fn type_name(&self) -> &'static str {
        self.key.name()
    }

    /// Distinct resolver nodes reachable from the root.
    pub fn node_count(&self) -> usize {
        self.nodes
    }
}

impl fmt::Debug for DecodeProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodeProgram")
            .field("type", &self.key.name())
            .field("nodes", &self.nodes)
            .finish()
    }
}

pub(crate) type NodeRef = Arc<NodeCell>;

/// Slot for a node. Filled once the node's children are built, which lets a
/// child refer back to a node that is still under construction.
#[derive(Default)]
pub(crate) struct NodeCell(OnceLock<DecodeNode>);

impl NodeCell {
    pub(crate) fn set(&self, node: DecodeNode) {
        // Each cell is filled exactly once by the compiler that created it.
        let _ = self.0.set(node);
    }

    #[inline]
    pub(crate) fn node(&self) -> Result<&DecodeNode> {
        self.0
            .get()
            .ok_or_else(|| CodecError::unsupported_value("decode program is incomplete"))
    }
}

pub(crate) enum DecodeNode {
    Prim(Prim),
    Number,
    Raw,
    Dynamic,
    Struct(StructNode),
    Seq {
        ops: SeqOps,
        elem: NodeRef,
        elem_name: &'static str,
        fixed: bool,
        type_name: &'static str,
    },
    Map {
        ops: MapOps,
        value: NodeRef,
        key_name: &'static str,
        type_name: &'static str,
    },
    Option {
        ops: OptionOps,
        inner: NodeRef,
        inner_name: &'static str,
    },
    Pointer {
        ops: PointerOps,
        inner: NodeRef,
        inner_name: &'static str,
    },
    Hook {
        call: DecodeHookFn,
        type_name: &'static str,
    },
    Unsupported {
        type_name: &'static str,
    },
}

impl DecodeNode {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            DecodeNode::Prim(_) => "prim",
            DecodeNode::Number => "number",
            DecodeNode::Raw => "raw",
            DecodeNode::Dynamic => "dynamic",
            DecodeNode::Struct(_) => "struct",
            DecodeNode::Seq { .. } => "seq",
            DecodeNode::Map { .. } => "map",
            DecodeNode::Option { .. } => "option",
            DecodeNode::Pointer { .. } => "pointer",
            DecodeNode::Hook { .. } => "hook",
            DecodeNode::Unsupported { .. } => "unsupported",
        }
    }
}

pub(crate) struct StructNode {
    pub(crate) type_name: &'static str,
    pub(crate) slots: Vec<Slot>,
    pub(crate) lookup: FieldLookup,
}

pub(crate) struct Slot {
    pub(crate) name: String,
    pub(crate) path: FieldPath,
    pub(crate) node: NodeRef,
    pub(crate) quoted: bool,
}

/// Key → slot index. Exact matches win over case-insensitive ones.
pub(crate) enum FieldLookup {
    Small(Vec<(Box<str>, usize)>),
    Sorted(Vec<(Box<str>, usize)>),
}

impl FieldLookup {
    pub(crate) fn new(names: impl IntoIterator<Item = (Box<str>, usize)>) -> Self {
        let mut entries: Vec<_> = names.into_iter().collect();
        if entries.len() <= LOOKUP_THRESHOLD {
            FieldLookup::Small(entries)
        } else {
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            FieldLookup::Sorted(entries)
        }
    }

    pub(crate) fn find(&self, key: &str) -> Option<usize> {
        let entries = match self {
            FieldLookup::Small(entries) => {
                if let Some((_, index)) = entries.iter().find(|(name, _)| &**name == key) {
                    return Some(*index);
                }
                entries
            }
            FieldLookup::Sorted(entries) => {
                if let Ok(at) = entries.binary_search_by(|(name, _)| (**name).cmp(key)) {
                    return Some(entries[at].1);
                }
                entries
            }
        };
        // Declaration order decides between case-folded candidates.
        entries
            .iter()
            .filter(|(name, _)| fold_eq(name, key))
            .map(|(_, index)| *index)
            .min()
    }
}

/// Case-insensitive comparison. Non-ASCII text is compared by lowercase
/// mapping, so `Ä` matches `ä` and the Kelvin sign matches `k`.
fn fold_eq(a: &str, b: &str) -> bool {
    if a.is_ascii() && b.is_ascii() {
        return a.eq_ignore_ascii_case(b);
    }
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}
