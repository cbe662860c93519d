//! Descriptor → flat output program.
//!
//! Nested types are inlined into the caller's instruction stream. A reference
//! back to a type that is still being compiled becomes a `Recurse` op bound
//! to a placeholder cell; once the outer program exists every placeholder is
//! filled, either with the outer program itself or with the (cached) program
//! of the intermediate type it names.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::cache;
use crate::describe::{Kind, TypeDescriptor, TypeRef};
use crate::encoder::escape;
use crate::encoder::program::{EmptyCheck, EncodeProgram, Op, ProgramCell};
use crate::error::{CodecError, Result};

/// Compile the output program for `tref`.
///
/// A top-level type with no representation fails here. Unsupported types
/// nested inside a representable one compile to an op that fails only when
/// it is reached.
pub fn compile_encoder(tref: TypeRef) -> Result<Arc<EncodeProgram>> {
    let desc = tref.descriptor();
    if matches!(desc.kind(), Kind::Unsupported) && desc.hooks().encode.is_none() {
        return Err(CodecError::UnsupportedType {
            type_name: tref.name(),
        });
    }

    let mut session = Session::default();
    session.compile(tref, false)?;
    let program = Arc::new(EncodeProgram {
        key: tref.key(),
        ops: session.ops,
    });

    let root = tref.key().id();
    for (id, (pending, cell)) in session.cells {
        if id == root {
            cell.fill(program.clone());
        } else {
            cell.fill(cache::encoder_for_ref(pending)?);
        }
    }

    tracing::debug!(type_name = tref.name(), ops = program.len(), "compiled encode program");
    Ok(program)
}

#[derive(Default)]
struct Session {
    ops: Vec<Op>,
    /// Types whose bodies are currently being emitted.
    stack: Vec<TypeId>,
    /// Placeholders handed out for back-references.
    cells: HashMap<TypeId, (TypeRef, Arc<ProgramCell>)>,
}

impl Session {
    fn compile(&mut self, tref: TypeRef, quoted: bool) -> Result<()> {
        let desc = tref.descriptor();
        if let Some(hook) = desc.hooks().encode {
            self.ops.push(Op::Hook {
                hook,
                type_name: tref.name(),
            });
            return Ok(());
        }

        let id = tref.key().id();
        let composite = matches!(
            desc.kind(),
            Kind::Struct(_) | Kind::Seq(_) | Kind::Map(_) | Kind::Option(_) | Kind::Pointer(_)
        );
        if composite && self.stack.contains(&id) {
            let cell = self
                .cells
                .entry(id)
                .or_insert_with(|| (tref, Arc::new(ProgramCell::default())))
                .1
                .clone();
            self.ops.push(Op::Recurse {
                type_name: tref.name(),
                cell,
            });
            return Ok(());
        }

        if composite {
            self.stack.push(id);
        }
        let result = self.body(tref, &desc, quoted);
        if composite {
            self.stack.pop();
        }
        result
    }

    fn body(&mut self, tref: TypeRef, desc: &TypeDescriptor, quoted: bool) -> Result<()> {
        match desc.kind() {
            Kind::Prim(prim) => self.ops.push(Op::Prim { prim: *prim, quoted }),
            Kind::Number => self.ops.push(Op::Number { quoted }),
            Kind::Raw => self.ops.push(Op::Raw),
            Kind::Dynamic => self.ops.push(Op::Dynamic),
            Kind::Unsupported => self.ops.push(Op::Unsupported {
                type_name: tref.name(),
            }),
            Kind::Struct(shape) => {
                self.ops.push(Op::BeginObject);
                for field in shape.fields() {
                    self.ops.push(Op::Enter {
                        field: field.declared,
                        path: field.path.clone(),
                    });
                    let skip = if field.omit_empty {
                        let check = empty_check(&field.ty.descriptor());
                        self.ops.push(Op::SkipIfEmpty { check, target: 0 });
                        Some(self.ops.len() - 1)
                    } else {
                        None
                    };
                    self.ops.push(key_op(&field.name));
                    self.compile(field.ty, field.quoted)?;
                    let leave = self.ops.len();
                    self.ops.push(Op::Leave);
                    if let Some(at) = skip {
                        self.patch(at, leave);
                    }
                }
                self.ops.push(Op::EndObject);
            }
            Kind::Seq(shape) => {
                let begin = self.ops.len();
                self.ops.push(Op::SeqBegin {
                    ops: shape.ops,
                    end: 0,
                });
                let body = self.ops.len();
                self.compile(shape.elem, false)?;
                self.ops.push(Op::SeqNext { body });
                let end = self.ops.len();
                self.patch(begin, end);
            }
            Kind::Map(shape) => {
                let begin = self.ops.len();
                self.ops.push(Op::MapBegin {
                    ops: shape.ops,
                    end: 0,
                });
                let body = self.ops.len();
                self.compile(shape.value, false)?;
                self.ops.push(Op::MapNext { body });
                let end = self.ops.len();
                self.patch(begin, end);
            }
            Kind::Option(shape) => {
                let enter = self.ops.len();
                self.ops.push(Op::OptionEnter {
                    ops: shape.ops,
                    target: 0,
                });
                self.compile(shape.inner, quoted)?;
                self.ops.push(Op::Leave);
                let after = self.ops.len();
                self.patch(enter, after);
            }
            Kind::Pointer(shape) => {
                self.ops.push(Op::Deref {
                    ops: shape.ops,
                    shared: shape.shared,
                    type_name: tref.name(),
                });
                self.compile(shape.inner, quoted)?;
                self.ops.push(Op::LeaveDeref { shared: shape.shared });
            }
        }
        Ok(())
    }

    fn patch(&mut self, at: usize, to: usize) {
        match &mut self.ops[at] {
            Op::SkipIfEmpty { target, .. } | Op::OptionEnter { target, .. } => *target = to,
            Op::SeqBegin { end, .. } | Op::MapBegin { end, .. } => *end = to,
            _ => {}
        }
    }
}

fn key_op(name: &str) -> Op {
    let mut plain = Vec::with_capacity(name.len() + 2);
    escape::write_str(&mut plain, name, false);
    let mut html = Vec::with_capacity(name.len() + 2);
    escape::write_str(&mut html, name, true);
    Op::Key {
        plain: plain.into_boxed_slice(),
        html: html.into_boxed_slice(),
    }
}

fn empty_check(desc: &TypeDescriptor) -> EmptyCheck {
    match desc.kind() {
        Kind::Prim(prim) => EmptyCheck::Prim(*prim),
        Kind::Number => EmptyCheck::Number,
        Kind::Raw => EmptyCheck::Raw,
        Kind::Dynamic => EmptyCheck::Dynamic,
        Kind::Seq(shape) => EmptyCheck::Len(shape.ops.len),
        Kind::Map(shape) => EmptyCheck::Len(shape.ops.len),
        Kind::Option(shape) => EmptyCheck::Absent(shape.ops.get),
        Kind::Struct(_) | Kind::Pointer(_) | Kind::Unsupported => EmptyCheck::Never,
    }
}
