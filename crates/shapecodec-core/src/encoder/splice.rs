//! Splicing pre-encoded JSON (hook output, raw values) into the output.
//!
//! The text is validated token by token and re-emitted through the active
//! emitter, which compacts it, or re-indents and colours it to match the
//! surrounding output.

use crate::decoder::scan::Scanner;
use crate::encoder::emit::{Class, Emitter, Layout, Paint};
use crate::error::Result;

pub(crate) fn splice<L: Layout, P: Paint>(emit: &mut Emitter<'_, L, P>, input: &[u8]) -> Result<()> {
    let mut sc = Scanner::new(input);
    // Closing bracket of each open container.
    let mut open: Vec<u8> = Vec::new();

    'value: loop {
        sc.skip_ws();
        match sc.peek() {
            Some(b'{') => {
                sc.pos += 1;
                emit.begin_object();
                sc.skip_ws();
                if sc.peek() == Some(b'}') {
                    sc.pos += 1;
                    emit.end_object();
                } else {
                    open.push(b'}');
                    key(&mut sc, emit)?;
                    continue 'value;
                }
            }
            Some(b'[') => {
                sc.pos += 1;
                emit.begin_array();
                sc.skip_ws();
                if sc.peek() == Some(b']') {
                    sc.pos += 1;
                    emit.end_array();
                } else {
                    open.push(b']');
                    emit.element();
                    continue 'value;
                }
            }
            Some(b'"') => {
                let start = sc.pos;
                sc.string_span()?;
                emit.string_verbatim(&input[start..sc.pos]);
            }
            Some(b't') => {
                sc.literal(b"true")?;
                emit.scalar(Class::Bool, false, |out| out.extend_from_slice(b"true"));
            }
            Some(b'f') => {
                sc.literal(b"false")?;
                emit.scalar(Class::Bool, false, |out| out.extend_from_slice(b"false"));
            }
            Some(b'n') => {
                sc.literal(b"null")?;
                emit.null();
            }
            Some(b'-' | b'0'..=b'9') => {
                let text = sc.number()?;
                let class = if text.contains(['.', 'e', 'E']) {
                    Class::Float
                } else if text.starts_with('-') {
                    Class::Int
                } else {
                    Class::Uint
                };
                emit.scalar(class, false, |out| out.extend_from_slice(text.as_bytes()));
            }
            _ => return Err(sc.unexpected("looking for beginning of value")),
        }

        loop {
            let Some(&close) = open.last() else {
                return sc.finish();
            };
            sc.skip_ws();
            match sc.peek() {
                Some(b',') => {
                    sc.pos += 1;
                    if close == b'}' {
                        key(&mut sc, emit)?;
                    } else {
                        emit.element();
                    }
                    continue 'value;
                }
                Some(c) if c == close => {
                    sc.pos += 1;
                    open.pop();
                    if close == b'}' {
                        emit.end_object();
                    } else {
                        emit.end_array();
                    }
                }
                _ => {
                    return Err(sc.unexpected(if close == b'}' {
                        "after object key:value pair"
                    } else {
                        "after array element"
                    }))
                }
            }
        }
    }
}

fn key<L: Layout, P: Paint>(sc: &mut Scanner<'_>, emit: &mut Emitter<'_, L, P>) -> Result<()> {
    let (start, end) = sc.object_key()?;
    emit.key_verbatim(&sc.input[start..end]);
    Ok(())
}
