//! Output side: program compilation and execution.
//!
//! - [`compile`]: descriptor → flat [`EncodeProgram`]
//! - `vm`: the instruction interpreter
//! - `emit`: the four literal-emission modes
//! - `escape`: string and number formatting
//! - `splice`: validation and re-layout of pre-encoded JSON

pub mod compile;
pub(crate) mod emit;
pub(crate) mod escape;
mod program;
pub(crate) mod splice;
mod vm;

use std::any::Any;
use std::sync::Arc;

pub use compile::compile_encoder;
pub use program::EncodeProgram;

use crate::context::{OptionFlags, RuntimeContext};
use crate::error::{CodecError, Result};
use emit::{Compact, Emitter, Indented, Plain};
use vm::Machine;

/// Run `program` against `value` and return the encoded bytes.
///
/// Options reach the interpreter through `ctx` (see
/// [`RuntimeContext::apply_encode`]). On failure nothing is returned; any
/// partially written output stays in the context and is discarded when the
/// context is reset.
pub fn produce_output(ctx: &mut RuntimeContext, program: &Arc<EncodeProgram>, value: &dyn Any) -> Result<Vec<u8>> {
    write_output(ctx, program, value)?;
    Ok(ctx.buf.clone())
}

/// Like [`produce_output`] but leaves the bytes in the context buffer.
pub(crate) fn write_output(ctx: &mut RuntimeContext, program: &Arc<EncodeProgram>, value: &dyn Any) -> Result<()> {
    if value.type_id() != program.key.id() {
        return Err(CodecError::InvalidTarget {
            expected: program.type_name(),
            found: "a value of another type",
        });
    }
    ctx.buf.clear();
    ctx.in_flight.clear();

    let flags = ctx.flags;
    let escape_html = flags.contains(OptionFlags::ESCAPE_HTML);
    let RuntimeContext {
        buf,
        colors,
        prefix,
        indent,
        in_flight,
        max_depth,
        cancel,
        ..
    } = ctx;
    let colors = colors.as_ref().filter(|_| flags.contains(OptionFlags::COLORIZE));
    let indented = flags.contains(OptionFlags::INDENT);

    macro_rules! run {
        ($layout:expr, $paint:expr) => {
            Machine {
                emit: Emitter::new(buf, $layout, $paint, escape_html),
                in_flight,
                max_depth: *max_depth,
                cancel: cancel.as_ref(),
                flags,
                unordered: flags.contains(OptionFlags::UNORDERED_MAP),
                debug: flags.contains(OptionFlags::DEBUG),
            }
            .run(program, value)
        };
    }

    match (indented, colors) {
        (false, None) => run!(Compact, Plain),
        (true, None) => run!(Indented { prefix, indent }, Plain),
        (false, Some(scheme)) => run!(Compact, scheme),
        (true, Some(scheme)) => run!(Indented { prefix, indent }, scheme),
    }
}
