//! One-call entry points: look up (or compile) the program, borrow a pooled
//! context, run the engine.

use std::io::Write;

use crate::cache;
use crate::context;
use crate::decoder::consume_input;
use crate::describe::Describe;
use crate::encoder::{self, produce_output};
use crate::error::{CodecError, Result};
use crate::options::{DecodeOptions, EncodeOptions, Indent};

/// Encode `value` as compact JSON with default options.
pub fn to_vec<T: Describe>(value: &T) -> Result<Vec<u8>> {
    to_vec_with(value, &EncodeOptions::default())
}

pub fn to_vec_with<T: Describe>(value: &T, options: &EncodeOptions) -> Result<Vec<u8>> {
    let program = cache::encoder_for::<T>()?;
    let mut ctx = context::acquire();
    ctx.apply_encode(options);
    produce_output(&mut ctx, &program, value)
}

/// Encode with one member or element per line, each line starting with
/// `prefix` followed by one `indent` per nesting level.
pub fn to_vec_pretty<T: Describe>(value: &T, prefix: &str, indent: &str) -> Result<Vec<u8>> {
    to_vec_with(value, &EncodeOptions::default().with_indent(prefix, indent))
}

pub fn to_string<T: Describe>(value: &T) -> Result<String> {
    to_string_with(value, &EncodeOptions::default())
}

pub fn to_string_with<T: Describe>(value: &T, options: &EncodeOptions) -> Result<String> {
    let bytes = to_vec_with(value, options)?;
    // Hook output is spliced byte for byte and may carry invalid UTF-8.
    String::from_utf8(bytes).map_err(|e| CodecError::unsupported_value(format!("output is not UTF-8: {e}")))
}

/// Decode a new `T` from `input`.
///
/// Decoding starts from [`Describe::zero`]; types without one cannot be
/// decoded this way (use [`from_slice_into`]).
pub fn from_slice<T: Describe>(input: &[u8]) -> Result<T> {
    from_slice_with(input, &DecodeOptions::default())
}

pub fn from_slice_with<T: Describe>(input: &[u8], options: &DecodeOptions) -> Result<T> {
    let mut value = T::zero().ok_or(CodecError::UnsupportedType {
        type_name: std::any::type_name::<T>(),
    })?;
    from_slice_into_with(input, &mut value, options)?;
    Ok(value)
}

pub fn from_str<T: Describe>(input: &str) -> Result<T> {
    from_slice(input.as_bytes())
}

/// Decode into an existing value. Fields absent from the input keep their
/// current contents; maps keep entries the input does not mention.
pub fn from_slice_into<T: Describe>(input: &[u8], dest: &mut T) -> Result<()> {
    from_slice_into_with(input, dest, &DecodeOptions::default())
}

pub fn from_slice_into_with<T: Describe>(input: &[u8], dest: &mut T, options: &DecodeOptions) -> Result<()> {
    let program = cache::decoder_for::<T>()?;
    let mut ctx = context::acquire();
    ctx.apply_decode(options);
    consume_input(&mut ctx, &program, input, dest)?;
    Ok(())
}

/// Writes a sequence of values to `W`, each followed by a newline.
pub struct StreamEncoder<W> {
    writer: W,
    options: EncodeOptions,
}

impl<W: Write> StreamEncoder<W> {
    pub fn new(writer: W) -> Self {
        Self::with_options(writer, EncodeOptions::default())
    }

    pub fn with_options(writer: W, options: EncodeOptions) -> Self {
        StreamEncoder { writer, options }
    }

    pub fn set_indent(&mut self, prefix: &str, indent: &str) {
        self.options.indent = Some(Indent::new(prefix, indent));
    }

    pub fn set_escape_html(&mut self, on: bool) {
        self.options.escape_html = on;
    }

    pub fn options_mut(&mut self) -> &mut EncodeOptions {
        &mut self.options
    }

    /// Encode `value` and write it. Nothing is written if encoding fails.
    pub fn encode<T: Describe>(&mut self, value: &T) -> Result<()> {
        let program = cache::encoder_for::<T>()?;
        let mut ctx = context::acquire();
        ctx.apply_encode(&self.options);
        encoder::write_output(&mut ctx, &program, value)?;
        ctx.buf.push(b'\n');
        self.writer.write_all(&ctx.buf)?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
