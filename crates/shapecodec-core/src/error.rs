//! Error types for compilation, encoding and decoding.

use thiserror::Error;

/// Boxed error returned by custom encode/decode hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while compiling, encoding or decoding a value.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The input text is not well-formed JSON.
    /// `offset` is the byte offset of the first violating character.
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { message: String, offset: usize },

    /// A type with no JSON representation was reached.
    #[error("unsupported type: {type_name}")]
    UnsupportedType { type_name: &'static str },

    /// A representable type holds a value with no JSON representation
    /// (non-finite float, reference cycle, excessive nesting).
    #[error("unsupported value: {message}")]
    UnsupportedValue { message: String },

    /// The input token cannot be stored in the destination's type.
    #[error("cannot decode {found} into {path} of type {type_name} (offset {offset})")]
    TypeMismatch {
        found: &'static str,
        type_name: &'static str,
        path: String,
        offset: usize,
    },

    /// An object key matched no field while unknown fields are denied.
    #[error("unknown field {key:?} for type {type_name} (offset {offset})")]
    UnknownField {
        key: String,
        type_name: &'static str,
        offset: usize,
    },

    /// The decode destination is not a value of the program's type.
    #[error("invalid decode target: expected {expected}, found {found}")]
    InvalidTarget {
        expected: &'static str,
        found: &'static str,
    },

    /// A custom encode/decode hook failed or produced malformed output.
    #[error("error calling {routine} for type {type_name}: {source}")]
    Hook {
        type_name: &'static str,
        routine: &'static str,
        #[source]
        source: BoxError,
    },

    /// The call observed its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// The underlying reader or writer failed (streaming only).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub(crate) fn syntax(message: impl Into<String>, offset: usize) -> Self {
        CodecError::Syntax {
            message: message.into(),
            offset,
        }
    }

    pub(crate) fn unsupported_value(message: impl Into<String>) -> Self {
        CodecError::UnsupportedValue {
            message: message.into(),
        }
    }

    /// Byte offset carried by input-side errors, if any.
    pub fn offset(&self) -> Option<usize> {
        match self {
            CodecError::Syntax { offset, .. }
            | CodecError::TypeMismatch { offset, .. }
            | CodecError::UnknownField { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// Shift input offsets by `base` (used by the stream decoder, which
    /// decodes each value from a window of the whole stream).
    pub(crate) fn rebase(mut self, base: usize) -> Self {
        match &mut self {
            CodecError::Syntax { offset, .. }
            | CodecError::TypeMismatch { offset, .. }
            | CodecError::UnknownField { offset, .. } => *offset += base,
            _ => {}
        }
        self
    }
}

/// Convenience alias used throughout shapecodec-core.
pub type Result<T> = std::result::Result<T, CodecError>;
