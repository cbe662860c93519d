//! Custom encode/decode routines a type can substitute for its generated
//! instructions.

use std::any::Any;

use crate::context::OptionFlags;
use crate::error::BoxError;
use crate::options::CancelToken;

/// Per-call state handed to a hook: the active option flags, the call's
/// cancellation token and the nesting depth of the hooked value.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub(crate) flags: OptionFlags,
    pub(crate) cancel: Option<&'a CancelToken>,
    pub(crate) depth: usize,
}

impl<'a> HookContext<'a> {
    pub fn flags(&self) -> OptionFlags {
        self.flags
    }

    pub fn cancel_token(&self) -> Option<&'a CancelToken> {
        self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(CancelToken::is_cancelled)
    }

    /// Containers entered above the hooked value (0 at the top level).
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// A type that renders itself as JSON.
///
/// The returned bytes must be exactly one well-formed JSON value. They are
/// validated, then compacted (or re-indented) before being spliced into the
/// surrounding output.
pub trait EncodeHook {
    fn encode_json(&self) -> std::result::Result<Vec<u8>, BoxError>;

    /// The routine the encoder calls. Override it to observe the call's
    /// options or cancellation token.
    fn encode_json_with(&self, cx: &HookContext<'_>) -> std::result::Result<Vec<u8>, BoxError> {
        let _ = cx;
        self.encode_json()
    }
}

/// A type that parses itself from the exact bytes of one JSON value.
pub trait DecodeHook {
    fn decode_json(&mut self, input: &[u8]) -> std::result::Result<(), BoxError>;

    /// The routine the decoder calls. Override it to observe the call's
    /// options or cancellation token.
    fn decode_json_with(&mut self, input: &[u8], cx: &HookContext<'_>) -> std::result::Result<(), BoxError> {
        let _ = cx;
        self.decode_json(input)
    }
}

/// Type-erased encode routine. `None` means the value was not of the hook's type.
pub type EncodeHookFn = fn(&dyn Any, &HookContext<'_>) -> Option<std::result::Result<Vec<u8>, BoxError>>;

/// Type-erased decode routine. `None` means the destination was not of the hook's type.
pub type DecodeHookFn = fn(&mut dyn Any, &[u8], &HookContext<'_>) -> Option<std::result::Result<(), BoxError>>;

#[derive(Default, Clone, Copy)]
pub struct Hooks {
    pub encode: Option<EncodeHookFn>,
    pub decode: Option<DecodeHookFn>,
}

fn call_encode<T: EncodeHook + 'static>(
    value: &dyn Any,
    cx: &HookContext<'_>,
) -> Option<std::result::Result<Vec<u8>, BoxError>> {
    value.downcast_ref::<T>().map(|v| v.encode_json_with(cx))
}

fn call_decode<T: DecodeHook + 'static>(
    dest: &mut dyn Any,
    input: &[u8],
    cx: &HookContext<'_>,
) -> Option<std::result::Result<(), BoxError>> {
    dest.downcast_mut::<T>().map(|d| d.decode_json_with(input, cx))
}

pub(super) fn encode_hook_fn<T: EncodeHook + 'static>() -> EncodeHookFn {
    call_encode::<T>
}

pub(super) fn decode_hook_fn<T: DecodeHook + 'static>() -> DecodeHookFn {
    call_decode::<T>
}
