//! Per-call options for encoding and decoding.
//!
//! Options are plain data and (de)serialize with serde, so a tool can load
//! them from a JSON configuration file. The cancellation token is the one
//! runtime-only field and is never serialized.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Default nesting limit for output.
pub const DEFAULT_ENCODE_MAX_DEPTH: usize = 1000;

/// Default nesting limit for input.
pub const DEFAULT_DECODE_MAX_DEPTH: usize = 1000;

/// Nesting limit for typed destinations, whose resolvers recurse once per
/// level. `Dynamic`, `RawValue` and skipped values are bounded by
/// `max_depth` alone.
pub const TYPED_DEPTH_LIMIT: usize = 512;

/// Cooperative cancellation flag, polled at container boundaries.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl PartialEq for CancelToken {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CancelToken").field(&self.is_cancelled()).finish()
    }
}

/// Text written before and after one class of literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorFormat {
    pub header: String,
    pub footer: String,
}

impl ColorFormat {
    pub fn ansi(code: &str) -> Self {
        ColorFormat {
            header: format!("\x1b[{code}m"),
            footer: "\x1b[0m".to_string(),
        }
    }
}

/// Per-literal-class colour wrapping for colourized output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorScheme {
    pub int: ColorFormat,
    pub uint: ColorFormat,
    pub float: ColorFormat,
    pub bool: ColorFormat,
    pub string: ColorFormat,
    pub object_key: ColorFormat,
    pub null: ColorFormat,
}

impl Default for ColorScheme {
    fn default() -> Self {
        ColorScheme {
            int: ColorFormat::ansi("1;95"),
            uint: ColorFormat::ansi("1;95"),
            float: ColorFormat::ansi("1;95"),
            bool: ColorFormat::ansi("1;93"),
            string: ColorFormat::ansi("1;92"),
            object_key: ColorFormat::ansi("1;96"),
            null: ColorFormat::ansi("1;34"),
        }
    }
}

/// Indented output: every line after the first starts with `prefix`,
/// followed by one `indent` per nesting level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Indent {
    pub prefix: String,
    pub indent: String,
}

impl Indent {
    pub fn new(prefix: impl Into<String>, indent: impl Into<String>) -> Self {
        Indent {
            prefix: prefix.into(),
            indent: indent.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// Escape `<`, `>` and `&` inside strings.
    pub escape_html: bool,
    /// Write map entries in iteration order instead of sorted key order.
    pub unordered_map: bool,
    /// Trace every executed instruction and dump the program on failure.
    pub debug: bool,
    pub colorize: Option<ColorScheme>,
    pub indent: Option<Indent>,
    pub max_depth: usize,
    #[serde(skip)]
    pub cancel: Option<CancelToken>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            escape_html: true,
            unordered_map: false,
            debug: false,
            colorize: None,
            indent: None,
            max_depth: DEFAULT_ENCODE_MAX_DEPTH,
            cancel: None,
        }
    }
}

impl EncodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_indent(mut self, prefix: impl Into<String>, indent: impl Into<String>) -> Self {
        self.indent = Some(Indent::new(prefix, indent));
        self
    }

    pub fn with_colors(mut self, scheme: ColorScheme) -> Self {
        self.colorize = Some(scheme);
        self
    }

    pub fn with_escape_html(mut self, on: bool) -> Self {
        self.escape_html = on;
        self
    }

    pub fn with_unordered_map(mut self, on: bool) -> Self {
        self.unordered_map = on;
        self
    }

    pub fn with_debug(mut self, on: bool) -> Self {
        self.debug = on;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Which occurrence of a repeated object key is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    FirstWins,
    #[default]
    LastWins,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    pub duplicate_keys: DuplicateKeyPolicy,
    /// Reject object keys that match no struct field.
    pub deny_unknown_fields: bool,
    /// Decode numbers into dynamic values as [`crate::Number`] instead of `f64`.
    pub use_number: bool,
    pub max_depth: usize,
    #[serde(skip)]
    pub cancel: Option<CancelToken>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            duplicate_keys: DuplicateKeyPolicy::LastWins,
            deny_unknown_fields: false,
            use_number: false,
            max_depth: DEFAULT_DECODE_MAX_DEPTH,
            cancel: None,
        }
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duplicate_keys(mut self, policy: DuplicateKeyPolicy) -> Self {
        self.duplicate_keys = policy;
        self
    }

    pub fn with_deny_unknown_fields(mut self, on: bool) -> Self {
        self.deny_unknown_fields = on;
        self
    }

    pub fn with_use_number(mut self, on: bool) -> Self {
        self.use_number = on;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_escape_html_and_sort_maps() {
        let opts = EncodeOptions::default();
        assert!(opts.escape_html);
        assert!(!opts.unordered_map);
        assert_eq!(opts.max_depth, DEFAULT_ENCODE_MAX_DEPTH);
        assert_eq!(DecodeOptions::default().duplicate_keys, DuplicateKeyPolicy::LastWins);
    }

    #[test]
    fn options_load_from_partial_json() {
        let opts: DecodeOptions =
            serde_json::from_str(r#"{"duplicate_keys":"first_wins","use_number":true}"#).unwrap();
        assert_eq!(opts.duplicate_keys, DuplicateKeyPolicy::FirstWins);
        assert!(opts.use_number);
        assert!(!opts.deny_unknown_fields);
        assert_eq!(opts.max_depth, DEFAULT_DECODE_MAX_DEPTH);

        let enc: EncodeOptions = serde_json::from_str(r#"{"indent":{"indent":"\t"}}"#).unwrap();
        assert_eq!(enc.indent, Some(Indent::new("", "\t")));
        assert!(enc.escape_html);
    }

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        token.cancel();
        assert!(clone.is_cancelled());
        assert_eq!(token, clone);
    }
}
