//! Literal emission.
//!
//! One [`Emitter`] type, generic over whitespace [`Layout`] and colour
//! [`Paint`], gives the four output modes: compact, indented, colourized and
//! indented-colourized. The interpreter is monomorphised once per mode.

use crate::encoder::escape;
use crate::options::{ColorFormat, ColorScheme};

/// Literal class, for colourized output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Class {
    Int,
    Uint,
    Float,
    Bool,
    String,
    Key,
    Null,
}

pub(crate) trait Layout {
    /// Before a member of a container nested `depth` levels deep.
    fn member(&self, out: &mut Vec<u8>, depth: usize);
    /// Between an object key and its value.
    fn colon(&self, out: &mut Vec<u8>);
    /// Before the closing bracket of a non-empty container whose parent is
    /// `depth` levels deep.
    fn close(&self, out: &mut Vec<u8>, depth: usize);
}

pub(crate) struct Compact;

impl Layout for Compact {
    #[inline(always)]
    fn member(&self, _: &mut Vec<u8>, _: usize) {}

    #[inline(always)]
    fn colon(&self, out: &mut Vec<u8>) {
        out.push(b':');
    }

    #[inline(always)]
    fn close(&self, _: &mut Vec<u8>, _: usize) {}
}

pub(crate) struct Indented<'a> {
    pub prefix: &'a str,
    pub indent: &'a str,
}

impl Indented<'_> {
    fn newline(&self, out: &mut Vec<u8>, depth: usize) {
        out.push(b'\n');
        out.extend_from_slice(self.prefix.as_bytes());
        for _ in 0..depth {
            out.extend_from_slice(self.indent.as_bytes());
        }
    }
}

impl Layout for Indented<'_> {
    fn member(&self, out: &mut Vec<u8>, depth: usize) {
        self.newline(out, depth);
    }

    fn colon(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(b": ");
    }

    fn close(&self, out: &mut Vec<u8>, depth: usize) {
        self.newline(out, depth);
    }
}

pub(crate) trait Paint {
    fn begin(&self, out: &mut Vec<u8>, class: Class);
    fn end(&self, out: &mut Vec<u8>, class: Class);
}

pub(crate) struct Plain;

impl Paint for Plain {
    #[inline(always)]
    fn begin(&self, _: &mut Vec<u8>, _: Class) {}

    #[inline(always)]
    fn end(&self, _: &mut Vec<u8>, _: Class) {}
}

fn format_for(scheme: &ColorScheme, class: Class) -> &ColorFormat {
    match class {
        Class::Int => &scheme.int,
        Class::Uint => &scheme.uint,
        Class::Float => &scheme.float,
        Class::Bool => &scheme.bool,
        Class::String => &scheme.string,
        Class::Key => &scheme.object_key,
        Class::Null => &scheme.null,
    }
}

impl Paint for &ColorScheme {
    fn begin(&self, out: &mut Vec<u8>, class: Class) {
        out.extend_from_slice(format_for(self, class).header.as_bytes());
    }

    fn end(&self, out: &mut Vec<u8>, class: Class) {
        out.extend_from_slice(format_for(self, class).footer.as_bytes());
    }
}

pub(crate) struct Emitter<'a, L, P> {
    pub(crate) out: &'a mut Vec<u8>,
    /// One entry per open container: whether it has members yet.
    levels: Vec<bool>,
    layout: L,
    paint: P,
    escape_html: bool,
}

impl<'a, L: Layout, P: Paint> Emitter<'a, L, P> {
    pub(crate) fn new(out: &'a mut Vec<u8>, layout: L, paint: P, escape_html: bool) -> Self {
        Emitter {
            out,
            levels: Vec::new(),
            layout,
            paint,
            escape_html,
        }
    }

    #[inline]
    pub(crate) fn escape_html(&self) -> bool {
        self.escape_html
    }

    fn separator(&mut self) {
        let depth = self.levels.len();
        if let Some(has_members) = self.levels.last_mut() {
            if *has_members {
                self.out.push(b',');
            }
            *has_members = true;
            self.layout.member(self.out, depth);
        }
    }

    pub(crate) fn begin_object(&mut self) {
        self.out.push(b'{');
        self.levels.push(false);
    }

    pub(crate) fn end_object(&mut self) {
        self.close(b'}');
    }

    pub(crate) fn begin_array(&mut self) {
        self.out.push(b'[');
        self.levels.push(false);
    }

    pub(crate) fn end_array(&mut self) {
        self.close(b']');
    }

    fn close(&mut self, bracket: u8) {
        if self.levels.pop().unwrap_or(false) {
            self.layout.close(self.out, self.levels.len());
        }
        self.out.push(bracket);
    }

    /// Start the next array element.
    pub(crate) fn element(&mut self) {
        self.separator();
    }

    /// Object key from pre-quoted, pre-escaped text.
    pub(crate) fn key_literal(&mut self, quoted: &[u8]) {
        self.separator();
        self.paint.begin(self.out, Class::Key);
        self.out.extend_from_slice(quoted);
        self.paint.end(self.out, Class::Key);
        self.layout.colon(self.out);
    }

    /// Object key escaped at run time (map keys).
    pub(crate) fn key_str(&mut self, key: &str) {
        self.separator();
        self.paint.begin(self.out, Class::Key);
        escape::write_str(self.out, key, self.escape_html);
        self.paint.end(self.out, Class::Key);
        self.layout.colon(self.out);
    }

    /// Key copied from a well-formed string literal (spliced JSON).
    pub(crate) fn key_verbatim(&mut self, literal: &[u8]) {
        self.separator();
        self.paint.begin(self.out, Class::Key);
        self.verbatim_string(literal);
        self.paint.end(self.out, Class::Key);
        self.layout.colon(self.out);
    }

    pub(crate) fn null(&mut self) {
        self.paint.begin(self.out, Class::Null);
        self.out.extend_from_slice(b"null");
        self.paint.end(self.out, Class::Null);
    }

    /// Scalar written by `write`, optionally wrapped in quotes.
    #[inline]
    pub(crate) fn scalar<R>(&mut self, class: Class, quoted: bool, write: impl FnOnce(&mut Vec<u8>) -> R) -> R {
        self.paint.begin(self.out, class);
        if quoted {
            self.out.push(b'"');
        }
        let r = write(self.out);
        if quoted {
            self.out.push(b'"');
        }
        self.paint.end(self.out, class);
        r
    }

    pub(crate) fn string(&mut self, s: &str) {
        self.paint.begin(self.out, Class::String);
        escape::write_str(self.out, s, self.escape_html);
        self.paint.end(self.out, Class::String);
    }

    /// String literal copied from well-formed JSON text.
    pub(crate) fn string_verbatim(&mut self, literal: &[u8]) {
        self.paint.begin(self.out, Class::String);
        self.verbatim_string(literal);
        self.paint.end(self.out, Class::String);
    }

    fn verbatim_string(&mut self, literal: &[u8]) {
        if self.escape_html {
            escape::write_literal_html_escaped(self.out, literal);
        } else {
            self.out.extend_from_slice(literal);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render<L: Layout>(layout: L) -> String {
        let mut out = Vec::new();
        let mut e = Emitter::new(&mut out, layout, Plain, true);
        e.begin_object();
        e.key_str("a");
        e.begin_array();
        e.element();
        e.scalar(Class::Int, false, |o| o.push(b'1'));
        e.element();
        e.begin_object();
        e.end_object();
        e.end_array();
        e.key_str("b");
        e.null();
        e.end_object();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn compact_layout() {
        assert_eq!(render(Compact), r#"{"a":[1,{}],"b":null}"#);
    }

    #[test]
    fn indented_layout() {
        let expected = "{\n  \"a\": [\n    1,\n    {}\n  ],\n  \"b\": null\n}";
        assert_eq!(render(Indented { prefix: "", indent: "  " }), expected);
    }

    #[test]
    fn prefix_starts_every_line_after_the_first() {
        let out = render(Indented { prefix: "//", indent: "\t" });
        assert!(out.starts_with("{\n//\t\"a\""));
        assert!(out.ends_with("\n//}"));
    }

    #[test]
    fn colours_wrap_literals() {
        let scheme = ColorScheme::default();
        let mut out = Vec::new();
        let mut e = Emitter::new(&mut out, Compact, &scheme, false);
        e.begin_object();
        e.key_str("k");
        e.string("v");
        e.end_object();
        let text = String::from_utf8(out).unwrap();
        let key = format!("{}\"k\"{}", scheme.object_key.header, scheme.object_key.footer);
        let val = format!("{}\"v\"{}", scheme.string.header, scheme.string.footer);
        assert_eq!(text, format!("{{{key}:{val}}}"));
    }
}
