//! String and number literal formatting.

use std::fmt;
use std::io::Write as _;

use crate::error::{CodecError, Result};

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Write `s` as a quoted JSON string.
///
/// `"`, `\` and control characters are always escaped, as are U+2028 and
/// U+2029. With `escape_html`, `<`, `>` and `&` are written as `\u003c`,
/// `\u003e` and `\u0026`.
pub(crate) fn write_str(out: &mut Vec<u8>, s: &str, escape_html: bool) {
    out.push(b'"');
    write_str_body(out, s.as_bytes(), escape_html);
    out.push(b'"');
}

fn write_str_body(out: &mut Vec<u8>, bytes: &[u8], escape_html: bool) {
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let short: Option<&[u8]> = match b {
            b'"' => Some(b"\\\""),
            b'\\' => Some(b"\\\\"),
            b'\n' => Some(b"\\n"),
            b'\r' => Some(b"\\r"),
            b'\t' => Some(b"\\t"),
            0x08 => Some(b"\\b"),
            0x0c => Some(b"\\f"),
            _ => None,
        };
        if let Some(esc) = short {
            out.extend_from_slice(&bytes[start..i]);
            out.extend_from_slice(esc);
            i += 1;
            start = i;
            continue;
        }
        if b < 0x20 || (escape_html && matches!(b, b'<' | b'>' | b'&')) {
            out.extend_from_slice(&bytes[start..i]);
            write_u_escape(out, b as u16);
            i += 1;
            start = i;
            continue;
        }
        // U+2028 / U+2029 are E2 80 A8 / E2 80 A9 in UTF-8.
        if b == 0xE2 && i + 2 < bytes.len() && bytes[i + 1] == 0x80 && matches!(bytes[i + 2], 0xA8 | 0xA9) {
            out.extend_from_slice(&bytes[start..i]);
            out.extend_from_slice(if bytes[i + 2] == 0xA8 { b"\\u2028" } else { b"\\u2029" });
            i += 3;
            start = i;
            continue;
        }
        i += 1;
    }
    out.extend_from_slice(&bytes[start..]);
}

fn write_u_escape(out: &mut Vec<u8>, unit: u16) {
    out.extend_from_slice(b"\\u");
    for shift in [12u16, 8, 4, 0] {
        out.push(HEX[((unit >> shift) & 0xF) as usize]);
    }
}

/// Apply markup escaping to an already well-formed string literal.
pub(crate) fn write_literal_html_escaped(out: &mut Vec<u8>, literal: &[u8]) {
    let mut start = 0;
    for (i, &b) in literal.iter().enumerate() {
        if matches!(b, b'<' | b'>' | b'&') {
            out.extend_from_slice(&literal[start..i]);
            write_u_escape(out, b as u16);
            start = i + 1;
        }
    }
    out.extend_from_slice(&literal[start..]);
}

pub(crate) fn write_display(out: &mut Vec<u8>, value: impl fmt::Display) {
    // Writing into a Vec<u8> cannot fail.
    let _ = write!(out, "{value}");
}

/// Finite floats only. Very large and very small magnitudes use exponent
/// notation; everything else is the shortest round-tripping decimal.
pub(crate) fn write_f64(out: &mut Vec<u8>, v: f64) -> Result<()> {
    if !v.is_finite() {
        return Err(CodecError::unsupported_value(format!("unsupported float value {v}")));
    }
    let abs = v.abs();
    if abs != 0.0 && !(1e-6..1e21).contains(&abs) {
        let _ = write!(out, "{v:e}");
    } else {
        write_display(out, v);
    }
    Ok(())
}

pub(crate) fn write_f32(out: &mut Vec<u8>, v: f32) -> Result<()> {
    if !v.is_finite() {
        return Err(CodecError::unsupported_value(format!("unsupported float value {v}")));
    }
    let abs = v.abs();
    if abs != 0.0 && !(1e-6..1e21).contains(&abs) {
        let _ = write!(out, "{v:e}");
    } else {
        write_display(out, v);
    }
    Ok(())
}

/// Whether `text` is a JSON number literal.
pub(crate) fn is_number_literal(text: &[u8]) -> bool {
    let mut i = 0;
    let n = text.len();
    if i < n && text[i] == b'-' {
        i += 1;
    }
    match text.get(i) {
        Some(b'0') => i += 1,
        Some(b'1'..=b'9') => {
            while i < n && text[i].is_ascii_digit() {
                i += 1;
            }
        }
        _ => return false,
    }
    if i < n && text[i] == b'.' {
        i += 1;
        let digits = i;
        while i < n && text[i].is_ascii_digit() {
            i += 1;
        }
        if i == digits {
            return false;
        }
    }
    if i < n && matches!(text[i], b'e' | b'E') {
        i += 1;
        if i < n && matches!(text[i], b'+' | b'-') {
            i += 1;
        }
        let digits = i;
        while i < n && text[i].is_ascii_digit() {
            i += 1;
        }
        if i == digits {
            return false;
        }
    }
    i == n
}
