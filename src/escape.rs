//! Percent-encoding primitives.
//!
//! See [RFC 3986 section 2.1](https://www.rfc-editor.org/rfc/rfc3986#section-2.1).
use std::borrow::Cow;

use percent_encoding::{percent_decode_str, percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Bytes escaped in a DID method-specific id: anything but `idchar`.
pub const ID_CHAR_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'-').remove(b'_');

/// Bytes escaped in a path segment: anything but `pchar`.
pub const SEGMENT_ESCAPES: &AsciiSet = &NON_ALPHANUMERIC
    // unreserved
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    // sub-delims
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=')
    .remove(b':')
    .remove(b'@');

/// Bytes escaped in a fragment.
pub const FRAGMENT_ESCAPES: &AsciiSet = &SEGMENT_ESCAPES.remove(b'/').remove(b'?');

/// Returns the value of an ASCII hexadecimal digit, in either case.
pub fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'A'..=b'F' => Some(c - b'A' + 10),
        b'a'..=b'f' => Some(c - b'a' + 10),
        _ => None,
    }
}

/// Decodes the two hexadecimal digits at `s[i..i + 2]`.
///
/// Returns `None` when the input is too short or when either byte is not a
/// hexadecimal digit.
pub fn decode_hex_pair(s: &[u8], i: usize) -> Option<u8> {
    let hi = hex_value(*s.get(i)?)?;
    let lo = hex_value(*s.get(i + 1)?)?;
    Some(hi << 4 | lo)
}

/// Percent-encodes a single octet, always with uppercase digits.
pub fn encode(b: u8) -> &'static str {
    percent_encoding::percent_encode_byte(b)
}

/// Escapes every byte in `set`, and any non-ASCII byte, with uppercase
/// digits. Input that needs no escaping is borrowed.
pub fn escape<'a>(bytes: &'a [u8], set: &'static AsciiSet) -> Cow<'a, str> {
    percent_encode(bytes, set).into()
}

/// Resolves percent-encodings on a best-effort basis.
///
/// Malformed encodings pass as is. Input without any encoding is borrowed.
pub fn unescape(s: &str) -> Cow<[u8]> {
    percent_decode_str(s).into()
}

/// Resolves the percent-encodings of unreserved characters only.
///
/// See [RFC 3986 section 6.2.2.2](https://www.rfc-editor.org/rfc/rfc3986#section-6.2.2.2).
pub(crate) fn decode_unreserved(s: &str) -> Cow<str> {
    let bytes = s.as_bytes();
    let mut buf = String::new();
    let (mut last, mut i) = (0, 0);
    while let Some(p) = bytes[i..].iter().position(|&b| b == b'%') {
        let at = i + p;
        match decode_hex_pair(bytes, at + 1) {
            Some(b) if is_unreserved(b) => {
                buf.push_str(&s[last..at]);
                buf.push(b as char);
                last = at + 3;
                i = at + 3;
            }
            _ => i = at + 1,
        }
    }

    if last == 0 {
        return Cow::Borrowed(s);
    }
    buf.push_str(&s[last..]);
    Cow::Owned(buf)
}

/// Iterator over the octets of an escaped string, decoding
/// percent-encodings on the fly. Malformed encodings yield a raw `%`.
pub(crate) struct Octets<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Octets<'a> {
    pub fn new(s: &'a str) -> Self {
        Self {
            bytes: s.as_bytes(),
            offset: 0,
        }
    }
}

impl<'a> Iterator for Octets<'a> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let b = *self.bytes.get(self.offset)?;
        if b == b'%' {
            if let Some(v) = decode_hex_pair(self.bytes, self.offset + 1) {
                self.offset += 3;
                return Some(v);
            }
        }

        self.offset += 1;
        Some(b)
    }
}

/// `unreserved = ALPHA / DIGIT / "-" / "." / "_" / "~"`
pub(crate) fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

/// `sub-delims = "!" / "$" / "&" / "'" / "(" / ")" / "*" / "+" / "," / ";" / "="`
pub(crate) fn is_sub_delim(b: u8) -> bool {
    matches!(
        b,
        b'!' | b'$' | b'&' | b'\'' | b'(' | b')' | b'*' | b'+' | b',' | b';' | b'='
    )
}

/// `pchar` without the `pct-encoded` alternative.
pub(crate) fn is_pchar(b: u8) -> bool {
    is_unreserved(b) || is_sub_delim(b) || matches!(b, b':' | b'@')
}

/// DID `idchar` without the `pct-encoded` alternative.
pub(crate) fn is_id_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_')
}

/// DID `method-char`.
pub(crate) fn is_method_char(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit()
}
