use core::fmt;
use std::{borrow::Cow, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::escape::{self, decode_hex_pair, is_id_char, is_method_char};

mod url;

pub use url::*;

const PREFIX: &str = "did:";

/// Cause of a [`SyntaxError`] when the input is not a DID at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("not a DID")]
pub struct NotDID;

/// Error raised when a DID or DID URL does not conform to its syntax.
///
/// The offset points at the first illegal byte of the input, with the input
/// length for an unexpected end.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct SyntaxError {
    input: String,
    offset: usize,
    #[source]
    cause: Option<NotDID>,
}

impl SyntaxError {
    pub(crate) fn new(input: &str, offset: usize) -> Self {
        Self {
            input: input.to_owned(),
            offset,
            cause: None,
        }
    }

    fn not_did(input: &str, offset: usize) -> Self {
        Self {
            input: input.to_owned(),
            offset,
            cause: Some(NotDID),
        }
    }

    /// Original input as provided to the parser.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Byte offset of the first illegal byte.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Whether the input ended before it was complete.
    pub fn is_incomplete(&self) -> bool {
        self.offset >= self.input.len()
    }

    pub fn cause(&self) -> Option<NotDID> {
        self.cause
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bytes = self.input.as_bytes();

        if let Some(cause) = self.cause {
            return write!(f, "invalid DID: {cause}");
        }

        match bytes.get(self.offset) {
            None => f.write_str("incomplete DID"),
            Some(b'%') => match bytes.get(self.offset + 1..self.offset + 3) {
                Some(digits) => write!(
                    f,
                    "illegal DID percent-encoding digits \"{}\"",
                    digits.escape_ascii()
                ),
                None => f.write_str("incomplete DID percent-encoding"),
            },
            Some(b) => write!(
                f,
                "illegal character '{}' at DID byte offset {}",
                b.escape_ascii(),
                self.offset
            ),
        }
    }
}

/// Error raised when a DID is constructed from invalid parts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidDID {
    #[error("invalid DID method name `{0}`")]
    MethodName(String),

    #[error("empty DID method-specific identifier")]
    EmptyMethodSpecificId,
}

/// Decentralized identifier.
///
/// The method-specific identifier is kept percent-decoded; it is a byte
/// string with no constraints on its content. Two `DID` values are equal if
/// and only if they identify the same subject according to the
/// [normalization and comparison](https://www.rfc-editor.org/rfc/rfc3986#section-6)
/// rules.
///
/// See: <https://www.w3.org/TR/did-core/#did-syntax>
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DID {
    method: String,
    specific_id: Vec<u8>,
}

impl DID {
    /// Builds a DID from its method name and its (decoded) method-specific
    /// identifier.
    pub fn new(method: impl Into<String>, specific_id: impl Into<Vec<u8>>) -> Result<Self, InvalidDID> {
        let method = method.into();
        if method.is_empty() || !method.bytes().all(is_method_char) {
            return Err(InvalidDID::MethodName(method));
        }

        let specific_id = specific_id.into();
        if specific_id.is_empty() {
            return Err(InvalidDID::EmptyMethodSpecificId);
        }

        Ok(Self {
            method,
            specific_id,
        })
    }

    /// Parses `s` in full.
    ///
    /// Trailing path, query or fragment components are rejected; use
    /// [`DIDURL::parse`] for those.
    pub fn parse(s: &str) -> Result<Self, SyntaxError> {
        let method = parse_method_name(s)?;
        let (specific_id, end) = parse_method_specific_id(s, PREFIX.len() + method.len() + 1)
            .map_err(|i| SyntaxError::new(s, i))?;

        if end < s.len() {
            return Err(SyntaxError::new(s, end));
        }

        Ok(Self {
            method: method.to_owned(),
            specific_id: specific_id.into_owned(),
        })
    }

    /// Returns the DID method name.
    pub fn method_name(&self) -> &str {
        &self.method
    }

    /// Returns the decoded method-specific identifier.
    pub fn method_specific_id(&self) -> &[u8] {
        &self.specific_id
    }

    /// Returns whether `s` denotes this DID.
    ///
    /// Percent-encodings in `s` are resolved on the fly, in either hex case.
    /// Any malformed `s` compares unequal.
    pub fn equal_str(&self, s: &str) -> bool {
        let Some(rest) = s.strip_prefix(PREFIX) else {
            return false;
        };
        let Some(rest) = rest.strip_prefix(self.method.as_str()) else {
            return false;
        };
        let Some(rest) = rest.strip_prefix(':') else {
            return false;
        };

        method_specific_id_equal(&self.specific_id, rest.as_bytes())
    }

    /// Resolves a URI reference with this DID as the base URI.
    ///
    /// Absolute references are returned as is. Relative references inherit
    /// the DID, with dot-segments removed from their path.
    ///
    /// See: <https://www.w3.org/TR/did-core/#relative-did-urls>
    pub fn resolve_reference<'a>(&self, s: &'a str) -> Result<Cow<'a, str>, SyntaxError> {
        url::resolve_reference(self, s)
    }
}

impl fmt::Display for DID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(PREFIX)?;
        f.write_str(&self.method)?;
        f.write_str(":")?;
        f.write_str(&escape::escape(&self.specific_id, escape::ID_CHAR_ESCAPES))
    }
}

impl fmt::Debug for DID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for DID {
    type Err = SyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DID {
    type Error = SyntaxError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl Serialize for DID {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DID {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct Visitor;

        impl<'de> serde::de::Visitor<'de> for Visitor {
            type Value = DID;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "a DID")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                DID::parse(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(Visitor)
    }
}

/// Reads the method name of `s`, including the `did:` scheme in front of
/// it and the `:` separator after it.
fn parse_method_name(s: &str) -> Result<&str, SyntaxError> {
    let bytes = s.as_bytes();

    for (i, expected) in PREFIX.bytes().enumerate() {
        match bytes.get(i) {
            None => return Err(SyntaxError::new(s, i)),
            Some(&b) if b != expected => return Err(SyntaxError::not_did(s, i)),
            Some(_) => (),
        }
    }

    for (i, &b) in bytes.iter().enumerate().skip(PREFIX.len()) {
        match b {
            b':' if i == PREFIX.len() => return Err(SyntaxError::new(s, i)),
            b':' => return Ok(&s[PREFIX.len()..i]),
            b if is_method_char(b) => (),
            _ => return Err(SyntaxError::new(s, i)),
        }
    }

    // separator not found
    Err(SyntaxError::new(s, s.len()))
}

/// Reads the method-specific identifier from `s[offset..]`.
///
/// Returns the decoded identifier with the offset of the first byte after
/// it, or the offset of the first illegal byte. Input without escapes is
/// borrowed.
fn parse_method_specific_id(s: &str, offset: usize) -> Result<(Cow<[u8]>, usize), usize> {
    let bytes = s.as_bytes();
    let mut i = offset;

    // fast path
    loop {
        match bytes.get(i) {
            Some(b'%') => break,
            Some(&b) if is_id_char(b) || b == b':' => i += 1,
            _ => {
                check_method_specific_id_end(bytes, offset, i)?;
                return Ok((Cow::Borrowed(&bytes[offset..i]), i));
            }
        }
    }

    // every escape of three bytes produces one byte
    let mut buf = Vec::with_capacity(bytes.len() - offset);
    buf.extend_from_slice(&bytes[offset..i]);

    loop {
        match bytes.get(i) {
            Some(b'%') => {
                buf.push(decode_hex_pair(bytes, i + 1).ok_or(i)?);
                i += 3
            }
            Some(&b) if is_id_char(b) || b == b':' => {
                buf.push(b);
                i += 1
            }
            _ => {
                check_method_specific_id_end(bytes, offset, i)?;
                return Ok((Cow::Owned(buf), i));
            }
        }
    }
}

/// The identifier must match `*( *idchar ":" ) 1*idchar`.
fn check_method_specific_id_end(bytes: &[u8], offset: usize, end: usize) -> Result<(), usize> {
    if end == offset {
        return Err(end);
    }

    if bytes[end - 1] == b':' {
        return Err(end - 1);
    }

    Ok(())
}

/// Compares a decoded method-specific identifier with its (possibly
/// escaped) string form.
fn method_specific_id_equal(id: &[u8], s: &[u8]) -> bool {
    if s.last() == Some(&b':') {
        return false;
    }

    let mut i = 0;
    for &c in id {
        match s.get(i) {
            Some(b'%') => {
                if decode_hex_pair(s, i + 1) != Some(c) {
                    return false;
                }
                i += 3
            }
            Some(&b) if is_id_char(b) || b == b':' => {
                if b != c {
                    return false;
                }
                i += 1
            }
            _ => return false,
        }
    }

    i == s.len()
}
