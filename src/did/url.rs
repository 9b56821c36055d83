use core::fmt;
use std::{borrow::Cow, str::FromStr};

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::escape::{self, decode_hex_pair, is_pchar};

use super::{parse_method_name, parse_method_specific_id, SyntaxError, DID, PREFIX};

mod equivalence;
mod reference;

pub(crate) use reference::resolve_reference;

/// Standard DID URL parameter naming a specific version of a DID document.
pub const VERSION_ID: &str = "versionId";

/// Standard DID URL parameter naming the version of a DID document that was
/// valid at a given time.
pub const VERSION_TIME: &str = "versionTime";

/// Error raised on the version parameters of a DID URL.
#[derive(Debug, thiserror::Error)]
pub enum VersionError {
    #[error("duplicate versionId in DID URL")]
    DuplicateId,

    #[error("duplicate versionTime in DID URL")]
    DuplicateTime,

    #[error("versionTime in DID URL: {0}")]
    Time(chrono::ParseError),

    #[error("malformed DID URL query: {0}")]
    Query(#[from] serde_urlencoded::de::Error),

    #[error("DID URL query encoding: {0}")]
    Encoding(#[from] serde_urlencoded::ser::Error),
}

/// DID URL.
///
/// Path, query and fragment are kept as written, percent-encodings
/// included. The query and the fragment keep their `?` and `#` delimiter
/// when present. A DID URL without a DID is a relative reference.
///
/// The derived equality is the one of the (canonical) string form. Use
/// [`DIDURL::equal`] for equivalence.
///
/// See: <https://www.w3.org/TR/did-core/#did-url-syntax>
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DIDURL {
    did: Option<DID>,
    path: String,
    query: String,
    fragment: String,
}

impl DIDURL {
    /// Parses `s` in full, either as a DID URL or as a relative reference.
    pub fn parse(s: &str) -> Result<Self, SyntaxError> {
        let bytes = s.as_bytes();

        let (did, offset) = if s.starts_with(PREFIX) {
            let method = parse_method_name(s)?;
            let (specific_id, end) =
                parse_method_specific_id(s, PREFIX.len() + method.len() + 1)
                    .map_err(|i| SyntaxError::new(s, i))?;

            if !matches!(bytes.get(end), None | Some(b'/' | b'?' | b'#')) {
                return Err(SyntaxError::new(s, end));
            }

            let did = DID {
                method: method.to_owned(),
                specific_id: specific_id.into_owned(),
            };

            (Some(did), end)
        } else {
            // A colon in the first segment would read as a scheme.
            if let Some(i) = bytes
                .iter()
                .position(|b| matches!(b, b':' | b'/' | b'?' | b'#'))
            {
                if bytes[i] == b':' {
                    return Err(SyntaxError::new(s, i));
                }
            }

            // DIDs have no authority.
            if s.starts_with("//") {
                return Err(SyntaxError::new(s, 1));
            }

            (None, 0)
        };

        let (query_start, fragment_start) =
            components(bytes, offset).map_err(|i| SyntaxError::new(s, i))?;

        Ok(Self {
            did,
            path: s[offset..query_start].to_owned(),
            query: s[query_start..fragment_start].to_owned(),
            fragment: s[fragment_start..].to_owned(),
        })
    }

    /// Returns the DID, or `None` for a relative reference.
    pub fn did(&self) -> Option<&DID> {
        self.did.as_ref()
    }

    pub fn is_relative(&self) -> bool {
        self.did.is_none()
    }

    /// Returns the path, as written.
    pub fn raw_path(&self) -> &str {
        &self.path
    }

    /// Returns the query with its `?` delimiter, as written, or the empty
    /// string on absence.
    pub fn raw_query(&self) -> &str {
        &self.query
    }

    /// Returns the fragment with its `#` delimiter, as written, or the empty
    /// string on absence.
    pub fn raw_fragment(&self) -> &str {
        &self.fragment
    }

    /// Returns whether `other` identifies the same resource, following the
    /// [normalization and comparison](https://www.rfc-editor.org/rfc/rfc3986#section-6)
    /// rules.
    ///
    /// Relative references never compare equal, not even to themselves.
    /// Duplicate query parameters are compared in order of appearance, i.e.,
    /// `?a=1&a=2` is not equal to `?a=2&a=1`.
    pub fn equal(&self, other: &DIDURL) -> bool {
        match (&self.did, &other.did) {
            (Some(a), Some(b)) => {
                a == b
                    && equivalence::path_equal(&self.path, &other.path)
                    && equivalence::query_equal(&self.query, &other.query)
                    && equivalence::fragment_equal(&self.fragment, &other.fragment)
            }
            _ => false,
        }
    }

    /// Returns whether `s` parses into a DID URL [equal](Self::equal) to
    /// this one. Malformed `s` compares unequal.
    pub fn equal_str(&self, s: &str) -> bool {
        match DIDURL::parse(s) {
            Ok(other) => self.equal(&other),
            Err(_) => false,
        }
    }

    /// Returns each segment from the path, with percent-encodings resolved
    /// on a best-effort basis. Malformed encodings pass as is.
    ///
    /// The return equals any and all arguments passed to
    /// [`set_path_segments`](Self::set_path_segments).
    pub fn path_segments(&self) -> Vec<Cow<[u8]>> {
        if self.path.is_empty() {
            return Vec::new();
        }

        let mut path = self.path.strip_prefix('/').unwrap_or(&self.path);
        if self.did.is_none() {
            if let Some(rest) = path.strip_prefix("./").filter(|rest| rest.starts_with('/')) {
                path = rest;
            }
        }
        let mut segments: Vec<_> = path.split('/').map(escape::unescape).collect();

        // trailing separator
        if matches!(segments.last(), Some(s) if s.is_empty()) {
            segments.pop();
        }

        segments
    }

    /// Replaces the path with `segments`, percent-encoding whatever is not a
    /// path character, `/` included.
    ///
    /// Relative references get a `/.` prefix when the path would otherwise
    /// start with `//`, as in [RFC 3986 section 4.2](https://www.rfc-editor.org/rfc/rfc3986#section-4.2).
    /// Their first segment is written `%2E` when it is a single dot.
    pub fn set_path_segments<S: AsRef<[u8]>>(&mut self, segments: &[S]) {
        let relative = self.did.is_none();
        let mut path = String::new();
        if relative && matches!(segments.first(), Some(s) if s.as_ref().is_empty()) {
            path.push_str("/.");
        }
        for (i, segment) in segments.iter().enumerate() {
            path.push('/');
            match segment.as_ref() {
                b"." if relative && i == 0 => path.push_str("%2E"),
                s => path.push_str(&escape::escape(s, escape::SEGMENT_ESCAPES)),
            }
        }

        if matches!(segments.last(), Some(s) if s.as_ref().is_empty()) {
            path.push('/');
        }

        self.path = path;
    }

    /// Returns the path with percent-encodings resolved, except for the
    /// path separator.
    ///
    /// Encoded separators (`%2F`) are replaced by the `escape` byte followed
    /// by `/`. Occurrences of `escape`, encoded or not, are replaced by two
    /// `escape` bytes. Malformed encodings pass as is.
    pub fn path_with_escape(&self, escape: u8) -> Cow<[u8]> {
        let bytes = self.path.as_bytes();
        if !bytes.iter().any(|&b| b == escape || b == b'%') {
            return Cow::Borrowed(bytes);
        }

        let mut buf = Vec::with_capacity(bytes.len() + 8);
        let mut i = 0;
        while let Some(&b) = bytes.get(i) {
            let decoded = if b == b'%' {
                decode_hex_pair(bytes, i + 1)
            } else {
                None
            };

            match decoded {
                Some(b'/') => buf.extend_from_slice(&[escape, b'/']),
                Some(v) if v == escape => buf.extend_from_slice(&[escape, escape]),
                Some(v) => buf.push(v),
                None if b == escape => buf.extend_from_slice(&[escape, escape]),
                None => buf.push(b),
            }

            i += if decoded.is_some() { 3 } else { 1 };
        }

        Cow::Owned(buf)
    }

    /// Decodes the query parameters in order of appearance.
    pub fn query(&self) -> Result<Vec<(String, String)>, serde_urlencoded::de::Error> {
        serde_urlencoded::from_str(self.query.strip_prefix('?').unwrap_or_default())
    }

    /// Replaces the query with the encoding of `params`. An empty encoding
    /// removes the query.
    pub fn set_query<T>(&mut self, params: &T) -> Result<(), serde_urlencoded::ser::Error>
    where
        T: ?Sized + Serialize,
    {
        let encoded = serde_urlencoded::to_string(params)?;
        self.query = if encoded.is_empty() {
            String::new()
        } else {
            format!("?{encoded}")
        };

        Ok(())
    }

    /// Returns the fragment with percent-encodings resolved on a
    /// best-effort basis.
    pub fn fragment(&self) -> Option<Cow<[u8]>> {
        self.fragment.strip_prefix('#').map(escape::unescape)
    }

    /// Replaces the fragment, percent-encoding whatever is not a fragment
    /// character.
    pub fn set_fragment(&mut self, fragment: Option<&[u8]>) {
        self.fragment = match fragment {
            Some(f) => {
                format!("#{}", escape::escape(f, escape::FRAGMENT_ESCAPES))
            }
            None => String::new(),
        }
    }

    /// Returns the standardized `versionId` and `versionTime` parameters.
    ///
    /// See: <https://www.w3.org/TR/did-core/#did-parameters>
    pub fn version_params(
        &self,
    ) -> Result<(Option<String>, Option<DateTime<FixedOffset>>), VersionError> {
        let mut version_id = None;
        let mut version_time = None;

        for (name, value) in self.query()? {
            match name.as_str() {
                VERSION_ID => {
                    if version_id.replace(value).is_some() {
                        return Err(VersionError::DuplicateId);
                    }
                }
                VERSION_TIME => {
                    if version_time.is_some() {
                        return Err(VersionError::DuplicateTime);
                    }
                    let t = DateTime::parse_from_rfc3339(&value).map_err(VersionError::Time)?;
                    version_time = Some(t);
                }
                _ => (),
            }
        }

        Ok((version_id, version_time))
    }

    /// Installs the standardized `versionId` and `versionTime` parameters,
    /// replacing any previous occurrence. Other parameters are retained.
    pub fn set_version_params(
        &mut self,
        version_id: Option<&str>,
        version_time: Option<DateTime<FixedOffset>>,
    ) -> Result<(), VersionError> {
        let mut params: Vec<(String, String)> = self
            .query()?
            .into_iter()
            .filter(|(name, _)| match name.as_str() {
                VERSION_ID => version_id.is_none(),
                VERSION_TIME => version_time.is_none(),
                _ => true,
            })
            .collect();

        if let Some(id) = version_id {
            params.push((VERSION_ID.to_owned(), id.to_owned()));
        }

        if let Some(t) = version_time {
            params.push((
                VERSION_TIME.to_owned(),
                t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            ));
        }

        self.set_query(&params)?;
        Ok(())
    }
}

/// Validates path, query and fragment from `offset`.
///
/// Returns the offsets of the query and of the fragment delimiters (the
/// input length on absence), or the offset of the first illegal byte.
fn components(bytes: &[u8], offset: usize) -> Result<(usize, usize), usize> {
    #[derive(Clone, Copy)]
    enum State {
        Path,
        Query,
        Fragment,
    }

    let mut state = State::Path;
    let mut query_start = None;
    let mut fragment_start = None;

    let mut i = offset;
    while let Some(&c) = bytes.get(i) {
        match (state, c) {
            (_, b'%') => {
                decode_hex_pair(bytes, i + 1).ok_or(i)?;
                i += 3;
                continue;
            }
            (State::Path, b'?') => {
                query_start = Some(i);
                state = State::Query
            }
            (State::Path | State::Query, b'#') => {
                fragment_start = Some(i);
                state = State::Fragment
            }
            (State::Query | State::Fragment, b'?') => (),
            (_, b'/') => (),
            (_, c) if is_pchar(c) => (),
            _ => return Err(i),
        }

        i += 1
    }

    let fragment_start = fragment_start.unwrap_or(bytes.len());
    let query_start = query_start.unwrap_or(fragment_start);
    Ok((query_start, fragment_start))
}

impl From<DID> for DIDURL {
    fn from(value: DID) -> Self {
        Self {
            did: Some(value),
            path: String::new(),
            query: String::new(),
            fragment: String::new(),
        }
    }
}

impl fmt::Display for DIDURL {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(did) = &self.did {
            fmt::Display::fmt(did, f)?;
        }

        f.write_str(&self.path)?;
        f.write_str(&self.query)?;
        f.write_str(&self.fragment)
    }
}

impl fmt::Debug for DIDURL {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for DIDURL {
    type Err = SyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DIDURL {
    type Error = SyntaxError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl Serialize for DIDURL {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DIDURL {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct Visitor;

        impl<'de> serde::de::Visitor<'de> for Visitor {
            type Value = DIDURL;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "a DID URL")
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                DIDURL::parse(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(Visitor)
    }
}
