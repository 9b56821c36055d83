//! Reference resolution with a DID as the base URI.
//!
//! See: <https://www.rfc-editor.org/rfc/rfc3986#section-5>
use std::borrow::Cow;

use crate::escape::decode_unreserved;

use super::{SyntaxError, DID, DIDURL, PREFIX};

impl DIDURL {
    /// Resolves this DID URL against `base`.
    ///
    /// Relative references inherit the `base` DID, and get their path
    /// rooted with dot-segments removed. Encoded unreserved characters in
    /// the path are decoded first, so `%2E%2E` counts as a dot-segment.
    /// DID URLs with a DID are returned as is.
    pub fn resolve(&self, base: &DID) -> Cow<DIDURL> {
        if self.did.is_some() {
            return Cow::Borrowed(self);
        }

        let path = if self.path.is_empty() {
            String::new()
        } else {
            let path = self.path.strip_prefix('/').unwrap_or(&self.path);

            let segments = path.split('/').map(|s| decode_unreserved(s).into_owned());

            let mut resolved = String::with_capacity(path.len() + 1);
            for segment in remove_dot_segments(segments) {
                resolved.push('/');
                resolved.push_str(&segment);
            }
            resolved
        };

        Cow::Owned(DIDURL {
            did: Some(base.clone()),
            path,
            query: self.query.clone(),
            fragment: self.fragment.clone(),
        })
    }
}

/// Resolves `s` against `base`.
///
/// URIs with a scheme other than `did` are returned as is, without
/// validation.
pub(crate) fn resolve_reference<'a>(base: &DID, s: &'a str) -> Result<Cow<'a, str>, SyntaxError> {
    if has_scheme(s) && !s.starts_with(PREFIX) {
        return Ok(Cow::Borrowed(s));
    }

    let url = DIDURL::parse(s)?;
    match url.resolve(base) {
        Cow::Borrowed(_) => Ok(Cow::Borrowed(s)),
        Cow::Owned(resolved) => Ok(Cow::Owned(resolved.to_string())),
    }
}

/// `scheme = ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ) ":"`
fn has_scheme(s: &str) -> bool {
    let bytes = s.as_bytes();
    match bytes.iter().position(|&b| b == b':') {
        Some(i) if i > 0 => {
            bytes[0].is_ascii_alphabetic()
                && bytes[1..i]
                    .iter()
                    .all(|&b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
        }
        _ => false,
    }
}

/// Applies `.` and `..` segments of an absolute path, given without its
/// leading `/`.
///
/// A dot-segment in last position leaves an empty segment, i.e., a
/// trailing `/`.
pub(super) fn remove_dot_segments<T>(segments: impl IntoIterator<Item = T>) -> Vec<T>
where
    T: AsRef<[u8]> + Default,
{
    let mut output = Vec::new();
    let mut segments = segments.into_iter().peekable();

    while let Some(segment) = segments.next() {
        match segment.as_ref() {
            b"." => (),
            b".." => {
                output.pop();
            }
            _ => {
                output.push(segment);
                continue;
            }
        }

        if segments.peek().is_none() {
            output.push(T::default())
        }
    }

    output
}
