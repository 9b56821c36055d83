//! Comparison of DID URL components.
//!
//! See: <https://www.rfc-editor.org/rfc/rfc3986#section-6.2.2>
use std::borrow::Cow;

use crate::escape::{unescape, Octets};

use super::reference::remove_dot_segments;

/// Paths compare per segment, after percent-decoding and dot-segment
/// removal. An encoded `/` never matches a separator.
pub(super) fn path_equal(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }

    if a.is_empty() || b.is_empty() {
        return false;
    }

    normalized_segments(a) == normalized_segments(b)
}

fn normalized_segments(path: &str) -> Vec<Cow<[u8]>> {
    let path = path.strip_prefix('/').unwrap_or(path);
    remove_dot_segments(path.split('/').map(unescape))
}

/// Queries compare as ordered parameter lists.
pub(super) fn query_equal(a: &str, b: &str) -> bool {
    match (a.strip_prefix('?'), b.strip_prefix('?')) {
        (None, None) => true,
        (Some(a), Some(b)) => {
            a == b || a.split('&').map(parameter).eq(b.split('&').map(parameter))
        }
        _ => false,
    }
}

fn parameter(s: &str) -> (Cow<[u8]>, Option<Cow<[u8]>>) {
    match s.split_once('=') {
        Some((name, value)) => (unescape(name), Some(unescape(value))),
        None => (unescape(s), None),
    }
}

pub(super) fn fragment_equal(a: &str, b: &str) -> bool {
    match (a.strip_prefix('#'), b.strip_prefix('#')) {
        (None, None) => true,
        (Some(a), Some(b)) => Octets::new(a).eq(Octets::new(b)),
        _ => false,
    }
}
