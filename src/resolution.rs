//! DID resolution.
//!
//! See: <https://www.w3.org/TR/did-core/#did-resolution>
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Document, SyntaxError, DID};

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::*;

/// DID resolution error.
///
/// See: <https://www.w3.org/TR/did-core/#did-resolution-metadata>
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// DID rejected by the resolver.
    #[error("invalid DID: {0}")]
    InvalidDid(String),

    #[error("DID document not found")]
    NotFound,

    /// None of the accepted representations is available.
    #[error("DID document media type not supported")]
    MediaTypeNotSupported,

    #[error("DID download abort on size constraints: {url} reached {max} bytes")]
    DownloadTooLarge { url: String, max: u64 },

    #[error("HTTP {status:?} for DID document {url}")]
    UnexpectedStatus { status: String, url: String },

    /// Internal resolver-specific error.
    #[error("DID resolver internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new internal error.
    pub fn internal(error: impl ToString) -> Self {
        Self::Internal(error.to_string())
    }

    /// Returns the DID resolution error code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidDid(_) => "invalidDid",
            Self::NotFound => "notFound",
            Self::MediaTypeNotSupported => "representationNotSupported",
            Self::DownloadTooLarge { .. } | Self::UnexpectedStatus { .. } | Self::Internal(_) => {
                "internalError"
            }
        }
    }
}

impl From<SyntaxError> for Error {
    fn from(value: SyntaxError) -> Self {
        Self::InvalidDid(value.to_string())
    }
}

/// DID document metadata.
///
/// All properties are optional. Set by the resolver only.
///
/// See: <https://www.w3.org/TR/did-core/#did-document-metadata>
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deactivated: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_update: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_version_id: Option<String>,

    #[serde(rename = "equivalentId", default, skip_serializing_if = "Vec::is_empty")]
    pub equivalent_ids: Vec<DID>,

    #[serde(rename = "canonicalId", default, skip_serializing_if = "Option::is_none")]
    pub canonical_id: Option<DID>,
}

/// Resolution output.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub document: Document,
    pub metadata: Meta,
}

impl Output {
    pub fn new(document: Document, metadata: Meta) -> Self {
        Self { document, metadata }
    }
}

/// [DID resolver](https://www.w3.org/TR/did-core/#dfn-did-resolvers).
///
/// Implements the "Read" operation of a DID method, or of a set of methods.
#[allow(async_fn_in_trait)]
pub trait DIDResolver {
    /// Resolves a DID into its document and metadata.
    async fn resolve(&self, did: &DID) -> Result<Output, Error>;
}

impl<'a, T: DIDResolver> DIDResolver for &'a T {
    async fn resolve(&self, did: &DID) -> Result<Output, Error> {
        T::resolve(*self, did).await
    }
}

/// A simple in-memory DID resolver to perform tests.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    map: BTreeMap<DID, Output>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Registers `document` under its subject, replacing any previous
    /// entry.
    pub fn insert(&mut self, document: Document, metadata: Meta) -> Option<Output> {
        self.map
            .insert(document.subject.clone(), Output::new(document, metadata))
    }
}

impl DIDResolver for StaticResolver {
    async fn resolve(&self, did: &DID) -> Result<Output, Error> {
        match self.map.get(did) {
            Some(output) => Ok(output.clone()),
            None => Err(Error::NotFound),
        }
    }
}
