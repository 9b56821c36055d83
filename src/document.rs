use std::{collections::BTreeMap, ops::Deref};

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

use crate::{DID, DIDURL};

pub mod embedded;
pub mod relationship;
pub mod service;
pub mod verification_method;

pub use embedded::EmbeddedVerificationMethods;
pub use relationship::VerificationRelationship;
pub use service::{Service, ServiceEndpoint};
pub use verification_method::VerificationMethod;

/// Media type of the JSON representation of a DID document.
///
/// See: <https://www.w3.org/TR/did-core/#application-did-json>
pub const MEDIA_TYPE: &str = "application/did+json";

/// JSON-LD context of DID documents.
pub const NAMESPACE: &str = "https://www.w3.org/ns/did/v1";

/// Properties of a record beyond the ones it models, keyed by name, with
/// their JSON value as is.
pub type Additional = BTreeMap<String, Box<RawValue>>;

/// Error raised on the content of a DID document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("missing DID {record} property \"{name}\"")]
    MissingProperty {
        record: &'static str,
        name: &'static str,
    },

    #[error("broken DID {record} property \"{name}\": {source}")]
    BrokenProperty {
        record: &'static str,
        name: &'static str,
        source: serde_json::Error,
    },

    #[error("found required DID {record} property \"{name}\" in additional set")]
    ReservedProperty { record: &'static str, name: String },

    #[error("no DID service type set")]
    NoServiceType,

    #[error("no DID service endpoint set")]
    NoServiceEndpoint,

    #[error("malformed DID service URI {0:?}")]
    MalformedServiceId(String),

    #[error("malformed DID service endpoint URI {0:?}")]
    MalformedEndpoint(String),

    #[error("DID service endpoint entry is neither a URI string nor a JSON object")]
    InvalidEndpoint,

    #[error("DID verification relationship entry is neither a URI string nor a JSON object")]
    InvalidRelationshipEntry,

    #[error("malformed DID verification relationship reference {0:?}")]
    MalformedReference(String),

    #[error("conflicting DID verification methods with id {0:?}")]
    ConflictingMethod(String),
}

/// DID document.
///
/// Unknown properties, such as `@context`, are ignored on decode.
///
/// See: <https://www.w3.org/TR/did-core/#core-properties>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// DID subject.
    ///
    /// See: <https://www.w3.org/TR/did-core/#did-subject>
    #[serde(rename = "id")]
    pub subject: DID,

    /// See: <https://www.w3.org/TR/did-core/#also-known-as>
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        with = "crate::one_or_many"
    )]
    pub also_known_as: Vec<String>,

    /// See: <https://www.w3.org/TR/did-core/#did-controller>
    #[serde(rename = "controller", default, skip_serializing_if = "Set::is_empty")]
    pub controllers: Set,

    /// See: <https://www.w3.org/TR/did-core/#verification-methods>
    #[serde(rename = "verificationMethod", default, skip_serializing_if = "Vec::is_empty")]
    pub verification_methods: Vec<VerificationMethod>,

    /// How the subject is expected to be authenticated.
    ///
    /// See: <https://www.w3.org/TR/did-core/#authentication>
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<VerificationRelationship>,

    /// How the subject is expected to express claims.
    ///
    /// See: <https://www.w3.org/TR/did-core/#assertion>
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion_method: Option<VerificationRelationship>,

    /// How an entity can generate encryption material for the subject.
    ///
    /// See: <https://www.w3.org/TR/did-core/#key-agreement>
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_agreement: Option<VerificationRelationship>,

    /// See: <https://www.w3.org/TR/did-core/#capability-invocation>
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_invocation: Option<VerificationRelationship>,

    /// See: <https://www.w3.org/TR/did-core/#capability-delegation>
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_delegation: Option<VerificationRelationship>,

    /// See: <https://www.w3.org/TR/did-core/#services>
    #[serde(rename = "service", default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<Service>,
}

impl Document {
    /// Creates a new document for the given subject, with no properties.
    pub fn new(subject: DID) -> Self {
        Self {
            subject,
            also_known_as: Vec::new(),
            controllers: Set::default(),
            verification_methods: Vec::new(),
            authentication: None,
            assertion_method: None,
            key_agreement: None,
            capability_invocation: None,
            capability_delegation: None,
            services: Vec::new(),
        }
    }

    /// Decodes a JSON representation.
    pub fn from_json(json: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(json)
    }

    /// Encodes the JSON representation, without `@context`.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Returns the verification relationships present, each with its
    /// property name.
    pub fn relationships(&self) -> impl Iterator<Item = (&'static str, &VerificationRelationship)> {
        [
            ("authentication", &self.authentication),
            ("assertionMethod", &self.assertion_method),
            ("keyAgreement", &self.key_agreement),
            ("capabilityInvocation", &self.capability_invocation),
            ("capabilityDelegation", &self.capability_delegation),
        ]
        .into_iter()
        .filter_map(|(name, r)| r.as_ref().map(|r| (name, r)))
    }

    /// Returns the entry from [`verification_methods`](Self::verification_methods)
    /// with an id equivalent to `reference`, if any. Relative references
    /// resolve against the subject.
    pub fn verification_method(&self, reference: &str) -> Option<&VerificationMethod> {
        let url = DIDURL::parse(&self.subject.resolve_reference(reference).ok()?).ok()?;

        self.verification_methods
            .iter()
            .find(|m| m.id.resolve(&self.subject).equal(&url))
    }

    /// Indexes each verification method of the document, including the
    /// ones embedded in verification relationships.
    pub fn embedded_verification_methods(
        &self,
    ) -> Result<EmbeddedVerificationMethods<'_>, DocumentError> {
        EmbeddedVerificationMethods::new(self)
    }

    /// Dereferences the references from each verification relationship.
    ///
    /// Returns the verification methods found, keyed by reference as
    /// written, and the references not found.
    pub fn verification_method_refs(
        &self,
    ) -> Result<(BTreeMap<String, &VerificationMethod>, Vec<String>), DocumentError> {
        let index = self.embedded_verification_methods()?;

        let mut found = BTreeMap::new();
        let mut not_found = Vec::new();
        for (_, relationship) in self.relationships() {
            for reference in &relationship.refs {
                let key = reference.as_str().to_owned();
                if found.contains_key(&key) || not_found.contains(&key) {
                    continue;
                }

                match index.dereference(&key) {
                    Some(method) => {
                        found.insert(key, method);
                    }
                    None => not_found.push(key),
                }
            }
        }

        Ok((found, not_found))
    }
}

/// Set of DIDs, such as the controllers of a document.
///
/// Encodes as a single string when it holds exactly one DID, and as an
/// array otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Set(pub Vec<DID>);

impl Set {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns whether any of the DIDs is equivalent to `s`. Malformed `s`
    /// is never contained.
    pub fn contains(&self, s: &str) -> bool {
        self.0.iter().any(|did| did.equal_str(s))
    }
}

impl Deref for Set {
    type Target = [DID];

    fn deref(&self) -> &[DID] {
        &self.0
    }
}

impl From<Vec<DID>> for Set {
    fn from(value: Vec<DID>) -> Self {
        Self(value)
    }
}

impl FromIterator<DID> for Set {
    fn from_iter<T: IntoIterator<Item = DID>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for Set {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        crate::one_or_many::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Set {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        crate::one_or_many::deserialize(deserializer).map(Self)
    }
}

/// Removes property `name` from `additional`.
pub(crate) fn take_property(
    additional: &mut Additional,
    record: &'static str,
    name: &'static str,
) -> Result<Box<RawValue>, DocumentError> {
    additional
        .remove(name)
        .ok_or(DocumentError::MissingProperty { record, name })
}

/// Removes property `name` from `additional`, and decodes its value.
pub(crate) fn pop_property<T: DeserializeOwned>(
    additional: &mut Additional,
    record: &'static str,
    name: &'static str,
) -> Result<T, DocumentError> {
    let raw = take_property(additional, record, name)?;
    serde_json::from_str(raw.get()).map_err(|source| DocumentError::BrokenProperty {
        record,
        name,
        source,
    })
}

/// Fails on any of the `reserved` names in `additional`.
pub(crate) fn check_additional(
    additional: &Additional,
    record: &'static str,
    reserved: &[&str],
) -> Result<(), DocumentError> {
    match reserved.iter().find(|name| additional.contains_key(**name)) {
        Some(name) => Err(DocumentError::ReservedProperty {
            record,
            name: name.to_string(),
        }),
        None => Ok(()),
    }
}

/// Compares two property sets by JSON content, regardless of formatting.
pub(crate) fn same_additional(a: &Additional, b: &Additional) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|((ka, va), (kb, vb))| {
            ka == kb
                && (va.get() == vb.get()
                    || matches!(
                        (
                            serde_json::from_str::<serde_json::Value>(va.get()),
                            serde_json::from_str::<serde_json::Value>(vb.get()),
                        ),
                        (Ok(x), Ok(y)) if x == y
                    ))
        })
}

/// JSON kind of a raw value, from its first byte.
pub(crate) fn json_kind(raw: &RawValue) -> Option<u8> {
    raw.get().trim_start().bytes().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_shapes() {
        let one: Set = serde_json::from_str("\"did:example:a\"").unwrap();
        assert_eq!(one.len(), 1);
        assert_eq!(serde_json::to_string(&one).unwrap(), "\"did:example:a\"");

        let many: Set = serde_json::from_str("[\"did:example:a\", \"did:example:b\"]").unwrap();
        assert_eq!(many.len(), 2);
        assert_eq!(
            serde_json::to_string(&many).unwrap(),
            "[\"did:example:a\",\"did:example:b\"]"
        );

        let none: Set = serde_json::from_str("null").unwrap();
        assert!(none.is_empty());

        assert!(serde_json::from_str::<Set>("\"example:a\"").is_err());
    }

    #[test]
    fn set_contains() {
        let set: Set = ["did:example:a", "did:web:example.com%3A8443"]
            .into_iter()
            .map(|s| DID::parse(s).unwrap())
            .collect();

        assert!(set.contains("did:example:a"));
        assert!(set.contains("did:example:%61"));
        assert!(set.contains("did:web:example.com:8443"));
        assert!(!set.contains("did:example:b"));
        assert!(!set.contains("did:example:a#x"));
        assert!(!set.contains("bogus"));
    }

    #[test]
    fn empty_document() {
        let subject = DID::parse("did:example:123").unwrap();
        let doc = Document::new(subject);
        assert_eq!(doc.to_json().unwrap(), br#"{"id":"did:example:123"}"#);

        let decoded = Document::from_json(br#"{"@context":"https://www.w3.org/ns/did/v1","id":"did:example:123","authentication":null}"#).unwrap();
        assert_eq!(decoded, doc);

        assert!(Document::from_json(br#"{"controller":"did:example:123"}"#).is_err());
    }

    #[test]
    fn same_additional_by_content() {
        let parse = |s: &str| serde_json::from_str::<Additional>(s).unwrap();

        assert!(same_additional(&parse(r#"{"a":{"x":1,"y":2}}"#), &parse(r#"{"a":{ "y": 2, "x": 1 }}"#)));
        assert!(!same_additional(&parse(r#"{"a":1}"#), &parse(r#"{"a":2}"#)));
        assert!(!same_additional(&parse(r#"{"a":1}"#), &parse(r#"{"b":1}"#)));
        assert!(!same_additional(&parse(r#"{"a":1}"#), &parse(r#"{"a":1,"b":1}"#)));
    }
}
