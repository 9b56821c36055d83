use serde::{de, ser::SerializeMap, Deserialize, Deserializer, Serialize, Serializer};

use crate::{DID, DIDURL};

use super::{check_additional, pop_property, same_additional, Additional, DocumentError};

const RECORD: &str = "verification-method";

const RESERVED: [&str; 3] = ["id", "type", "controller"];

/// Verification method.
///
/// Properties other than `id`, `type` and `controller`, such as
/// `publicKeyMultibase` or `publicKeyJwk`, are kept in
/// [`additional`](Self::additional). Encoding fails when `additional`
/// holds any of the three.
///
/// See: <https://www.w3.org/TR/did-core/#verification-methods>
#[derive(Debug, Clone)]
pub struct VerificationMethod {
    /// Identifier, possibly relative to the DID subject.
    pub id: DIDURL,

    /// Verification method type name.
    pub type_: String,

    pub controller: DID,

    pub additional: Additional,
}

impl VerificationMethod {
    pub fn new(id: DIDURL, type_: impl Into<String>, controller: DID) -> Self {
        Self {
            id,
            type_: type_.into(),
            controller,
            additional: Additional::new(),
        }
    }

    /// Decodes the JSON string value of the `property`, if present.
    pub fn additional_string(&self, property: &str) -> Result<Option<String>, serde_json::Error> {
        self.additional
            .get(property)
            .map(|raw| serde_json::from_str(raw.get()))
            .transpose()
    }

    /// Returns whether `other` has the same content apart from its id, with
    /// additional properties compared as JSON values.
    pub fn same_content(&self, other: &Self) -> bool {
        self.type_ == other.type_
            && self.controller == other.controller
            && same_additional(&self.additional, &other.additional)
    }
}

impl PartialEq for VerificationMethod {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.type_ == other.type_
            && self.controller == other.controller
            && self.additional.len() == other.additional.len()
            && self
                .additional
                .iter()
                .zip(&other.additional)
                .all(|((ka, va), (kb, vb))| ka == kb && va.get() == vb.get())
    }
}

impl TryFrom<Additional> for VerificationMethod {
    type Error = DocumentError;

    fn try_from(mut additional: Additional) -> Result<Self, DocumentError> {
        let id = pop_property(&mut additional, RECORD, "id")?;
        let type_ = pop_property(&mut additional, RECORD, "type")?;
        let controller = pop_property(&mut additional, RECORD, "controller")?;

        Ok(Self {
            id,
            type_,
            controller,
            additional,
        })
    }
}

impl Serialize for VerificationMethod {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        check_additional(&self.additional, RECORD, &RESERVED).map_err(serde::ser::Error::custom)?;

        let mut map = serializer.serialize_map(Some(3 + self.additional.len()))?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("type", &self.type_)?;
        map.serialize_entry("controller", &self.controller)?;
        for (name, value) in &self.additional {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for VerificationMethod {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let additional = Additional::deserialize(deserializer)?;
        additional.try_into().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::value::RawValue;

    const KEY: &str = r#"{
        "id": "did:example:123#z6MkpTHR8VNsBxYAAWHut2Geadd9jSwuBV8xRoAnwWsdvktH",
        "type": "Ed25519VerificationKey2020",
        "controller": "did:example:123",
        "publicKeyMultibase": "z6MkpTHR8VNsBxYAAWHut2Geadd9jSwuBV8xRoAnwWsdvktH"
    }"#;

    #[test]
    fn decode() {
        let m: VerificationMethod = serde_json::from_str(KEY).unwrap();
        assert_eq!(
            m.id.to_string(),
            "did:example:123#z6MkpTHR8VNsBxYAAWHut2Geadd9jSwuBV8xRoAnwWsdvktH"
        );
        assert_eq!(m.type_, "Ed25519VerificationKey2020");
        assert_eq!(m.controller.to_string(), "did:example:123");
        assert_eq!(m.additional.len(), 1);
        assert_eq!(
            m.additional_string("publicKeyMultibase").unwrap().as_deref(),
            Some("z6MkpTHR8VNsBxYAAWHut2Geadd9jSwuBV8xRoAnwWsdvktH")
        );
        assert_eq!(m.additional_string("publicKeyJwk").unwrap(), None);
    }

    #[test]
    fn encode_in_order() {
        let mut m = VerificationMethod::new(
            DIDURL::parse("#key-1").unwrap(),
            "JsonWebKey2020",
            DID::parse("did:example:123").unwrap(),
        );
        m.additional.insert(
            "publicKeyJwk".to_string(),
            RawValue::from_string(r#"{"kty":"OKP"}"#.to_string()).unwrap(),
        );

        assert_eq!(
            serde_json::to_string(&m).unwrap(),
            r##"{"id":"#key-1","type":"JsonWebKey2020","controller":"did:example:123","publicKeyJwk":{"kty":"OKP"}}"##
        );

        m.additional.insert(
            "controller".to_string(),
            RawValue::from_string(r#""did:example:456""#.to_string()).unwrap(),
        );
        let err = serde_json::to_string(&m).unwrap_err();
        assert_eq!(
            err.to_string(),
            "found required DID verification-method property \"controller\" in additional set"
        );
    }

    #[test]
    fn decode_errors() {
        let err = serde_json::from_str::<VerificationMethod>(
            r#"{"type": "JsonWebKey2020", "controller": "did:example:123"}"#,
        )
        .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("missing DID verification-method property \"id\""));

        let err = serde_json::from_str::<VerificationMethod>(
            r##"{"id": "#key-1", "type": "JsonWebKey2020", "controller": "example:123"}"##,
        )
        .unwrap_err();
        assert!(err
            .to_string()
            .starts_with("broken DID verification-method property \"controller\""));

        assert!(serde_json::from_str::<VerificationMethod>("[]").is_err());
    }

    #[test]
    fn content_equality() {
        let a: VerificationMethod = serde_json::from_str(KEY).unwrap();
        let b: VerificationMethod = serde_json::from_str(&serde_json::to_string(&a).unwrap()).unwrap();
        assert!(a.same_content(&b));

        let mut c = b.clone();
        c.type_ = "Multikey".to_string();
        assert!(!a.same_content(&c));
    }
}
