use iref::UriRefBuf;
use serde::{de, ser::SerializeSeq, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

use super::{json_kind, DocumentError, VerificationMethod};

/// Verification relationship.
///
/// Holds verification methods either embedded, or referenced by URI. DID URL
/// references may be relative to the DID subject.
/// Encodes as an array with the embedded methods first.
///
/// See: <https://www.w3.org/TR/did-core/#verification-relationships>
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerificationRelationship {
    pub methods: Vec<VerificationMethod>,

    /// References as written.
    pub refs: Vec<UriRefBuf>,
}

impl VerificationRelationship {
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty() && self.refs.is_empty()
    }

    fn push(&mut self, raw: &RawValue) -> Result<(), DocumentError> {
        let broken = |source| DocumentError::BrokenProperty {
            record: "verification-relationship",
            name: "entry",
            source,
        };

        match json_kind(raw) {
            Some(b'{') => self
                .methods
                .push(serde_json::from_str(raw.get()).map_err(broken)?),
            Some(b'"') => {
                let s: String = serde_json::from_str(raw.get()).map_err(broken)?;
                let uri = UriRefBuf::new(s.as_bytes().to_vec())
                    .map_err(|_| DocumentError::MalformedReference(s))?;
                self.refs.push(uri)
            }
            _ => return Err(DocumentError::InvalidRelationshipEntry),
        }

        Ok(())
    }
}

impl Serialize for VerificationRelationship {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(self.methods.len() + self.refs.len()))?;
        for method in &self.methods {
            seq.serialize_element(method)?;
        }
        for uri in &self.refs {
            seq.serialize_element(uri.as_str())?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for VerificationRelationship {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = Vec::<Box<RawValue>>::deserialize(deserializer)?;

        let mut relationship = Self::default();
        for raw in &entries {
            relationship.push(raw).map_err(de::Error::custom)?;
        }

        Ok(relationship)
    }
}
