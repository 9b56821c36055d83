use iref::UriRefBuf;
use serde::{
    de, ser::SerializeMap, ser::SerializeSeq, Deserialize, Deserializer, Serialize, Serializer,
};
use serde_json::value::RawValue;

use super::{
    check_additional, json_kind, pop_property, take_property, Additional, DocumentError,
};

const RECORD: &str = "service";

const RESERVED: [&str; 3] = ["id", "type", "serviceEndpoint"];

/// Service.
///
/// Means of communicating or interacting with the DID subject or
/// associated entities.
///
/// See: <https://www.w3.org/TR/did-core/#services>
#[derive(Debug, Clone)]
pub struct Service {
    /// URI identifying the service.
    pub id: UriRefBuf,

    /// Service types, at least one.
    pub types: Vec<String>,

    pub endpoint: ServiceEndpoint,

    /// Properties other than `id`, `type` and `serviceEndpoint`.
    pub additional: Additional,
}

impl Service {
    /// Decodes the JSON string value of the `property`, if present.
    pub fn additional_string(&self, property: &str) -> Result<Option<String>, serde_json::Error> {
        self.additional
            .get(property)
            .map(|raw| serde_json::from_str(raw.get()))
            .transpose()
    }
}

impl PartialEq for Service {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.types == other.types
            && self.endpoint == other.endpoint
            && self.additional.len() == other.additional.len()
            && self
                .additional
                .iter()
                .zip(&other.additional)
                .all(|((ka, va), (kb, vb))| ka == kb && va.get() == vb.get())
    }
}

/// Service endpoint.
///
/// Encodes as a string, a map, or a set composed of one or more strings
/// and/or maps.
///
/// See: <https://www.w3.org/TR/did-core/#dfn-serviceendpoint>
#[derive(Debug, Clone, Default)]
pub struct ServiceEndpoint {
    pub uri_refs: Vec<UriRefBuf>,

    /// JSON objects as is.
    pub objects: Vec<Box<RawValue>>,
}

impl ServiceEndpoint {
    pub fn is_empty(&self) -> bool {
        self.uri_refs.is_empty() && self.objects.is_empty()
    }

    fn decode(raw: &RawValue) -> Result<Self, DocumentError> {
        let mut endpoint = Self::default();

        match json_kind(raw) {
            Some(b'[') => {
                let entries: Vec<Box<RawValue>> =
                    serde_json::from_str(raw.get()).map_err(endpoint_error)?;
                if entries.is_empty() {
                    return Err(DocumentError::NoServiceEndpoint);
                }

                for entry in entries {
                    endpoint.push(entry)?;
                }
            }
            _ => endpoint.push(raw.to_owned())?,
        }

        Ok(endpoint)
    }

    fn push(&mut self, raw: Box<RawValue>) -> Result<(), DocumentError> {
        match json_kind(&raw) {
            Some(b'"') => {
                let s: String = serde_json::from_str(raw.get()).map_err(endpoint_error)?;
                let uri = UriRefBuf::new(s.as_bytes().to_vec())
                    .map_err(|_| DocumentError::MalformedEndpoint(s))?;
                self.uri_refs.push(uri);
            }
            Some(b'{') => self.objects.push(raw),
            _ => return Err(DocumentError::InvalidEndpoint),
        }

        Ok(())
    }
}

impl PartialEq for ServiceEndpoint {
    fn eq(&self, other: &Self) -> bool {
        self.uri_refs == other.uri_refs
            && self.objects.len() == other.objects.len()
            && self
                .objects
                .iter()
                .zip(&other.objects)
                .all(|(a, b)| a.get() == b.get())
    }
}

impl From<UriRefBuf> for ServiceEndpoint {
    fn from(uri: UriRefBuf) -> Self {
        Self {
            uri_refs: vec![uri],
            objects: Vec::new(),
        }
    }
}

impl Serialize for ServiceEndpoint {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match (self.uri_refs.as_slice(), self.objects.as_slice()) {
            ([], []) => Err(serde::ser::Error::custom(DocumentError::NoServiceEndpoint)),
            ([uri], []) => serializer.serialize_str(uri.as_str()),
            ([], [object]) => object.serialize(serializer),
            (uris, objects) => {
                let mut seq = serializer.serialize_seq(Some(uris.len() + objects.len()))?;
                for uri in uris {
                    seq.serialize_element(uri.as_str())?;
                }
                for object in objects {
                    seq.serialize_element(object)?;
                }
                seq.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for ServiceEndpoint {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        Self::decode(&raw).map_err(de::Error::custom)
    }
}

fn endpoint_error(source: serde_json::Error) -> DocumentError {
    DocumentError::BrokenProperty {
        record: RECORD,
        name: "serviceEndpoint",
        source,
    }
}

impl TryFrom<Additional> for Service {
    type Error = DocumentError;

    fn try_from(mut additional: Additional) -> Result<Self, DocumentError> {
        let id: String = pop_property(&mut additional, RECORD, "id")?;
        let id = UriRefBuf::new(id.as_bytes().to_vec())
            .map_err(|_| DocumentError::MalformedServiceId(id))?;

        let raw_types = take_property(&mut additional, RECORD, "type")?;
        let types = crate::one_or_many::deserialize::<String, _>(
            &mut serde_json::Deserializer::from_str(raw_types.get()),
        )
        .map_err(|source| DocumentError::BrokenProperty {
            record: RECORD,
            name: "type",
            source,
        })?;
        if types.is_empty() {
            return Err(DocumentError::NoServiceType);
        }

        let raw_endpoint = take_property(&mut additional, RECORD, "serviceEndpoint")?;
        let endpoint = ServiceEndpoint::decode(&raw_endpoint)?;

        Ok(Self {
            id,
            types,
            endpoint,
            additional,
        })
    }
}

impl Serialize for Service {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        check_additional(&self.additional, RECORD, &RESERVED).map_err(serde::ser::Error::custom)?;
        if self.types.is_empty() {
            return Err(serde::ser::Error::custom(DocumentError::NoServiceType));
        }

        let mut map = serializer.serialize_map(Some(3 + self.additional.len()))?;
        map.serialize_entry("id", self.id.as_str())?;
        map.serialize_entry("type", &OneOrMany(&self.types))?;
        map.serialize_entry("serviceEndpoint", &self.endpoint)?;
        for (name, value) in &self.additional {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Service {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let additional = Additional::deserialize(deserializer)?;
        additional.try_into().map_err(de::Error::custom)
    }
}

struct OneOrMany<'a>(&'a [String]);

impl<'a> Serialize for OneOrMany<'a> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        crate::one_or_many::serialize(self.0, serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(json: &str) -> Result<Service, serde_json::Error> {
        serde_json::from_str(json)
    }

    #[test]
    fn endpoint_shapes() {
        let s = decode(
            r#"{"id": "did:example:123#linked-domain", "type": "LinkedDomains", "serviceEndpoint": "https://bar.example.com"}"#,
        )
        .unwrap();
        assert_eq!(s.id.as_str(), "did:example:123#linked-domain");
        assert_eq!(s.types, ["LinkedDomains"]);
        assert_eq!(s.endpoint.uri_refs.len(), 1);
        assert_eq!(s.endpoint.uri_refs[0].as_str(), "https://bar.example.com");
        assert!(s.endpoint.objects.is_empty());

        let s = decode(
            r##"{"id": "#hub", "type": ["Hub", "Relay"], "serviceEndpoint": {"origins": ["https://a.example.com"]}}"##,
        )
        .unwrap();
        assert_eq!(s.types, ["Hub", "Relay"]);
        assert!(s.endpoint.uri_refs.is_empty());
        assert_eq!(s.endpoint.objects.len(), 1);

        let s = decode(
            r##"{"id": "#mixed", "type": "Mixed", "serviceEndpoint": [{"a": 1}, "https://a.example.com", "/relative"]}"##,
        )
        .unwrap();
        assert_eq!(s.endpoint.uri_refs.len(), 2);
        assert_eq!(s.endpoint.objects.len(), 1);
    }

    #[test]
    fn encode_minimal() {
        let json = r#"{"id":"did:example:123#linked-domain","type":"LinkedDomains","serviceEndpoint":"https://bar.example.com","note":"x"}"#;
        let s = decode(json).unwrap();
        assert_eq!(s.additional_string("note").unwrap().as_deref(), Some("x"));
        assert_eq!(serde_json::to_string(&s).unwrap(), json);

        let json = r##"{"id":"#mixed","type":["A","B"],"serviceEndpoint":["https://a.example.com",{"a":1}]}"##;
        assert_eq!(serde_json::to_string(&decode(json).unwrap()).unwrap(), json);
    }

    #[test]
    fn decode_errors() {
        let err = decode(r##"{"id": "#x", "type": "T", "serviceEndpoint": ":"}"##).unwrap_err();
        assert!(err.to_string().starts_with("malformed DID service endpoint URI"));

        let err = decode(r##"{"id": "#x", "type": [], "serviceEndpoint": "/"}"##).unwrap_err();
        assert!(err.to_string().starts_with("no DID service type set"));

        let err = decode(r##"{"id": "#x", "type": "T", "serviceEndpoint": []}"##).unwrap_err();
        assert!(err.to_string().starts_with("no DID service endpoint set"));

        let err = decode(r##"{"id": "#x", "type": "T", "serviceEndpoint": 42}"##).unwrap_err();
        assert!(err
            .to_string()
            .starts_with("DID service endpoint entry is neither"));

        let err = decode(r##"{"id": "#x", "type": "T"}"##).unwrap_err();
        assert!(err
            .to_string()
            .starts_with("missing DID service property \"serviceEndpoint\""));

        let err = decode(r##"{"id": ":", "type": "T", "serviceEndpoint": "/"}"##).unwrap_err();
        assert!(err.to_string().starts_with("malformed DID service URI"));
    }

    #[test]
    fn encode_errors() {
        let mut s = decode(r##"{"id": "#x", "type": "T", "serviceEndpoint": "/"}"##).unwrap();
        s.endpoint = ServiceEndpoint::default();
        assert_eq!(
            serde_json::to_string(&s).unwrap_err().to_string(),
            "no DID service endpoint set"
        );

        s.endpoint = UriRefBuf::new(b"/".to_vec()).unwrap().into();
        s.types.clear();
        assert_eq!(
            serde_json::to_string(&s).unwrap_err().to_string(),
            "no DID service type set"
        );
    }
}
