//! # Decentralized Identifiers (DIDs)
//!
//! As specified by [Decentralized Identifiers (DIDs) v1.0 - Core architecture,
//! data model, and representations][did-core].
//!
//! DIDs and DID URLs parse into a canonical form, and compare for
//! equivalence following the normalization rules of
//! [RFC 3986, section 6][rfc3986-6]. DID documents decode from and encode
//! into JSON, with unknown properties of verification methods and services
//! kept as is.
//!
//! ```
//! use dids_core::{Document, DID};
//!
//! let did = DID::parse("did:web:example.com%3A8443").unwrap();
//! assert!(did.equal_str("did:web:example.com:8443"));
//!
//! let doc = Document::from_json(br##"{
//!     "id": "did:web:example.com%3A8443",
//!     "verificationMethod": [{
//!         "id": "#key-1",
//!         "type": "Multikey",
//!         "controller": "did:web:example.com%3A8443",
//!         "publicKeyMultibase": "z6MkmM42vxfqZQsv4ehtTjFFxQ4sQKS2w6WR7emozFAn5cxu"
//!     }],
//!     "authentication": ["#key-1"]
//! }"##).unwrap();
//!
//! let (found, not_found) = doc.verification_method_refs().unwrap();
//! assert_eq!(found["#key-1"].type_, "Multikey");
//! assert!(not_found.is_empty());
//! ```
//!
//! [did-core]: https://www.w3.org/TR/did-core/
//! [rfc3986-6]: https://www.rfc-editor.org/rfc/rfc3986#section-6
mod did;
pub mod document;
pub mod escape;
pub mod one_or_many;
pub mod resolution;

pub use did::*;
pub use document::{Document, DocumentError, Set, MEDIA_TYPE, NAMESPACE};
pub use resolution::{DIDResolver, StaticResolver};

#[cfg(feature = "http")]
pub use resolution::HTTPDIDResolver;
