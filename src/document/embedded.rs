use std::collections::{btree_map::Entry, BTreeMap};

use log::debug;

use crate::{DID, DIDURL};

use super::{Document, DocumentError, VerificationMethod};

/// Index of the verification methods of a document, including the ones
/// embedded in verification relationships.
///
/// Methods with equivalent ids must have the same content.
#[derive(Debug)]
pub struct EmbeddedVerificationMethods<'a> {
    subject: &'a DID,

    /// Methods in order of appearance, with their id resolved against the
    /// subject.
    methods: Vec<(DIDURL, &'a VerificationMethod)>,

    /// Position in `methods` by resolved id string.
    by_id: BTreeMap<String, usize>,
}

impl<'a> EmbeddedVerificationMethods<'a> {
    pub fn new(document: &'a Document) -> Result<Self, DocumentError> {
        let mut index = Self {
            subject: &document.subject,
            methods: Vec::new(),
            by_id: BTreeMap::new(),
        };

        let embedded = document
            .relationships()
            .flat_map(|(_, relationship)| &relationship.methods);
        for method in document.verification_methods.iter().chain(embedded) {
            index.insert(method)?;
        }

        Ok(index)
    }

    fn insert(&mut self, method: &'a VerificationMethod) -> Result<(), DocumentError> {
        let id = method.id.resolve(self.subject).into_owned();

        if let Some(existing) = self.find(&id) {
            if existing.same_content(method) {
                debug!("duplicate verification method {id} ignored");
                return Ok(());
            }
            return Err(DocumentError::ConflictingMethod(id.to_string()));
        }

        match self.by_id.entry(id.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(self.methods.len());
            }
            Entry::Occupied(entry) => {
                return Err(DocumentError::ConflictingMethod(entry.key().clone()))
            }
        }
        self.methods.push((id, method));

        Ok(())
    }

    fn find(&self, id: &DIDURL) -> Option<&'a VerificationMethod> {
        if let Some(&i) = self.by_id.get(&id.to_string()) {
            return Some(self.methods[i].1);
        }

        self.methods
            .iter()
            .find(|(other, _)| other.equal(id))
            .map(|(_, method)| *method)
    }

    /// Looks up the verification method identified by `reference`, possibly
    /// relative to the subject. Malformed references match nothing.
    pub fn dereference(&self, reference: &str) -> Option<&'a VerificationMethod> {
        let resolved = self.subject.resolve_reference(reference).ok()?;
        if let Some(&i) = self.by_id.get(&*resolved) {
            return Some(self.methods[i].1);
        }

        let url = DIDURL::parse(&resolved).ok()?;
        self.find(&url)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Returns each distinct method, in order of appearance.
    pub fn iter(&self) -> impl Iterator<Item = &'a VerificationMethod> + '_ {
        self.methods.iter().map(|(_, method)| *method)
    }
}
