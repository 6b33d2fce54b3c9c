use crate::{model::DocumentId, value::IndexableValue};
use std::collections::BTreeSet;

///
/// ValueOccurrences
///
/// Frequency of one distinct indexed value: the documents it appears in and
/// the number of nodes carrying it.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ValueOccurrences {
    value: IndexableValue,
    documents: BTreeSet<DocumentId>,
    occurrences: u64,
}

impl ValueOccurrences {
    #[must_use]
    pub const fn new(value: IndexableValue) -> Self {
        Self {
            value,
            documents: BTreeSet::new(),
            occurrences: 0,
        }
    }

    #[must_use]
    pub const fn value(&self) -> &IndexableValue {
        &self.value
    }

    #[must_use]
    pub const fn documents(&self) -> &BTreeSet<DocumentId> {
        &self.documents
    }

    #[must_use]
    pub const fn occurrences(&self) -> u64 {
        self.occurrences
    }

    pub(crate) fn add_document(&mut self, doc: DocumentId) {
        self.documents.insert(doc);
    }

    pub(crate) const fn add_occurrences(&mut self, count: u64) {
        self.occurrences = self.occurrences.saturating_add(count);
    }
}
