//! # Snapshot
//! Listeners never see individual changes. Every delivery is the complete current content of the
//! collection, so a reader that replaces its local copy with each snapshot cannot drift from the store.

use crate::data_model::{CollectionPath, DocumentId, ServerTimestamp};

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Document<F> {
    pub id: DocumentId,
    pub fields: F,
    pub created_at: ServerTimestamp,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot<F> {
    pub collection: CollectionPath,
    /// Ordered by document id.
    pub documents: Vec<Document<F>>,
}

impl<F> Snapshot<F> {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl<F> IntoIterator for Snapshot<F> {
    type Item = Document<F>;
    type IntoIter = std::vec::IntoIter<Document<F>>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}
