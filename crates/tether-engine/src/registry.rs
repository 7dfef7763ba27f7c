//! Host document registry

use dashmap::DashMap;
use tether_core::{Document, DocumentId, DocumentState};

/// Loaded documents as seen by the host. Thread-safe for concurrent access.
pub trait DocumentRegistry: Send + Sync {
    fn contains(&self, id: &DocumentId) -> bool;

    fn get(&self, id: &DocumentId) -> Option<Document>;

    /// All loaded identifiers, sorted.
    fn loaded(&self) -> Vec<DocumentId>;
}

/// Registry backed by a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    documents: DashMap<DocumentId, Document>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document.
    pub fn insert(&self, doc: Document) {
        self.documents.insert(doc.id.clone(), doc);
    }

    /// Return the existing document or register an empty `Created` one.
    pub fn get_or_create(&self, id: &DocumentId) -> Document {
        self.documents
            .entry(id.clone())
            .or_insert_with(|| Document::new(id.clone()))
            .value()
            .clone()
    }

    pub fn remove(&self, id: &DocumentId) -> Option<Document> {
        self.documents.remove(id).map(|(_, doc)| doc)
    }

    pub fn set_state(&self, id: &DocumentId, state: DocumentState) -> bool {
        match self.documents.get_mut(id) {
            Some(mut doc) => {
                doc.state = state;
                true
            }
            None => false,
        }
    }

    pub fn state(&self, id: &DocumentId) -> Option<DocumentState> {
        self.documents.get(id).map(|doc| doc.state)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn clear(&self) {
        self.documents.clear();
    }
}

impl DocumentRegistry for InMemoryRegistry {
    fn contains(&self, id: &DocumentId) -> bool {
        self.documents.contains_key(id)
    }

    fn get(&self, id: &DocumentId) -> Option<Document> {
        self.documents.get(id).map(|r| r.value().clone())
    }

    fn loaded(&self) -> Vec<DocumentId> {
        let mut ids: Vec<DocumentId> = self.documents.iter().map(|r| r.key().clone()).collect();
        ids.sort();
        ids
    }
}
