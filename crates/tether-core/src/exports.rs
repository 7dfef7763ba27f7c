//! Export signatures and change detection on reindex

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::{Document, DocumentId, ExportedSymbol};

/// Set of `kind:qualifiedName` fingerprints for a document's visible declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportSignature {
    fingerprints: BTreeSet<String>,
}

impl ExportSignature {
    pub fn from_symbols<'a>(symbols: impl IntoIterator<Item = &'a ExportedSymbol>) -> Self {
        ExportSignature {
            fingerprints: symbols.into_iter().map(ExportedSymbol::fingerprint).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.fingerprints.contains(fingerprint)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fingerprints.iter().map(String::as_str)
    }

    /// Fingerprints added and removed going from `self` to `newer`.
    pub fn delta<'a>(&'a self, newer: &'a ExportSignature) -> (Vec<&'a str>, Vec<&'a str>) {
        let added = newer
            .fingerprints
            .difference(&self.fingerprints)
            .map(String::as_str)
            .collect();
        let removed = self
            .fingerprints
            .difference(&newer.fingerprints)
            .map(String::as_str)
            .collect();
        (added, removed)
    }
}

/// Last known export signature per document.
#[derive(Debug, Clone, Default)]
pub struct ExportSignatureTracker {
    snapshots: HashMap<DocumentId, ExportSignature>,
}

impl ExportSignatureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signature of a document's current exported symbols.
    pub fn snapshot(doc: &Document) -> ExportSignature {
        ExportSignature::from_symbols(&doc.exports)
    }

    /// The stored signature, if the document was ever diffed.
    pub fn get(&self, id: &DocumentId) -> Option<&ExportSignature> {
        self.snapshots.get(id)
    }

    /// Store `new_snapshot` and report whether it differs from the previous one.
    /// A document without a previous snapshot counts as changed.
    pub fn diff_and_update(&mut self, id: &DocumentId, new_snapshot: ExportSignature) -> bool {
        match self.snapshots.insert(id.clone(), new_snapshot) {
            Some(previous) => self.snapshots.get(id) != Some(&previous),
            None => true,
        }
    }

    pub fn remove(&mut self, id: &DocumentId) -> Option<ExportSignature> {
        self.snapshots.remove(id)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}
