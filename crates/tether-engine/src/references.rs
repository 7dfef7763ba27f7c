//! Hook into the host's own cross-reference index

use tether_core::{Document, DocumentId};

use crate::change_set::ChangeSet;

/// The host's semantic reference index.
///
/// `index_content` runs between the old and new export snapshots of an
/// update; `references_any` is the first check of `is_affected`.
pub trait ReferenceIndex: Send + Sync {
    fn index_content(&mut self, doc: &Document);

    /// True if `doc` has a direct cross-reference into any changed document.
    fn references_any(&self, doc: &DocumentId, changed: &ChangeSet) -> bool;

    fn remove(&mut self, id: &DocumentId);

    fn clear(&mut self);
}

/// A host without a reference index.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReferences;

impl ReferenceIndex for NoReferences {
    fn index_content(&mut self, _doc: &Document) {}

    fn references_any(&self, _doc: &DocumentId, _changed: &ChangeSet) -> bool {
        false
    }

    fn remove(&mut self, _id: &DocumentId) {}

    fn clear(&mut self) {}
}
