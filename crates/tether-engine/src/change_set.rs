//! Change sets with identity

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tether_core::DocumentId;

static NEXT_CHANGE_SET: AtomicU64 = AtomicU64::new(1);

/// Identity of one change-set instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChangeSetId(u64);

/// The documents changed in one build cycle.
///
/// Every constructed set gets a fresh [`ChangeSetId`]; clones share it. Two
/// sets with the same contents built separately are different instances, so
/// the affected-set cache treats them as different keys.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    id: ChangeSetId,
    documents: Arc<HashSet<DocumentId>>,
}

impl ChangeSet {
    pub fn new(documents: impl IntoIterator<Item = DocumentId>) -> Self {
        ChangeSet {
            id: ChangeSetId(NEXT_CHANGE_SET.fetch_add(1, Ordering::Relaxed)),
            documents: Arc::new(documents.into_iter().collect()),
        }
    }

    pub fn id(&self) -> ChangeSetId {
        self.id
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.documents.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentId> {
        self.documents.iter()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl FromIterator<DocumentId> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = DocumentId>>(iter: I) -> Self {
        ChangeSet::new(iter)
    }
}
