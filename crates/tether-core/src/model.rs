//! Core data structures for the import graph

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Canonical identifier for a loaded source unit.
///
/// Always a `/`-separated absolute path string. The graph stores these keys
/// and never a live document, so nothing in the engine owns document content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    pub fn new(id: impl Into<String>) -> Self {
        let id: String = id.into();
        DocumentId(id.replace('\\', "/"))
    }

    /// Build an identifier from a filesystem path.
    pub fn from_path(path: &Path) -> Self {
        DocumentId::new(path.to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Non-empty path segments, root first.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Last path segment, extension included.
    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    /// Last path segment with its extension stripped.
    pub fn file_stem(&self) -> Option<&str> {
        self.file_name().map(strip_extension)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        DocumentId::new(s)
    }
}

/// Strip a single trailing `.ext` from a file name. Dotfiles keep their name.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

/// An import statement as written in the source, prior to resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportStatement {
    pub specifier: String,
    pub alias: Option<String>,
}

impl ImportStatement {
    pub fn new(specifier: impl Into<String>) -> Self {
        ImportStatement {
            specifier: specifier.into(),
            alias: None,
        }
    }

    pub fn aliased(specifier: impl Into<String>, alias: impl Into<String>) -> Self {
        ImportStatement {
            specifier: specifier.into(),
            alias: Some(alias.into()),
        }
    }
}

/// One recorded import: the specifier, its alias, and the target it resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImportEdge {
    pub specifier: String,
    pub alias: Option<String>,
    /// `None` when resolution failed. The edge is kept so a later rename can match it.
    pub resolved: Option<DocumentId>,
}

impl ImportEdge {
    pub fn resolved(statement: &ImportStatement, target: DocumentId) -> Self {
        ImportEdge {
            specifier: statement.specifier.clone(),
            alias: statement.alias.clone(),
            resolved: Some(target),
        }
    }

    pub fn unresolved(statement: &ImportStatement) -> Self {
        ImportEdge {
            specifier: statement.specifier.clone(),
            alias: statement.alias.clone(),
            resolved: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.is_some()
    }
}

/// An externally visible declaration of a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExportedSymbol {
    pub kind: String,
    pub qualified_name: String,
}

impl ExportedSymbol {
    pub fn new(kind: impl Into<String>, qualified_name: impl Into<String>) -> Self {
        ExportedSymbol {
            kind: kind.into(),
            qualified_name: qualified_name.into(),
        }
    }

    /// `kind:qualifiedName`
    pub fn fingerprint(&self) -> String {
        format!("{}:{}", self.kind, self.qualified_name)
    }
}

/// Lifecycle of a document inside the host's build pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocumentState {
    Created,
    Parsed,
    IndexedContent,
    ComputedScopes,
    Linked,
    Validated,
}

impl DocumentState {
    /// The following phase, or `None` once validated.
    pub fn next(self) -> Option<DocumentState> {
        match self {
            DocumentState::Created => Some(DocumentState::Parsed),
            DocumentState::Parsed => Some(DocumentState::IndexedContent),
            DocumentState::IndexedContent => Some(DocumentState::ComputedScopes),
            DocumentState::ComputedScopes => Some(DocumentState::Linked),
            DocumentState::Linked => Some(DocumentState::Validated),
            DocumentState::Validated => None,
        }
    }
}

/// The host's view of a parsed document, borrowed read-only by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub state: DocumentState,
    pub imports: Vec<ImportStatement>,
    pub exports: Vec<ExportedSymbol>,
}

impl Document {
    pub fn new(id: impl Into<DocumentId>) -> Self {
        Document {
            id: id.into(),
            state: DocumentState::Created,
            imports: Vec::new(),
            exports: Vec::new(),
        }
    }

    pub fn with_import(mut self, specifier: impl Into<String>) -> Self {
        self.imports.push(ImportStatement::new(specifier));
        self
    }

    pub fn with_aliased_import(
        mut self,
        specifier: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        self.imports.push(ImportStatement::aliased(specifier, alias));
        self
    }

    pub fn with_export(mut self, kind: impl Into<String>, qualified_name: impl Into<String>) -> Self {
        self.exports.push(ExportedSymbol::new(kind, qualified_name));
        self
    }

    pub fn with_state(mut self, state: DocumentState) -> Self {
        self.state = state;
        self
    }
}

/// A closed walk `[A, B, …, A]` through the forward import graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleRecord {
    walk: Vec<DocumentId>,
}

impl CycleRecord {
    /// Returns `None` unless the walk is closed (first == last, at least two entries).
    pub fn from_walk(walk: Vec<DocumentId>) -> Option<Self> {
        match (walk.first(), walk.last()) {
            (Some(first), Some(last)) if walk.len() >= 2 && first == last => {
                Some(CycleRecord { walk })
            }
            _ => None,
        }
    }

    /// The full closed walk, first element repeated at the end.
    pub fn walk(&self) -> &[DocumentId] {
        &self.walk
    }

    /// Distinct members, in walk order.
    pub fn members(&self) -> &[DocumentId] {
        match self.walk.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.members().contains(id)
    }

    pub fn len(&self) -> usize {
        self.members().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when both records describe the same cycle, in any rotation.
    pub fn same_cycle(&self, other: &CycleRecord) -> bool {
        let (a, b) = (self.members(), other.members());
        if a.len() != b.len() {
            return false;
        }
        if a.is_empty() {
            return true;
        }
        let Some(offset) = b.iter().position(|id| *id == a[0]) else {
            return false;
        };
        a.iter()
            .enumerate()
            .all(|(i, id)| *id == b[(offset + i) % b.len()])
    }
}

impl fmt::Display for CycleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.walk.iter().map(DocumentId::as_str).collect();
        f.write_str(&parts.join(" -> "))
    }
}
