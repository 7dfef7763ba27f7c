//! Error types shared by the graph and the engine.

use thiserror::Error;

use crate::model::DocumentId;

/// A specifier could not be turned into a document identity.
///
/// Always recovered locally: the edge is recorded unresolved and the
/// validator reports the missing import.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("invalid import specifier '{specifier}': {reason}")]
    InvalidSpecifier { specifier: String, reason: String },

    #[error("import specifier '{specifier}' escapes the workspace root")]
    OutsideRoot { specifier: String },

    #[error("cannot find '{specifier}' imported from {from}")]
    NotFound { specifier: String, from: DocumentId },
}

/// Contract violations inside the graph stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// The reverse index disagrees with the forward edges.
    #[error("graph inconsistency: {reason}")]
    GraphInconsistency { reason: String },
}
