//! Engine error types

use tether_core::{CoreError, DocumentId};
use thiserror::Error;

use crate::resolver::ResolveError;

/// Failures surfaced by [`ChangePropagationEngine`](crate::ChangePropagationEngine).
///
/// Unresolvable imports never appear here; they become unresolved edges.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The resolver failed for a reason other than an unresolvable specifier.
    #[error("resolving '{specifier}' from {from} failed")]
    Resolver {
        from: DocumentId,
        specifier: String,
        #[source]
        source: ResolveError,
    },

    /// The update was cancelled before its edges were recorded.
    #[error("update of {id} was cancelled")]
    Cancelled { id: DocumentId },

    /// A store disagrees with the graph it caches. Indicates a missed invalidation.
    #[error(transparent)]
    Inconsistent(#[from] CoreError),
}
