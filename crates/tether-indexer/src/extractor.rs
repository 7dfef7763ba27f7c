//! Outline extractor trait definition

use tether_core::{Document, DocumentId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{id} is not valid UTF-8")]
    NotUtf8 {
        id: DocumentId,
        #[source]
        source: std::str::Utf8Error,
    },
}

/// Turns raw file content into the host's view of a document: its import
/// statements and exported declarations.
pub trait OutlineExtractor: Send + Sync {
    fn extract(&self, id: &DocumentId, content: &[u8]) -> Result<Document, ExtractError>;
}
