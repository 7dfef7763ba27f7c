//! Tether core: the import graph and the data it tracks per document

pub mod cycles;
pub mod error;
pub mod exports;
pub mod graph;
pub mod model;


#[cfg(test)]
pub mod test_utils;

pub use cycles::CycleDetector;
pub use error::{CoreError, ResolutionError};
pub use exports::{ExportSignature, ExportSignatureTracker};
pub use graph::DependencyGraph;
pub use model::{
    CycleRecord, Document, DocumentId, DocumentState, ExportedSymbol, ImportEdge,
    ImportStatement, strip_extension,
};
