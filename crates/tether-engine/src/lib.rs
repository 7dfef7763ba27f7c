//! Tether engine: change propagation and import resolution

pub mod cache;
pub mod change_set;
pub mod config;
pub mod engine;
pub mod error;
pub mod matching;
pub mod references;
pub mod registry;
pub mod resolver;


#[cfg(test)]
pub mod test_utils;

pub use cache::{AffectedSetCache, EngineStats};
pub use change_set::{ChangeSet, ChangeSetId};
pub use config::EngineConfig;
pub use engine::{ChangePropagationEngine, UpdateReport};
pub use error::EngineError;
pub use references::{NoReferences, ReferenceIndex};
pub use registry::{DocumentRegistry, InMemoryRegistry};
pub use resolver::{ResolveError, SpecifierResolver, WorkspaceResolver, open_workspace};
