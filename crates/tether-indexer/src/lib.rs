//! Source loading, outline extraction, and build coordination

pub mod config;
pub mod coordinator;
pub mod extractor;
pub mod outline;

#[cfg(test)]
pub mod tests;

pub use config::{SourceMatcher, WorkspaceConfig};
pub use coordinator::{BuildSummary, Coordinator, RevalidationPlan};
pub use extractor::{ExtractError, OutlineExtractor};
pub use outline::RegexOutline;
