//! Engine configuration

use serde::{Deserialize, Serialize};

/// Tuning knobs for [`ChangePropagationEngine`](crate::ChangePropagationEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Scan already-loaded documents by path suffix when the resolver rejects a specifier.
    pub fallback_scan: bool,
    /// Re-run cycle detection for every member of the root's old and new cycle,
    /// instead of only for the rebuilt document.
    pub refresh_cycle_members: bool,
    /// Extension appended to specifiers that carry none.
    pub default_extension: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            fallback_scan: true,
            refresh_cycle_members: false,
            default_extension: "x".to_string(),
        }
    }
}
