//! Workspace configuration from `tether.toml`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tether_engine::EngineConfig;
use tracing::{debug, warn};

pub const CONFIG_FILE: &str = "tether.toml";

/// Directories never scanned for sources.
const DEFAULT_EXCLUDES: &[&str] = &["**/target/**", "**/.git/**", "**/node_modules/**"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Globs relative to the root. Empty means every file with the default extension.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Specifier prefix to directory, relative to the root.
    pub aliases: BTreeMap<String, PathBuf>,
    pub engine: EngineConfig,
}

impl WorkspaceConfig {
    /// Read `tether.toml` under `root`, falling back to defaults when absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        if !path.is_file() {
            debug!("No {} in {:?}, using defaults", CONFIG_FILE, root);
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn matcher(&self) -> Result<SourceMatcher> {
        let include = if self.include.is_empty() {
            vec![format!("**/*.{}", self.engine.default_extension)]
        } else {
            self.include.clone()
        };
        let exclude: Vec<String> = DEFAULT_EXCLUDES
            .iter()
            .map(|s| s.to_string())
            .chain(self.exclude.iter().cloned())
            .collect();

        Ok(SourceMatcher {
            include: build_set(&include)?,
            exclude: build_set(&exclude)?,
        })
    }
}

fn build_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).with_context(|| format!("Invalid glob '{}'", pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Decides which files under the root are workspace sources.
#[derive(Debug, Clone)]
pub struct SourceMatcher {
    include: GlobSet,
    exclude: GlobSet,
}

impl SourceMatcher {
    /// `relative` is a path relative to the workspace root.
    pub fn is_source(&self, relative: &Path) -> bool {
        self.include.is_match(relative) && !self.exclude.is_match(relative)
    }

    /// Every source file under `root`, sorted. Honours `.gitignore`.
    pub fn collect(&self, root: &Path) -> Vec<PathBuf> {
        let walker = WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(true)
            .git_exclude(true)
            .require_git(false)
            .build();

        let mut paths = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Walker error: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let relative = path.strip_prefix(root).unwrap_or(path);
            if self.is_source(relative) {
                paths.push(path.to_path_buf());
            }
        }
        paths.sort();
        debug!("Collected {} source files from {:?}", paths.len(), root);
        paths
    }
}
