//! Specifier resolution against the workspace

use std::collections::BTreeMap;
use std::io;
use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use dashmap::DashMap;
use tether_core::{DocumentId, ResolutionError};
use thiserror::Error;
use tracing::debug;

/// Why a specifier did not resolve.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The specifier is syntactically invalid, escapes the root, or names a
    /// missing file. The engine records the edge unresolved.
    #[error(transparent)]
    Unresolvable(#[from] ResolutionError),

    /// Anything else. Propagated to the caller.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Turns an import specifier into the identity of the imported document.
#[async_trait]
pub trait SpecifierResolver: Send + Sync {
    async fn resolve(&self, from: &DocumentId, specifier: &str) -> Result<DocumentId, ResolveError>;

    /// Drop cached resolutions made from `importers`.
    fn invalidate(&self, _importers: &[DocumentId]) {}

    /// Drop every cached resolution.
    fn clear(&self) {}
}

/// Filesystem resolver rooted at a workspace directory.
///
/// Specifiers resolve relative to the importing document's directory unless
/// they start with a configured alias prefix. A missing extension gets the
/// workspace default appended.
#[derive(Debug)]
pub struct WorkspaceResolver {
    root: PathBuf,
    extension: String,
    aliases: BTreeMap<String, PathBuf>,
    cache: DashMap<(DocumentId, String), DocumentId>,
}

impl WorkspaceResolver {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        WorkspaceResolver {
            root: normalize(&root.into()),
            extension: extension.into(),
            aliases: BTreeMap::new(),
            cache: DashMap::new(),
        }
    }

    /// Map a specifier prefix such as `@lib` to a directory. Relative
    /// directories are taken from the workspace root.
    pub fn with_alias(mut self, prefix: impl Into<String>, dir: impl AsRef<Path>) -> Self {
        let dir = self.root.join(dir.as_ref());
        self.aliases.insert(prefix.into(), normalize(&dir));
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of cached resolutions.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Compute the candidate path without touching the filesystem.
    pub fn candidate(&self, from: &DocumentId, specifier: &str) -> Result<PathBuf, ResolutionError> {
        validate(specifier)?;

        let joined = match self.alias_target(specifier) {
            Some(path) => path,
            None => {
                let base = from.as_path().parent().unwrap_or(self.root.as_path());
                base.join(specifier)
            }
        };

        let mut path = normalize(&joined);
        if !path.starts_with(&self.root) {
            return Err(ResolutionError::OutsideRoot {
                specifier: specifier.to_string(),
            });
        }

        let suffix = format!(".{}", self.extension);
        let has_extension = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().ends_with(&suffix));
        if !has_extension {
            let mut name = path.as_os_str().to_os_string();
            name.push(&suffix);
            path = PathBuf::from(name);
        }
        Ok(path)
    }

    fn alias_target(&self, specifier: &str) -> Option<PathBuf> {
        // Longest prefix wins.
        self.aliases.iter().rev().find_map(|(prefix, dir)| {
            if specifier == prefix {
                return Some(dir.clone());
            }
            specifier
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
                .map(|rest| dir.join(rest))
        })
    }
}

#[async_trait]
impl SpecifierResolver for WorkspaceResolver {
    async fn resolve(&self, from: &DocumentId, specifier: &str) -> Result<DocumentId, ResolveError> {
        let key = (from.clone(), specifier.to_string());
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit.value().clone());
        }

        let path = self.candidate(from, specifier)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {
                let id = DocumentId::from_path(&path);
                debug!("Resolved '{}' from {} to {}", specifier, from, id);
                self.cache.insert(key, id.clone());
                Ok(id)
            }
            Ok(_) => Err(not_found(from, specifier)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(not_found(from, specifier)),
            Err(err) => Err(ResolveError::Internal(
                anyhow::Error::new(err).context(format!("Failed to stat {}", path.display())),
            )),
        }
    }

    fn invalidate(&self, importers: &[DocumentId]) {
        self.cache.retain(|(from, _), _| !importers.contains(from));
    }

    fn clear(&self) {
        self.cache.clear();
    }
}

fn not_found(from: &DocumentId, specifier: &str) -> ResolveError {
    ResolveError::Unresolvable(ResolutionError::NotFound {
        specifier: specifier.to_string(),
        from: from.clone(),
    })
}

fn validate(specifier: &str) -> Result<(), ResolutionError> {
    let reason = if specifier.trim().is_empty() {
        "empty specifier"
    } else if specifier.contains('\0') {
        "contains a NUL byte"
    } else if specifier.starts_with('/') || Path::new(specifier).is_absolute() {
        "absolute paths are not allowed"
    } else {
        return Ok(());
    };
    Err(ResolutionError::InvalidSpecifier {
        specifier: specifier.to_string(),
        reason: reason.to_string(),
    })
}

/// Lexically resolve `.` and `..` without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Build a resolver from a directory and propagate a readable error if it is missing.
pub fn open_workspace(root: &Path, extension: &str) -> anyhow::Result<WorkspaceResolver> {
    let root = root
        .canonicalize()
        .with_context(|| format!("Workspace root {} does not exist", root.display()))?;
    Ok(WorkspaceResolver::new(root, extension))
}
