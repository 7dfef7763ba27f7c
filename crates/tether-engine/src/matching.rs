//! Rename/move fallback: specifier-to-identity matching by path segments
//!
//! Matching is exact per segment. `pre-sales` never matches `sales`.

use tether_core::{DocumentId, ImportEdge, strip_extension};

use crate::change_set::ChangeSet;

/// Specifier segments with relative markers and alias prefixes dropped and
/// the extension stripped from the last segment.
pub fn specifier_segments(specifier: &str) -> Vec<&str> {
    let mut segments: Vec<&str> = specifier
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .skip_while(|s| s.starts_with('@') || s.starts_with('~'))
        .collect();
    if let Some(last) = segments.last_mut() {
        *last = strip_extension(last);
    }
    segments
}

fn identity_segments(id: &DocumentId) -> Vec<&str> {
    let mut segments: Vec<&str> = id.segments().collect();
    if let Some(last) = segments.last_mut() {
        *last = strip_extension(last);
    }
    segments
}

/// The specifier's file name equals the identity's and its directory
/// segments are a trailing run of the identity's path.
pub fn specifier_matches(specifier: &str, id: &DocumentId) -> bool {
    let wanted = specifier_segments(specifier);
    if wanted.is_empty() {
        return false;
    }
    identity_segments(id).ends_with(&wanted)
}

/// Same identity, or the same extension-normalized file name under a
/// directory of the same name (a file moved between roots).
///
/// The parent segment is compared only when both identities have one, so
/// `/a/index.x` never matches `/b/index.x`.
pub fn identity_matches(resolved: &DocumentId, changed: &DocumentId) -> bool {
    if resolved == changed {
        return true;
    }
    let resolved = identity_segments(resolved);
    let changed = identity_segments(changed);
    match (resolved.split_last(), changed.split_last()) {
        (Some((a, a_dirs)), Some((b, b_dirs))) if a == b => {
            match (a_dirs.last(), b_dirs.last()) {
                (Some(a_parent), Some(b_parent)) => a_parent == b_parent,
                _ => true,
            }
        }
        _ => false,
    }
}

/// Whether any recorded edge points, by specifier or by resolved identity, at a changed document.
pub fn edges_match(edges: &[ImportEdge], changed: &ChangeSet) -> bool {
    edges.iter().any(|edge| {
        changed.iter().any(|id| {
            specifier_matches(&edge.specifier, id)
                || edge
                    .resolved
                    .as_ref()
                    .is_some_and(|resolved| identity_matches(resolved, id))
        })
    })
}
