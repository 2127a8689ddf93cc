//! Path sandbox: every path argument is checked against the configured root
//! before the filesystem is touched.

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{AppError, Result};

/// Collapses backslashes to `/` and resolves `.`/`..` segments without
/// consulting the filesystem (symlinks are not followed).
pub fn normalize(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let absolute = unified.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => match segments.last() {
                Some(&last) if last != ".." && !is_drive(last) => {
                    segments.pop();
                }
                // `..` above an absolute root or a drive stays at the root
                _ if absolute || segments.last().is_some_and(|s| is_drive(s)) => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if absolute {
        format!("/{}", joined)
    } else if joined.is_empty() {
        ".".to_string()
    } else if segments.len() == 1 && is_drive(&joined) {
        format!("{}/", joined)
    } else {
        joined
    }
}

fn is_drive(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// True when the normalized `candidate` equals `root` or lies below it.
pub fn is_within(root: &str, candidate: &str) -> bool {
    match candidate.strip_prefix(root) {
        Some(rest) => rest.is_empty() || root.ends_with('/') || rest.starts_with('/'),
        None => false,
    }
}

#[derive(Debug, Clone, Default)]
pub struct Sandbox {
    root: Option<Arc<str>>,
    legacy_prefix_match: bool,
}

impl Sandbox {
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// An empty root means no restriction.
    pub fn new(root: impl AsRef<str>) -> Self {
        let root = root.as_ref().trim();
        if root.is_empty() {
            return Self::unrestricted();
        }

        Self {
            root: Some(Arc::from(normalize(root))),
            legacy_prefix_match: false,
        }
    }

    pub fn from_root(root: Option<String>) -> Self {
        root.map(Self::new).unwrap_or_default()
    }

    /// Restores the raw string-prefix test, under which root `/data` also
    /// admits `/database`.
    pub fn with_legacy_prefix_match(mut self, enabled: bool) -> Self {
        self.legacy_prefix_match = enabled;
        self
    }

    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn is_restricted(&self) -> bool {
        self.root.is_some()
    }

    pub fn is_safe(&self, candidate: &str) -> bool {
        if candidate.is_empty() {
            return false;
        }

        let Some(root) = self.root.as_deref() else {
            return true;
        };

        let normalized = normalize(candidate);
        if self.legacy_prefix_match {
            normalized.starts_with(root)
        } else {
            is_within(root, &normalized)
        }
    }

    /// Validates `candidate` and returns the normalized path that operations
    /// must use, so the checked path is the one that gets touched.
    pub fn check(&self, candidate: &str) -> Result<PathBuf> {
        if !self.is_safe(candidate) {
            tracing::warn!(path = %candidate, "rejected path outside sandbox");
            return Err(AppError::PathUnsafe(candidate.to_string()));
        }
        Ok(PathBuf::from(normalize(candidate)))
    }
}
