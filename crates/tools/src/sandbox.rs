//! Path confinement for the file tools.

use std::path::{Component, Path, PathBuf};

pub const ESCAPE_MESSAGE: &str = "path escapes sandbox root";

/// A directory the file tools may not leave.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// The root need not exist yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir().unwrap_or_default().join(root)
        };
        Self {
            root: canonicalize_existing(&normalize(&root)),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `path` (relative to the root, or absolute) to a location inside the root.
    ///
    /// `..` components are folded lexically first; canonicalizing afterwards
    /// catches symlinks that point outside the root.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, String> {
        let requested = Path::new(path);
        let joined = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            self.root.join(requested)
        };
        let lexical = normalize(&joined);
        if !lexical.starts_with(&self.root) {
            return Err(ESCAPE_MESSAGE.into());
        }

        let resolved = canonicalize_existing(&lexical);
        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            Err(ESCAPE_MESSAGE.into())
        }
    }
}

/// Canonicalize the deepest existing ancestor and re-append the missing tail.
fn canonicalize_existing(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut tail = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }
    let mut resolved = existing
        .canonicalize()
        .unwrap_or_else(|_| existing.to_path_buf());
    for name in tail.iter().rev() {
        resolved.push(name);
    }
    resolved
}

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
