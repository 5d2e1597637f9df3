//! Write targets discovery.
//!
//! Walks a directory tree once and captures every entry the current process
//! can write to. The result is a snapshot: it is computed eagerly and is not
//! affected by whatever happens on the filesystem afterwards.

use std::{
    io,
    path::{Path, PathBuf},
};

use walkdir::{DirEntry, WalkDir};

/// The kind of a write target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// A directory new files can be created in.
    Directory,
    /// An existing file that can be extended.
    File,
}

/// What to collect while walking the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Every writable directory, the root included.
    Directories,
    /// Every writable regular file.
    Files,
}

impl Scope {
    /// The kind of targets this scope produces.
    pub fn kind(&self) -> Kind {
        match self {
            Scope::Directories => Kind::Directory,
            Scope::Files => Kind::File,
        }
    }

    /// Whether the entry is of the kind we are looking for.
    fn matches(&self, entry: &DirEntry) -> bool {
        let file_type = entry.file_type();
        match self {
            Scope::Directories => file_type.is_dir(),
            Scope::Files => file_type.is_file(),
        }
    }
}

/// A single write target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// The absolute path to the target.
    pub path: PathBuf,
    /// What the target is.
    pub kind: Kind,
}

/// Walk the tree at `root` depth-first, in pre-order, and collect the
/// writable targets of the given `scope`.
///
/// Siblings are visited in file name order. Symbolic links are not followed.
/// Entries that can't be read (together with their subtrees) are skipped.
/// The only error is the failure to make the `root` path absolute.
pub fn enumerate(root: impl AsRef<Path>, scope: Scope) -> Result<Vec<Target>, io::Error> {
    let root = std::path::absolute(root)?;
    let kind = scope.kind();

    let targets: Vec<_> = WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::debug!(
                    message = "skipping an unreadable entry",
                    path = ?err.path(),
                    error = %err
                );
                None
            }
        })
        .filter(|entry| scope.matches(entry))
        .filter(|entry| is_writable(entry.path()))
        .map(|entry| Target {
            path: entry.into_path(),
            kind,
        })
        .collect();

    tracing::debug!(message = "enumerated targets", root = %root.display(), ?scope, count = targets.len());
    Ok(targets)
}

/// Whether the current process has write access to the path.
#[cfg(unix)]
fn is_writable(path: &Path) -> bool {
    nix::unistd::access(path, nix::unistd::AccessFlags::W_OK).is_ok()
}

/// Whether the current process has write access to the path.
#[cfg(not(unix))]
fn is_writable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|metadata| !metadata.permissions().readonly())
        .unwrap_or(false)
}
