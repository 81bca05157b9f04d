//! Turning a list of working-tree files into a git tree without touching the
//! caller's index.

use std::fs;
use std::path::{Component, Path, PathBuf};

use git2::{IndexEntry, IndexTime, Oid, Repository};

use crate::error::{PromoteError, Result};

const MODE_FILE: u32 = 0o100644;
const MODE_EXECUTABLE: u32 = 0o100755;
const MODE_SYMLINK: u32 = 0o120000;

/// Files selected from the caller's working tree for a dev release.
///
/// Paths are relative to `root`, sorted and deduplicated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingTreeSnapshot {
    pub root: PathBuf,
    pub files: Vec<PathBuf>,
}

impl WorkingTreeSnapshot {
    pub fn new(root: impl Into<PathBuf>, mut files: Vec<PathBuf>) -> Self {
        files.sort();
        files.dedup();
        WorkingTreeSnapshot {
            root: root.into(),
            files,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }
}

/// Slash-separated path as stored in a git tree
fn tree_path(relative: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or_else(|| {
                PromoteError::precondition(format!(
                    "Path is not valid UTF-8: {}",
                    relative.display()
                ))
            })?),
            Component::CurDir => {}
            _ => {
                return Err(PromoteError::precondition(format!(
                    "Snapshot path must be relative to the repository root: {}",
                    relative.display()
                )))
            }
        }
    }
    if parts.is_empty() {
        return Err(PromoteError::precondition("Snapshot contains an empty path"));
    }
    Ok(parts.join("/"))
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}

/// Blob id and file mode for one snapshot entry
fn write_blob(repo: &Repository, path: &Path) -> Result<(Oid, u32)> {
    let metadata = fs::symlink_metadata(path)?;
    if metadata.file_type().is_symlink() {
        let target = fs::read_link(path)?;
        let target = target.to_str().ok_or_else(|| {
            PromoteError::precondition(format!(
                "Symlink target is not valid UTF-8: {}",
                path.display()
            ))
        })?;
        return Ok((repo.blob(target.as_bytes())?, MODE_SYMLINK));
    }
    let mode = if is_executable(&metadata) {
        MODE_EXECUTABLE
    } else {
        MODE_FILE
    };
    Ok((repo.blob_path(path)?, mode))
}

/// Write every snapshot file into `repo` and return the resulting tree.
///
/// Uses an in-memory index, so `repo` may be bare.
pub fn write_tree(repo: &Repository, snapshot: &WorkingTreeSnapshot) -> Result<Oid> {
    let mut index = git2::Index::new()?;

    for relative in &snapshot.files {
        let path = tree_path(relative)?;
        let (id, mode) = write_blob(repo, &snapshot.root.join(relative))?;
        index.add(&IndexEntry {
            ctime: IndexTime::new(0, 0),
            mtime: IndexTime::new(0, 0),
            dev: 0,
            ino: 0,
            mode,
            uid: 0,
            gid: 0,
            file_size: 0,
            id,
            flags: 0,
            flags_extended: 0,
            path: path.into_bytes(),
        })?;
    }

    Ok(index.write_tree_to(repo)?)
}
