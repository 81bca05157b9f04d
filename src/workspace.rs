use git2::Repository;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{PromoteError, Result};
use crate::git::{RepoEndpoint, WorkingTreeSnapshot};

/// Never part of a dev release snapshot, wherever they appear
const ALWAYS_SKIPPED: &[&str] = &[".git"];

/// Skipped at the repository root only
const ROOT_SKIPPED: &[&str] = &[".gitignore"];

/// The caller's checkout.
///
/// Read-only: used to find the remote URL and to list the files a dev release
/// publishes. Promotions never touch it.
pub struct Workspace {
    repo: Repository,
}

impl Workspace {
    /// Discovers the git repository containing `path` or one of its parents.
    ///
    /// # Returns
    /// * `Ok(Workspace)` - Repository found
    /// * `Err` - If `path` is not inside a git repository
    pub fn discover(path: &Path) -> Result<Self> {
        let repo = Repository::discover(path).map_err(|e| {
            PromoteError::precondition(format!("Not in a git repository: {}", e.message()))
        })?;
        Ok(Workspace { repo })
    }

    /// Working tree root
    pub fn root(&self) -> Result<&Path> {
        self.repo
            .workdir()
            .ok_or_else(|| PromoteError::precondition("Repository has no working tree"))
    }

    /// Gets all configured remote names from the repository.
    ///
    /// Remotes are sorted with "origin" first (if it exists), followed by others alphabetically.
    pub fn list_remotes(&self) -> Result<Vec<String>> {
        let remote_names = self.repo.remotes()?;
        let mut remotes: Vec<String> = remote_names.iter().flatten().map(String::from).collect();

        remotes.sort_by(|a, b| {
            if a == "origin" {
                std::cmp::Ordering::Less
            } else if b == "origin" {
                std::cmp::Ordering::Greater
            } else {
                a.cmp(b)
            }
        });

        Ok(remotes)
    }

    /// URL of the named remote
    pub fn remote_url(&self, remote_name: &str) -> Result<String> {
        let remote = self.repo.find_remote(remote_name).map_err(|_| {
            PromoteError::precondition(format!("Remote '{}' not found", remote_name))
        })?;
        remote
            .url()
            .map(String::from)
            .ok_or_else(|| {
                PromoteError::precondition(format!("Remote '{}' has no usable URL", remote_name))
            })
    }

    pub fn endpoint(&self, remote_name: &str) -> Result<RepoEndpoint> {
        Ok(RepoEndpoint::new(self.remote_url(remote_name)?, true))
    }

    /// Every file a dev release would publish.
    ///
    /// Walks the working tree, skipping `.git`, the root `.gitignore` and
    /// anything the repository's ignore rules exclude. Symlinks are listed, not
    /// followed.
    pub fn snapshot(&self) -> Result<WorkingTreeSnapshot> {
        let root = self.root()?.to_path_buf();
        let mut files = Vec::new();
        self.collect(&root, &root, &mut files)?;
        debug!(root = %root.display(), files = files.len(), "working tree snapshot");
        Ok(WorkingTreeSnapshot::new(root, files))
    }

    fn collect(&self, root: &Path, dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if ALWAYS_SKIPPED.contains(&name.as_ref())
                || (dir == root && ROOT_SKIPPED.contains(&name.as_ref()))
            {
                continue;
            }

            let path = entry.path();
            let relative = path
                .strip_prefix(root)
                .map_err(|_| {
                    PromoteError::precondition(format!(
                        "{} escapes the working tree",
                        path.display()
                    ))
                })?
                .to_path_buf();
            if self.repo.is_path_ignored(&relative)? {
                continue;
            }

            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.collect(root, &path, files)?;
            } else if file_type.is_file() || file_type.is_symlink() {
                files.push(relative);
            }
        }
        Ok(())
    }
}

/// Resolve the endpoint for `remote_name` from the checkout containing `path`.
///
/// Never fails: outside a repository the endpoint has `is_repo == false`, and a
/// missing remote yields an empty URL. [RepoEndpoint::validate] reports both.
pub fn resolve_endpoint(path: &Path, remote_name: &str) -> RepoEndpoint {
    match Workspace::discover(path) {
        Ok(workspace) => {
            let url = workspace.remote_url(remote_name).unwrap_or_default();
            RepoEndpoint::new(url, true)
        }
        Err(_) => RepoEndpoint::new("", false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_workspace() -> TempDir {
        let temp_dir = TempDir::new().expect("Could not create temp dir");
        let repo = Repository::init(temp_dir.path()).expect("Could not init git repo");
        repo.remote("origin", "https://example.com/project.git")
            .expect("Could not add remote");
        repo.remote("backup", "https://example.com/backup.git")
            .expect("Could not add remote");

        let root = temp_dir.path();
        fs::write(root.join(".gitignore"), "target/\n*.log\n").unwrap();
        fs::write(root.join("README.md"), "hello\n").unwrap();
        fs::write(root.join("debug.log"), "noise\n").unwrap();
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::write(root.join("src/main.rs"), "fn main() {}\n").unwrap();
        fs::write(root.join("src/nested/.gitignore"), "*.tmp\n").unwrap();
        fs::create_dir_all(root.join("target/debug")).unwrap();
        fs::write(root.join("target/debug/app"), "binary").unwrap();
        temp_dir
    }

    #[test]
    fn test_list_remotes_origin_first() {
        let dir = setup_workspace();
        let workspace = Workspace::discover(dir.path()).unwrap();
        assert_eq!(workspace.list_remotes().unwrap(), vec!["origin", "backup"]);
    }

    #[test]
    fn test_endpoint_from_remote() {
        let dir = setup_workspace();
        let workspace = Workspace::discover(&dir.path().join("src")).unwrap();
        let endpoint = workspace.endpoint("origin").unwrap();
        assert_eq!(endpoint.remote_url, "https://example.com/project.git");
        assert!(endpoint.is_repo);
        assert!(workspace.endpoint("upstream").is_err());
    }

    #[test]
    fn test_resolve_endpoint_outside_repository() {
        let dir = TempDir::new().unwrap();
        let endpoint = resolve_endpoint(dir.path(), "origin");
        assert!(!endpoint.is_repo);
        assert!(endpoint.validate().is_err());
    }

    #[test]
    fn test_resolve_endpoint_missing_remote() {
        let dir = setup_workspace();
        let endpoint = resolve_endpoint(dir.path(), "upstream");
        assert!(endpoint.is_repo);
        assert!(endpoint.remote_url.is_empty());
        assert!(endpoint.validate().is_err());
    }

    #[test]
    fn test_snapshot_honors_ignore_rules() {
        let dir = setup_workspace();
        let workspace = Workspace::discover(dir.path()).unwrap();
        let snapshot = workspace.snapshot().unwrap();

        assert_eq!(
            snapshot.files,
            vec![
                PathBuf::from("README.md"),
                PathBuf::from("src/main.rs"),
                PathBuf::from("src/nested/.gitignore"),
            ]
        );
    }
}
