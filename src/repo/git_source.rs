use super::RepoDiffSource;
use crate::error::RepoError;
use crate::types::{ChangeStatus, FileChange};
use git2::{Commit, Delta, DiffFindOptions, DiffOptions, ErrorCode, FileMode, Oid, Repository};
use std::path::{Path, PathBuf};

/// [`RepoDiffSource`] backed by libgit2
///
/// `git2::Repository` is not `Sync`, so the handle is reopened for every call.
pub struct GitDiffSource {
    /// Path to the `.git` directory
    git_dir: PathBuf,
    /// Working tree root, or the git dir for bare repositories
    root: PathBuf,
}

impl GitDiffSource {
    /// Discover and open a git repository from any path within it
    pub fn discover<P: AsRef<Path>>(path: P) -> Result<Self, RepoError> {
        let path = path.as_ref();
        let repo = Repository::discover(path)
            .map_err(|e| RepoError::NotAGitRepository(format!("{}: {}", path.display(), e)))?;

        let git_dir = repo.path().to_path_buf();
        let root = repo
            .workdir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| git_dir.clone());

        tracing::info!("Opened git repository at: {}", root.display());

        Ok(Self { git_dir, root })
    }

    /// Working tree root
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn open_repo(&self) -> Result<Repository, RepoError> {
        Repository::open(&self.git_dir)
            .map_err(|e| RepoError::NotAGitRepository(format!("{}: {}", self.root.display(), e)))
    }

    fn peel_commit<'r>(repo: &'r Repository, id: &str) -> Result<Commit<'r>, RepoError> {
        repo.revparse_single(id)
            .and_then(|obj| obj.peel_to_commit())
            .map_err(|_| RepoError::UnknownCommit(id.to_string()))
    }

    fn blob_size(repo: &Repository, oid: Oid) -> Option<u64> {
        repo.find_blob(oid).ok().map(|blob| blob.size() as u64)
    }
}

fn delta_path(file: &git2::DiffFile<'_>) -> Option<String> {
    file.path().map(|p| p.to_string_lossy().replace('\\', "/"))
}

impl RepoDiffSource for GitDiffSource {
    fn current_commit(&self) -> Result<String, RepoError> {
        let repo = self.open_repo()?;
        let head = repo.head().map_err(|e| match e.code() {
            ErrorCode::UnbornBranch | ErrorCode::NotFound => RepoError::EmptyRepository,
            _ => RepoError::NotAGitRepository(format!("Failed to get HEAD: {}", e)),
        })?;
        let commit = head
            .peel_to_commit()
            .map_err(|e| RepoError::NotAGitRepository(format!("HEAD is not a commit: {}", e)))?;
        Ok(commit.id().to_string())
    }

    fn commit_exists(&self, id: &str) -> bool {
        match self.open_repo() {
            Ok(repo) => Self::peel_commit(&repo, id).is_ok(),
            Err(_) => false,
        }
    }

    fn resolve_commit(&self, rev: &str) -> Result<String, RepoError> {
        let repo = self.open_repo()?;
        Self::peel_commit(&repo, rev).map(|commit| commit.id().to_string())
    }

    fn diff(&self, from: &str, to: &str) -> Result<Vec<FileChange>, RepoError> {
        let repo = self.open_repo()?;
        let from_tree = Self::peel_commit(&repo, from)?
            .tree()
            .map_err(|e| RepoError::DiffFailed(format!("Failed to get tree: {}", e)))?;
        let to_tree = Self::peel_commit(&repo, to)?
            .tree()
            .map_err(|e| RepoError::DiffFailed(format!("Failed to get tree: {}", e)))?;

        let mut opts = DiffOptions::new();
        opts.ignore_submodules(true);
        let mut diff = repo
            .diff_tree_to_tree(Some(&from_tree), Some(&to_tree), Some(&mut opts))
            .map_err(|e| RepoError::DiffFailed(format!("Failed to compute diff: {}", e)))?;

        let mut find_opts = DiffFindOptions::new();
        find_opts.renames(true);
        diff.find_similar(Some(&mut find_opts))
            .map_err(|e| RepoError::DiffFailed(format!("Rename detection failed: {}", e)))?;

        let mut changes = Vec::new();
        for delta in diff.deltas() {
            let old_file = delta.old_file();
            let new_file = delta.new_file();

            // Submodule pointers are gitlinks, not files
            if old_file.mode() == FileMode::Commit || new_file.mode() == FileMode::Commit {
                tracing::debug!("Skipping submodule change: {:?}", new_file.path());
                continue;
            }

            let change = match delta.status() {
                Delta::Added | Delta::Copied => {
                    delta_path(&new_file).map(|path| FileChange::new(path, ChangeStatus::Added))
                }
                Delta::Modified | Delta::Typechange => delta_path(&new_file)
                    .map(|path| FileChange::new(path, ChangeStatus::Modified)),
                Delta::Deleted => {
                    delta_path(&old_file).map(|path| FileChange::new(path, ChangeStatus::Deleted))
                }
                Delta::Renamed => match (delta_path(&old_file), delta_path(&new_file)) {
                    (Some(from_path), Some(to_path)) => {
                        Some(FileChange::renamed(from_path, to_path))
                    }
                    _ => None,
                },
                other => {
                    tracing::debug!("Skipping diff entry with status {:?}", other);
                    None
                }
            };

            if let Some(mut change) = change {
                if change.status != ChangeStatus::Deleted {
                    change.size_bytes = Self::blob_size(&repo, new_file.id());
                }
                changes.push(change);
            }
        }

        tracing::debug!(
            "Diff {}..{} produced {} change(s)",
            from,
            to,
            changes.len()
        );
        Ok(changes)
    }

    fn has_changes(&self, from: &str, to: &str) -> Result<bool, RepoError> {
        let repo = self.open_repo()?;
        let from_tree = Self::peel_commit(&repo, from)?.tree_id();
        let to_tree = Self::peel_commit(&repo, to)?.tree_id();
        Ok(from_tree != to_tree)
    }

    fn read_file(&self, commit: &str, path: &str) -> Result<String, RepoError> {
        let read_failed = |reason: String| RepoError::ReadFailed {
            path: path.to_string(),
            commit: commit.to_string(),
            reason,
        };

        let repo = self.open_repo()?;
        let tree = Self::peel_commit(&repo, commit)?
            .tree()
            .map_err(|e| read_failed(e.to_string()))?;
        let entry = tree
            .get_path(Path::new(path))
            .map_err(|e| read_failed(e.to_string()))?;
        let blob = repo
            .find_blob(entry.id())
            .map_err(|e| read_failed(e.to_string()))?;

        if blob.is_binary() {
            return Err(RepoError::NotUtf8(path.to_string()));
        }

        String::from_utf8(blob.content().to_vec()).map_err(|_| RepoError::NotUtf8(path.to_string()))
    }

    fn repository_name(&self) -> String {
        self.root
            .file_name()
            .map(|n| n.to_string_lossy().trim_end_matches(".git").to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "repository".to_string())
    }
}
