//! Change detection against git history
//!
//! The orchestrator only talks to [`RepoDiffSource`]; [`GitDiffSource`] is the
//! libgit2-backed implementation.

mod git_source;

pub use git_source::GitDiffSource;

use crate::error::RepoError;
use crate::types::FileChange;

/// Narrow view of a version-controlled working tree
///
/// Commit identifiers are opaque strings; anything the underlying VCS can
/// resolve to a commit (full or abbreviated SHA, branch, tag) is accepted.
pub trait RepoDiffSource: Send + Sync {
    /// Commit currently checked out (HEAD)
    ///
    /// Fails with [`RepoError::NotAGitRepository`] outside a working tree.
    fn current_commit(&self) -> Result<String, RepoError>;

    fn commit_exists(&self, id: &str) -> bool;

    /// Full commit id for a revision (SHA prefix, branch, `HEAD~1`)
    fn resolve_commit(&self, rev: &str) -> Result<String, RepoError>;

    /// Rename-aware changes between two commits
    ///
    /// Ordering of the returned entries is unspecified.
    fn diff(&self, from: &str, to: &str) -> Result<Vec<FileChange>, RepoError>;

    /// Cheap check whether the two commits differ in content at all
    fn has_changes(&self, from: &str, to: &str) -> Result<bool, RepoError>;

    /// UTF-8 content of `path` as of `commit`
    fn read_file(&self, commit: &str, path: &str) -> Result<String, RepoError>;

    /// Human-readable repository name, used in vector metadata
    fn repository_name(&self) -> String;
}
