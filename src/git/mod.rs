//! Utilities for interacting with `git` repositories for the `sx` application.
//!
//! Read-side queries (revision resolution, merge bases, ancestry) go through
//! `git2`; history rewriting and remote transfer go through the `git` binary
//! (see [run]).

use crate::errors::SxResult;
use git2::{BranchType, ErrorCode, Oid, Repository};
use std::env;

pub(crate) mod rebase;
pub(crate) mod remote;
mod run;

pub(crate) use rebase::{RebaseOpts, RebaseStatus};

/// Returns the repository for the current working directory, and [None] if
/// the current working directory is not within a git repository or an error
/// occurs.
pub fn active_repository() -> Option<Repository> {
    Repository::discover(env::current_dir().ok()?).ok()
}

/// Shortens a commit id for display.
pub(crate) fn short_sha(oid: &str) -> &str {
    &oid[..oid.len().min(8)]
}

/// Extension trait for the [Repository] type exposing the read-side queries
/// the sync engine needs.
pub trait RepositoryExt {
    /// Returns the name of the currently checked-out branch.
    fn current_branch_name(&self) -> SxResult<String>;

    /// Resolves a revision to a commit id.
    ///
    /// ## Takes
    /// - `rev` - Any revision `git rev-parse` would accept.
    ///
    /// ## Returns
    /// - `Result<String>` - The full hex commit id, or an error if the
    ///   revision does not exist.
    fn resolve(&self, rev: &str) -> SxResult<String>;

    /// Computes the merge base of two revisions.
    ///
    /// ## Returns
    /// - `Ok(Some(id))` - The merge base commit id.
    /// - `Ok(None)` - The revisions share no history.
    fn merge_base_of(&self, a: &str, b: &str) -> SxResult<Option<String>>;

    /// Whether `ancestor` is reachable from `descendant` (a commit is its own
    /// ancestor).
    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> SxResult<bool>;

    /// Commit id of the configured upstream of `branch`, if one is set.
    fn upstream_of(&self, branch: &str) -> Option<String>;

    /// Whether the repository carries a code-ownership policy file in one of
    /// the standard locations.
    fn has_codeowners(&self) -> bool;
}

impl RepositoryExt for Repository {
    fn current_branch_name(&self) -> SxResult<String> {
        let head = self.head()?;
        Ok(head
            .shorthand()
            .ok_or_else(|| git2::Error::from_str("HEAD ref does not have a name"))?
            .to_string())
    }

    fn resolve(&self, rev: &str) -> SxResult<String> {
        let object = self.revparse_single(rev)?;
        let commit = object.peel_to_commit()?;
        Ok(commit.id().to_string())
    }

    fn merge_base_of(&self, a: &str, b: &str) -> SxResult<Option<String>> {
        let a = self.revparse_single(a)?.peel_to_commit()?.id();
        let b = self.revparse_single(b)?.peel_to_commit()?.id();
        match self.merge_base(a, b) {
            Ok(base) => Ok(Some(base.to_string())),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> SxResult<bool> {
        let ancestor = Oid::from_str(&self.resolve(ancestor)?)?;
        let descendant = Oid::from_str(&self.resolve(descendant)?)?;
        if ancestor == descendant {
            return Ok(true);
        }
        Ok(self.graph_descendant_of(descendant, ancestor)?)
    }

    fn upstream_of(&self, branch: &str) -> Option<String> {
        let local = self.find_branch(branch, BranchType::Local).ok()?;
        let upstream = local.upstream().ok()?;
        Some(upstream.get().target()?.to_string())
    }

    fn has_codeowners(&self) -> bool {
        let Some(workdir) = self.workdir() else {
            return false;
        };
        ["CODEOWNERS", ".github/CODEOWNERS", "docs/CODEOWNERS"]
            .iter()
            .any(|p| workdir.join(p).is_file())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use git2::{RepositoryInitOptions, Signature};
    use std::path::Path;
    use tempfile::TempDir;

    fn repo_with_commits() -> (TempDir, Repository) {
        let tmp = TempDir::new().unwrap();
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(tmp.path(), &opts).unwrap();
        {
            let mut config = repo.config().unwrap();
            config.set_str("user.name", "Test").unwrap();
            config.set_str("user.email", "test@example.com").unwrap();
        }
        (tmp, repo)
    }

    fn commit(repo: &Repository, name: &str, message: &str) -> git2::Oid {
        std::fs::write(repo.workdir().unwrap().join(name), message).unwrap();
        let mut index = repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();
        let parent = repo.head().ok().map(|h| h.peel_to_commit().unwrap());
        let parents: Vec<_> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    #[test]
    fn resolves_branches_and_detects_ancestry() {
        let (_tmp, repo) = repo_with_commits();
        let first = commit(&repo, "a", "first");
        let second = commit(&repo, "b", "second");

        assert_eq!(repo.resolve("main").unwrap(), second.to_string());
        assert_eq!(repo.current_branch_name().unwrap(), "main");
        assert!(repo.is_ancestor(&first.to_string(), "main").unwrap());
        assert!(repo.is_ancestor("main", "main").unwrap());
        assert!(!repo
            .is_ancestor("main", &first.to_string())
            .unwrap());
        assert!(repo.resolve("does-not-exist").is_err());
    }

    #[test]
    fn merge_base_of_diverged_branches() {
        let (_tmp, repo) = repo_with_commits();
        let base = commit(&repo, "a", "base");
        repo.branch("side", &repo.head().unwrap().peel_to_commit().unwrap(), false)
            .unwrap();
        commit(&repo, "b", "on main");
        repo.set_head("refs/heads/side").unwrap();
        repo.checkout_head(Some(git2::build::CheckoutBuilder::new().force()))
            .unwrap();
        commit(&repo, "c", "on side");

        let found = repo.merge_base_of("main", "side").unwrap();
        assert_eq!(found.as_deref(), Some(base.to_string().as_str()));
    }

    #[test]
    fn codeowners_is_detected() {
        let (_tmp, repo) = repo_with_commits();
        assert!(!repo.has_codeowners());
        let dir = repo.workdir().unwrap().join(".github");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("CODEOWNERS"), "* @owners\n").unwrap();
        assert!(repo.has_codeowners());
    }

    #[test]
    fn short_sha_truncates() {
        assert_eq!(short_sha("0123456789abcdef0123456789abcdef01234567"), "01234567");
        assert_eq!(short_sha("012"), "012");
    }
}
