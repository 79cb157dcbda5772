//! The on-disk store for `sx` metadata.
//!
//! Everything lives in a directory under the repository's git dir: one TOML
//! document per tracked branch, one repository-level document, and (while a
//! sync is suspended) one suspended-sync document. Every write lands in a
//! temporary file first and is renamed into place, so concurrent readers
//! never observe a torn record.

use super::{BranchMeta, ParentMeta, RepoMeta};
use crate::{
    constants::{BRANCHES_DIR, REPO_FILE, SX_DIR, SYNC_FILE},
    errors::{SxError, SxResult},
    git::RepositoryExt,
    sync::SyncState,
};
use git2::Repository;
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

/// Handle on the metadata directory of one repository.
#[derive(Debug, Clone)]
pub struct MetaStore {
    root: PathBuf,
}

impl MetaStore {
    /// Opens the store for a repository.
    ///
    /// ## Returns
    /// - `Ok(Some(store))` - The repository is set up with `sx`.
    /// - `Ok(None)` - No repository record exists.
    pub fn open(repository: &Repository) -> SxResult<Option<Self>> {
        let store = Self {
            root: repository.path().join(SX_DIR),
        };
        if !store.root.join(REPO_FILE).exists() {
            return Ok(None);
        }
        Ok(Some(store))
    }

    /// Creates the store for a repository, persisting the repository record.
    /// Used by repository setup and by tests; opening an existing store goes
    /// through [MetaStore::open].
    pub fn create(repository: &Repository, repo_meta: &RepoMeta) -> SxResult<Self> {
        let store = Self {
            root: repository.path().join(SX_DIR),
        };
        store.write_repo(repo_meta)?;
        Ok(store)
    }

    /// Reads the repository-level record.
    pub fn read_repo(&self) -> SxResult<RepoMeta> {
        self.read_document(&self.root.join(REPO_FILE))?
            .ok_or(SxError::RepositoryNotInitialized)
    }

    /// Persists the repository-level record.
    pub fn write_repo(&self, repo_meta: &RepoMeta) -> SxResult<()> {
        self.write_document(&self.root.join(REPO_FILE), repo_meta)
    }

    /// Reads the record for a branch.
    ///
    /// Untracked branches yield a default record rather than an error; the
    /// engine distinguishes by checking [BranchMeta::is_tracked]. This is
    /// load-bearing for trunk parents, which have no record of their own.
    pub fn read_branch(&self, name: &str) -> SxResult<BranchMeta> {
        Ok(self
            .read_document(&self.branch_path(name))?
            .unwrap_or_default())
    }

    /// Persists a branch record.
    pub fn write_branch(&self, meta: &BranchMeta) -> SxResult<()> {
        self.write_document(&self.branch_path(&meta.name), meta)
    }

    /// Constructs a parent link from a live branch tip plus a trunk flag.
    /// Used when reparenting a branch onto trunk.
    pub fn branch_state(
        &self,
        repository: &Repository,
        name: &str,
        trunk: bool,
    ) -> SxResult<ParentMeta> {
        Ok(ParentMeta {
            name: name.to_string(),
            head: repository.resolve(name)?,
            trunk,
        })
    }

    /// Names of all tracked branches, sorted.
    pub fn all_branches(&self) -> SxResult<Vec<String>> {
        let mut names = Vec::new();
        let dir = self.root.join(BRANCHES_DIR);
        if dir.exists() {
            collect_branch_names(&dir, &dir, &mut names)?;
        }
        names.sort();
        Ok(names)
    }

    /// Reads the suspended-sync record, if a sync is suspended.
    pub fn read_sync_state(&self) -> SxResult<Option<SyncState>> {
        self.read_document(&self.root.join(SYNC_FILE))
    }

    /// Persists the suspended-sync record.
    pub fn write_sync_state(&self, state: &SyncState) -> SxResult<()> {
        self.write_document(&self.root.join(SYNC_FILE), state)
    }

    /// Discards the suspended-sync record.
    pub fn clear_sync_state(&self) -> SxResult<()> {
        let path = self.root.join(SYNC_FILE);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Path of a branch record. Branch names may contain `/`; the layout
    /// mirrors the ref namespace under the branches directory.
    fn branch_path(&self, name: &str) -> PathBuf {
        self.root.join(BRANCHES_DIR).join(format!("{name}.toml"))
    }

    fn read_document<T: DeserializeOwned>(&self, path: &Path) -> SxResult<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)?;
        let doc = toml::from_str(&raw).map_err(|source| SxError::MetadataCorrupt {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(doc))
    }

    fn write_document<T: Serialize>(&self, path: &Path, doc: &T) -> SxResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, toml::to_string_pretty(doc)?)?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

fn collect_branch_names(root: &Path, dir: &Path, names: &mut Vec<String>) -> SxResult<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_branch_names(root, &path, names)?;
        } else if path.extension().is_some_and(|e| e == "toml") {
            let rel = path
                .strip_prefix(root)
                .expect("entry is under the branches directory")
                .with_extension("");
            names.push(rel.to_string_lossy().replace('\\', "/"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::meta::PullRequestMeta;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, MetaStore) {
        let tmp = TempDir::new().unwrap();
        let repository = git2::Repository::init(tmp.path()).unwrap();
        let store = MetaStore::create(
            &repository,
            &RepoMeta {
                trunk: "main".to_string(),
                remote: "origin".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        (tmp, store)
    }

    #[test]
    fn open_returns_none_without_repo_record() {
        let tmp = TempDir::new().unwrap();
        let repository = git2::Repository::init(tmp.path()).unwrap();
        assert!(MetaStore::open(&repository).unwrap().is_none());
    }

    #[test]
    fn read_untracked_branch_returns_default() {
        let (_tmp, store) = test_store();
        let meta = store.read_branch("main").unwrap();
        assert!(!meta.is_tracked());
    }

    #[test]
    fn branch_record_round_trips() {
        let (_tmp, store) = test_store();
        let meta = BranchMeta {
            name: "feat/stack-1".to_string(),
            parent: ParentMeta {
                name: "main".to_string(),
                head: "0123456789abcdef0123456789abcdef01234567".to_string(),
                trunk: true,
            },
            children: BTreeSet::from(["feat/stack-2".to_string()]),
            pull_request: Some(PullRequestMeta {
                id: String::new(),
                number: 7,
            }),
            merge_commit: String::new(),
        };
        store.write_branch(&meta).unwrap();
        assert_eq!(store.read_branch("feat/stack-1").unwrap(), meta);
        // Names with `/` land in subdirectories and are listed back intact.
        assert_eq!(store.all_branches().unwrap(), vec!["feat/stack-1"]);
    }

    #[test]
    fn write_is_byte_stable() {
        let (_tmp, store) = test_store();
        let meta = BranchMeta {
            name: "stack-1".to_string(),
            parent: ParentMeta {
                name: "main".to_string(),
                head: "0123456789abcdef0123456789abcdef01234567".to_string(),
                trunk: true,
            },
            ..Default::default()
        };
        store.write_branch(&meta).unwrap();
        let path = store.branch_path("stack-1");
        let first = std::fs::read_to_string(&path).unwrap();

        let reread = store.read_branch("stack-1").unwrap();
        store.write_branch(&reread).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), first);
    }

    #[test]
    fn sync_state_round_trips_and_clears() {
        let (_tmp, store) = test_store();
        assert!(store.read_sync_state().unwrap().is_none());

        let state = SyncState {
            continuation: crate::sync::Continuation {
                branch: "stack-2".to_string(),
                old_head: "aaaa".to_string(),
                parent_commit: "bbbb".to_string(),
                new_trunk: String::new(),
            },
            remaining: vec!["stack-3".to_string()],
        };
        store.write_sync_state(&state).unwrap();
        assert_eq!(store.read_sync_state().unwrap(), Some(state));

        store.clear_sync_state().unwrap();
        assert!(store.read_sync_state().unwrap().is_none());
        // Clearing twice is a no-op.
        store.clear_sync_state().unwrap();
    }

    #[test]
    fn corrupt_record_is_an_error() {
        let (_tmp, store) = test_store();
        let path = store.branch_path("broken");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "name = [not toml").unwrap();
        assert!(matches!(
            store.read_branch("broken"),
            Err(SxError::MetadataCorrupt { .. })
        ));
    }
}
