//! Durable branch-topology metadata for the `sx` application.
//!
//! The tracked forest is represented flat: each branch record names its
//! parent and lists its children by name, and records are looked up by key.
//! No in-memory pointer cycles are needed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

mod store;
pub use store::MetaStore;

/// The parent link of a tracked branch.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ParentMeta {
    /// Name of the branch this one is stacked on (the trunk name for stack
    /// roots).
    pub name: String,
    /// Tip of the parent observed at the last successful sync, in hex form.
    ///
    /// Bounds the rebase `upstream` so commits the parent gained since are
    /// not treated as this branch's own.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub head: String,
    /// Whether the parent is a trunk branch.
    #[serde(default)]
    pub trunk: bool,
}

/// Pull-request handle for a tracked branch.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PullRequestMeta {
    /// Opaque GraphQL node id of the pull request; empty until first observed.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// The pull request number.
    pub number: u64,
}

/// One record per tracked branch.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BranchMeta {
    /// The branch name.
    pub name: String,
    /// Commit that integrated this branch into trunk (a squash-merge commit
    /// counts). Once set, the branch is never rewritten again.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub merge_commit: String,
    /// Names of the branches stacked directly on this one.
    ///
    /// Must agree with each child's `parent.name`. Kept as an ordered set so
    /// walks and serialization are deterministic.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub children: BTreeSet<String>,
    /// The parent link.
    #[serde(default)]
    pub parent: ParentMeta,
    /// The associated pull request, if one has been opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pull_request: Option<PullRequestMeta>,
}

impl BranchMeta {
    /// Whether this record refers to a tracked branch. [MetaStore::read_branch]
    /// returns a default record (empty name) for untracked branches.
    pub fn is_tracked(&self) -> bool {
        !self.name.is_empty()
    }

    /// Whether the branch is a stack root, i.e. parented directly on a trunk
    /// branch.
    pub fn is_stack_root(&self) -> bool {
        self.parent.trunk
    }

    /// Whether the branch has been integrated into trunk.
    pub fn is_merged(&self) -> bool {
        !self.merge_commit.is_empty()
    }
}

/// Pull-request behavior settings for the repository.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PullRequestSettings {
    /// Convert pull requests to draft while their base branch is rewritten.
    ///
    /// When unset, enabled iff the repository carries a CODEOWNERS file
    /// (draft conversion avoids re-requesting reviews for a base change).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rebase_with_draft: Option<bool>,
}

/// The repository-level record.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RepoMeta {
    /// The trunk branch name.
    pub trunk: String,
    /// Label of the remote that pull requests target.
    pub remote: String,
    /// Pull-request behavior settings.
    #[serde(default)]
    pub pull_request: PullRequestSettings,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn branch_meta_round_trips() {
        let meta = BranchMeta {
            name: "stack-2".to_string(),
            parent: ParentMeta {
                name: "stack-1".to_string(),
                head: "0123456789abcdef0123456789abcdef01234567".to_string(),
                trunk: false,
            },
            children: BTreeSet::from(["stack-3".to_string()]),
            pull_request: Some(PullRequestMeta {
                id: "PR_kwDOAbc123".to_string(),
                number: 42,
            }),
            merge_commit: String::new(),
        };

        let ser = toml::to_string_pretty(&meta).unwrap();
        let de: BranchMeta = toml::from_str(&ser).unwrap();
        assert_eq!(de, meta);
        // Empty fields do not survive into the serialized form.
        assert!(!ser.contains("merge-commit"));
    }

    #[test]
    fn untracked_record_is_default() {
        let meta = BranchMeta::default();
        assert!(!meta.is_tracked());
        assert!(!meta.is_merged());
        assert!(!meta.is_stack_root());
    }

    #[test]
    fn children_serialize_sorted() {
        let mut meta = BranchMeta {
            name: "root".to_string(),
            ..Default::default()
        };
        meta.children.insert("zeta".to_string());
        meta.children.insert("alpha".to_string());

        let ser = toml::to_string_pretty(&meta).unwrap();
        assert!(ser.find("alpha").unwrap() < ser.find("zeta").unwrap());
    }
}
