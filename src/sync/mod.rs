//! The stack synchronization engine.
//!
//! [branch] rewrites one branch onto its correct upstream; [stack] drives it
//! across a whole stack in dependency order, suspending on conflicts and
//! resuming from durable state; [reconcile] pushes rewritten branches and
//! retargets their pull requests.

use crate::{git::RebaseStatus, meta::BranchMeta};
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

mod body;
mod branch;
mod reconcile;
mod stack;


pub use branch::sync_branch;
pub use stack::{abort_stack, sync_stack, StackSyncOpts, StackSyncOutcome};

/// Options for synchronizing one branch.
#[derive(Debug, Clone, Default)]
pub struct SyncOpts {
    /// The branch to synchronize.
    pub branch: String,
    /// Skip fetching from the remote and refreshing pull-request state.
    pub no_fetch: bool,
    /// Skip pushing and updating the pull request.
    pub no_push: bool,
    /// Rebase the branch onto the latest trunk commit if it is a stack root.
    /// Ignored for non-roots.
    pub to_trunk: bool,
    /// Resume state from a previously suspended sync of this branch.
    pub continuation: Option<Continuation>,
}

/// Result of synchronizing one branch.
#[derive(Debug)]
pub struct SyncResult {
    /// Backend status of the rebase this sync performed (or skipped).
    pub status: RebaseStatus,
    /// Set iff `status` is [RebaseStatus::Conflict]: everything needed to
    /// resume once the user has resolved.
    pub continuation: Option<Continuation>,
    /// The branch record as updated by this sync.
    pub branch: BranchMeta,
}

/// Durable snapshot of a suspended per-branch sync.
///
/// The engine is a pure function of the repository, the metadata, and (when
/// resuming) this record; no in-process state survives across invocations.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Continuation {
    /// The branch whose rebase is suspended.
    pub branch: String,
    /// Branch tip before the rebase started.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub old_head: String,
    /// The commit the branch was being rebased onto.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parent_commit: String,
    /// Non-empty iff this rebase reparents the branch after its parent was
    /// merged: the trunk the branch must be re-attached to on completion.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub new_trunk: String,
}

/// Durable state of a suspended stack sync: the per-branch continuation plus
/// the branches that had not yet been processed.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SyncState {
    /// Branches still queued when the run suspended, in sync order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remaining: Vec<String>,
    /// Suspended per-branch state.
    pub continuation: Continuation,
}

/// Cooperative cancellation flag threaded through long-running operations.
///
/// Cancellation is observed between branches: the current rebase is left as
/// the backend placed it, and no continuation is recorded.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
