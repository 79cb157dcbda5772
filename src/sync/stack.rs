//! Orchestration of branch synchronization across a whole stack.

use super::{branch::sync_branch, CancelToken, SyncOpts, SyncState};
use crate::{
    ctx::SxContext,
    errors::{SxError, SxResult},
    git::{rebase, RebaseStatus, RepositoryExt},
};
use nu_ansi_term::Color::Blue;
use octocrab::Octocrab;
use std::collections::BTreeSet;

/// Options for a whole-stack sync.
#[derive(Debug, Clone, Default)]
pub struct StackSyncOpts {
    /// Rebase stack roots onto the latest trunk commit.
    pub to_trunk: bool,
    /// Skip fetching and pull-request refresh.
    pub no_fetch: bool,
    /// Skip pushing and pull-request updates.
    pub no_push: bool,
    /// Resume a suspended sync instead of starting a new one.
    pub cont: bool,
}

/// Outcome of a whole-stack sync.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum StackSyncOutcome {
    /// Every branch in the stack was processed.
    Completed { synced: usize },
    /// A rebase conflicted; state was persisted for `sync --continue`.
    Suspended,
    /// Cancelled between branches; no state was persisted.
    Cancelled,
}

/// Synchronizes the stack containing the currently checked-out branch.
///
/// Branches are processed parents-first, siblings in lexicographic order, so
/// a suspended run resumes deterministically. On conflict the per-branch
/// [Continuation](super::Continuation) and the remaining queue are persisted
/// before returning.
pub async fn sync_stack(
    ctx: &SxContext<'_>,
    client: Option<&Octocrab>,
    opts: &StackSyncOpts,
    cancel: &CancelToken,
) -> SxResult<StackSyncOutcome> {
    let repo_meta = ctx.store.read_repo()?;

    let mut synced = 0;
    let queue = if opts.cont {
        let state = ctx
            .store
            .read_sync_state()?
            .ok_or(SxError::NoSyncInProgress)?;

        // Resume the suspended branch in continue mode before draining the
        // queue.
        let res = sync_branch(
            ctx,
            client,
            &repo_meta,
            SyncOpts {
                branch: state.continuation.branch.clone(),
                no_fetch: opts.no_fetch,
                no_push: opts.no_push,
                to_trunk: opts.to_trunk,
                continuation: Some(state.continuation.clone()),
            },
        )
        .await?;
        if res.status == RebaseStatus::Conflict {
            // Still conflicted; the state on disk is already correct.
            return Ok(StackSyncOutcome::Suspended);
        }
        synced += 1;
        state.remaining
    } else {
        if ctx.store.read_sync_state()?.is_some() {
            return Err(SxError::SyncAlreadyInProgress);
        }
        collect_stack(ctx)?
    };
    for (i, name) in queue.iter().enumerate() {
        if cancel.is_cancelled() {
            eprintln!("Sync cancelled; run {} to pick up again.", Blue.paint("sx sync"));
            return Ok(StackSyncOutcome::Cancelled);
        }

        let res = sync_branch(
            ctx,
            client,
            &repo_meta,
            SyncOpts {
                branch: name.clone(),
                no_fetch: opts.no_fetch,
                no_push: opts.no_push,
                to_trunk: opts.to_trunk,
                continuation: None,
            },
        )
        .await?;

        if res.status == RebaseStatus::Conflict {
            // A conflict result always carries a continuation.
            if let Some(continuation) = res.continuation {
                ctx.store.write_sync_state(&SyncState {
                    remaining: queue[i + 1..].to_vec(),
                    continuation,
                })?;
            }
            return Ok(StackSyncOutcome::Suspended);
        }
        synced += 1;
    }

    ctx.store.clear_sync_state()?;
    Ok(StackSyncOutcome::Completed { synced })
}

/// Abandons a suspended sync: aborts any in-progress rebase (restoring the
/// branch tip) and discards the suspended-sync record. Branches synchronized
/// before the suspension keep their new bases.
pub fn abort_stack(ctx: &SxContext<'_>) -> SxResult<()> {
    let state = ctx
        .store
        .read_sync_state()?
        .ok_or(SxError::NoSyncInProgress)?;

    if rebase::rebase_in_progress(ctx.repository) {
        rebase::rebase_abort(ctx.repository)?;
        eprintln!(
            "  - aborted the rebase of {}; the branch is back at its pre-sync tip",
            Blue.paint(&state.continuation.branch)
        );
    }
    ctx.store.clear_sync_state()?;
    Ok(())
}

/// Collects the current stack in sync order: climb from the checked-out
/// branch to its stack root, then walk the root's subtree pre-order with
/// siblings in lexicographic order.
pub(crate) fn collect_stack(ctx: &SxContext<'_>) -> SxResult<Vec<String>> {
    let current = ctx.repository.current_branch_name()?;
    let mut meta = ctx.store.read_branch(&current)?;
    if !meta.is_tracked() {
        return Err(SxError::BranchNotTracked(current));
    }

    // Climb to the stack root.
    let mut seen = BTreeSet::from([meta.name.clone()]);
    while !meta.is_stack_root() {
        if meta.parent.name == meta.name {
            return Err(SxError::SelfParent(meta.name));
        }
        let parent = ctx.store.read_branch(&meta.parent.name)?;
        if !parent.is_tracked() {
            // The parent has no record; treat this branch as the root rather
            // than walking off the forest.
            break;
        }
        if !seen.insert(parent.name.clone()) {
            return Err(SxError::StackCycle(parent.name));
        }
        meta = parent;
    }

    // Pre-order walk of the subtree.
    let mut order = Vec::new();
    let mut visited = BTreeSet::new();
    visit(ctx, &meta.name, &mut order, &mut visited)?;
    Ok(order)
}

fn visit(
    ctx: &SxContext<'_>,
    name: &str,
    order: &mut Vec<String>,
    visited: &mut BTreeSet<String>,
) -> SxResult<()> {
    if !visited.insert(name.to_string()) {
        return Err(SxError::StackCycle(name.to_string()));
    }
    let meta = ctx.store.read_branch(name)?;
    if !meta.is_tracked() {
        tracing::warn!(branch = %name, "listed as a child but not tracked; skipping");
        return Ok(());
    }
    if meta.parent.name == meta.name {
        return Err(SxError::SelfParent(meta.name));
    }
    order.push(meta.name.clone());
    // BTreeSet iteration gives the lexicographic sibling order resume
    // depends on.
    for child in &meta.children {
        visit(ctx, child, order, visited)?;
    }
    Ok(())
}
