//! Synchronization of a single branch onto its correct upstream.

use super::{reconcile, Continuation, SyncOpts, SyncResult};
use crate::{
    ctx::SxContext,
    errors::{SxError, SxResult},
    git::{self, rebase, RebaseOpts, RebaseStatus, RepositoryExt},
    meta::{BranchMeta, RepoMeta},
};
use nu_ansi_term::Color::{Blue, Yellow};
use octocrab::Octocrab;

/// Synchronizes one branch with its parent.
///
/// Decides which of three rebase scenarios applies (trunk-advance,
/// parent-merged, parent-moved), drives the repository, and either returns a
/// success result or a [Continuation] describing how to resume after the user
/// resolves conflicts. On success (and unless `no_push` is set) the branch is
/// pushed and its pull request retargeted.
pub async fn sync_branch(
    ctx: &SxContext<'_>,
    client: Option<&Octocrab>,
    repo_meta: &RepoMeta,
    opts: SyncOpts,
) -> SxResult<SyncResult> {
    let mut branch = ctx.store.read_branch(&opts.branch)?;
    if !branch.is_tracked() {
        return Err(SxError::BranchNotTracked(opts.branch.clone()));
    }
    eprintln!("Synchronizing branch `{}`...", Blue.paint(&branch.name));

    let mut pull = None;
    let res = if let Some(continuation) = opts.continuation.clone() {
        resume(ctx, continuation, branch)?
    } else {
        if !opts.no_fetch {
            if let Some(client) = client {
                // Read-only refresh: degrade gracefully so a flaky network
                // never blocks a local restack.
                match reconcile::refresh_pull_request(ctx, client, branch.clone()).await {
                    Ok(refresh) => {
                        branch = refresh.branch;
                        pull = refresh.pull;
                    }
                    Err(err) => {
                        tracing::warn!(branch = %branch.name, error = %err, "failed to refresh pull-request state");
                        eprintln!(
                            "  - {} could not refresh pull-request state; continuing with last-known metadata",
                            Yellow.paint("WARNING:")
                        );
                    }
                }
            }
        }

        if branch.is_merged() {
            // Merged branches are frozen; children reparent on their own sync.
            eprintln!(
                "  - skipping sync for merged branch (merged in commit {})",
                Blue.paint(git::short_sha(&branch.merge_commit))
            );
            return Ok(SyncResult {
                status: RebaseStatus::AlreadyUpToDate,
                continuation: None,
                branch,
            });
        }

        rebase_onto_parent(ctx, repo_meta, &opts, branch)?
    };

    if res.status == RebaseStatus::Conflict {
        return Ok(res);
    }

    if !opts.no_push {
        if let Some(client) = client {
            reconcile::push_and_update_pull_request(ctx, client, repo_meta, &res.branch, pull)
                .await
                .map_err(SxError::during(&res.branch.name, "pushing and updating the pull request"))?;
        }
    }

    Ok(res)
}

/// The rebase half of [sync_branch]: scenario selection and execution.
fn rebase_onto_parent(
    ctx: &SxContext<'_>,
    repo_meta: &RepoMeta,
    opts: &SyncOpts,
    mut branch: BranchMeta,
) -> SxResult<SyncResult> {
    let branch_head = ctx
        .repository
        .resolve(&branch.name)
        .map_err(SxError::during(&branch.name, "resolving the branch tip"))?;

    if branch.is_stack_root() {
        let trunk = branch.parent.name.clone();
        if !opts.to_trunk {
            eprintln!(
                "  - branch is a stack root, nothing to do (run {} to sync against the latest commit in {})",
                Blue.paint("sx sync --trunk"),
                Blue.paint(&trunk)
            );
            return Ok(SyncResult {
                status: RebaseStatus::AlreadyUpToDate,
                continuation: None,
                branch,
            });
        }

        if !opts.no_fetch {
            eprintln!(
                "  - fetching latest commit from {}",
                Blue.paint(format!("{}/{}", repo_meta.remote, trunk))
            );
            git::remote::fetch(ctx.repository, &repo_meta.remote, &trunk)
                .map_err(SxError::during(&branch.name, "fetching the trunk branch"))?;
        }

        let trunk_head = ctx
            .repository
            .resolve(&trunk)
            .map_err(SxError::during(&branch.name, "resolving the trunk tip"))?;
        let status = rebase::rebase(
            ctx.repository,
            &RebaseOpts {
                branch: branch.name.clone(),
                upstream: trunk_head.clone(),
                onto: None,
            },
        )?;
        msg_rebase_result(&status);

        if status == RebaseStatus::Conflict {
            return Ok(SyncResult {
                status,
                continuation: Some(Continuation {
                    branch: branch.name.clone(),
                    old_head: branch_head,
                    parent_commit: trunk_head,
                    new_trunk: String::new(),
                }),
                branch,
            });
        }
        record_parent_head(ctx, &mut branch, &trunk_head)?;
        return Ok(SyncResult {
            status,
            continuation: None,
            branch,
        });
    }

    // Three possibilities from here:
    //   1. The parent has been merged into trunk: rebase on top of the commit
    //      that actually landed, then reparent onto trunk.
    //   2. The branch is up-to-date: merge-base(branch, parent) = head(parent).
    //   3. The parent moved (gained commits, or was itself rebased).
    let parent = ctx.store.read_branch(&branch.parent.name)?;

    if parent.is_merged() {
        return rebase_onto_merge_commit(ctx, repo_meta, opts, branch, branch_head, parent);
    }

    let parent_head = ctx
        .repository
        .resolve(&branch.parent.name)
        .map_err(SxError::during(&branch.name, "resolving the parent tip"))?;
    let merge_base = ctx
        .repository
        .merge_base_of(&parent_head, &branch_head)
        .map_err(SxError::during(&branch.name, "computing the merge base"))?;
    if merge_base.as_deref() == Some(parent_head.as_str()) {
        eprintln!(
            "  - already up-to-date with parent {}",
            Blue.paint(&branch.parent.name)
        );
        return Ok(SyncResult {
            status: RebaseStatus::AlreadyUpToDate,
            continuation: None,
            branch,
        });
    }

    eprintln!(
        "  - syncing branch {} on latest commit {} of parent {}",
        Blue.paint(&branch.name),
        Blue.paint(git::short_sha(&parent_head)),
        Blue.paint(&branch.parent.name)
    );
    // The replayed range must be bounded by the parent tip we observed at the
    // last sync, not by the live parent. With
    //     A---B---C  parent
    //          \
    //           T  (parent tip at last sync, base of this branch)
    //            \
    //             W  commits added here since
    // a plain `rebase parent branch` can see T---W as the range when T is
    // still reachable elsewhere in the stack and replay T twice. Bounding at
    // the stored snapshot selects exactly the commits made on this branch.
    let upstream = if branch.parent.head.is_empty() {
        // No snapshot recorded (branch adopted externally): fall back to the
        // merge base, which bounds the range at the divergence point.
        merge_base.unwrap_or_else(|| parent_head.clone())
    } else {
        branch.parent.head.clone()
    };
    let status = rebase::rebase(
        ctx.repository,
        &RebaseOpts {
            branch: branch.name.clone(),
            upstream,
            onto: Some(parent_head.clone()),
        },
    )?;
    msg_rebase_result(&status);

    match status {
        RebaseStatus::Conflict => Ok(SyncResult {
            status,
            continuation: Some(Continuation {
                branch: branch.name.clone(),
                old_head: branch_head,
                parent_commit: parent_head,
                new_trunk: String::new(),
            }),
            branch,
        }),
        RebaseStatus::Updated => {
            record_parent_head(ctx, &mut branch, &parent_head)?;
            Ok(SyncResult {
                status,
                continuation: None,
                branch,
            })
        }
        _ => {
            // The merge-base check should have filtered these out.
            tracing::warn!(branch = %branch.name, ?status, "unexpected rebase status");
            record_parent_head(ctx, &mut branch, &parent_head)?;
            Ok(SyncResult {
                status,
                continuation: None,
                branch,
            })
        }
    }
}

/// The parent-merged scenario: the parent's changes landed in trunk as
/// `merge_commit` (possibly a squash). Rewrite the branch onto that commit
/// and re-attach it to the trunk the parent targeted.
fn rebase_onto_merge_commit(
    ctx: &SxContext<'_>,
    repo_meta: &RepoMeta,
    opts: &SyncOpts,
    branch: BranchMeta,
    branch_head: String,
    parent: BranchMeta,
) -> SxResult<SyncResult> {
    let merge_commit = parent.merge_commit.clone();
    let short = git::short_sha(&merge_commit);
    match &parent.pull_request {
        Some(pr) => eprintln!(
            "  - parent {} (pull {}) was merged",
            Blue.paint(&parent.name),
            Blue.paint(format!("#{}", pr.number))
        ),
        None => eprintln!("  - parent {} was merged", Blue.paint(&parent.name)),
    }
    eprintln!(
        "  - rebasing {} on top of merge commit {}",
        Blue.paint(&branch.name),
        Blue.paint(short)
    );

    if !opts.no_fetch {
        git::remote::fetch(ctx.repository, &repo_meta.remote, &merge_commit)
            .map_err(SxError::during(&branch.name, "fetching the merge commit"))?;
    }

    // `upstream` is the parent branch *name* (its current local tip) so the
    // replayed range is exactly the commits unique to this branch; using the
    // merge commit as upstream would re-apply changes a squash-merge already
    // flattened. `onto` is the merge commit itself, not the trunk tip: only
    // trunk history that existed at merge time enters this branch. With
    //     A---B---M---C---D  main
    //      \     /
    //       Q---R  stacked-1
    //            \
    //             X---Y  stacked-2
    // (M merged stacked-1, squash or not), the result is
    //     A---B---M---C---D  main
    //              \
    //               X'--Y'  stacked-2
    // and `sx sync --trunk` lifts the branch past C and D when asked.
    let status = rebase::rebase(
        ctx.repository,
        &RebaseOpts {
            branch: branch.name.clone(),
            upstream: parent.name.clone(),
            onto: Some(merge_commit.clone()),
        },
    )?;
    msg_rebase_result(&status);

    if status == RebaseStatus::Conflict {
        return Ok(SyncResult {
            status,
            continuation: Some(Continuation {
                branch: branch.name.clone(),
                old_head: branch_head,
                parent_commit: merge_commit,
                new_trunk: parent.parent.name.clone(),
            }),
            branch,
        });
    }

    let branch = reparent(ctx, branch, &parent.parent.name)?;
    Ok(SyncResult {
        status,
        continuation: None,
        branch,
    })
}

/// Resumes a suspended sync after the user has resolved conflicts.
fn resume(
    ctx: &SxContext<'_>,
    continuation: Continuation,
    mut branch: BranchMeta,
) -> SxResult<SyncResult> {
    let status = rebase::rebase_continue(ctx.repository)?;
    match status {
        RebaseStatus::NotInProgress => {
            // The rebase ended outside the tool. An unchanged tip means it
            // was aborted, not completed; completing the sync would record
            // metadata the repository does not reflect.
            let head_now = ctx
                .repository
                .resolve(&branch.name)
                .map_err(SxError::during(&branch.name, "resolving the branch tip"))?;
            if head_now == continuation.old_head {
                return Err(SxError::RebaseAbortedExternally(branch.name.clone()));
            }
            eprintln!(
                "  - {} expected a rebase to be in progress (assuming it was completed with git rebase --continue)",
                Yellow.paint("WARNING:")
            );
            eprintln!(
                "      - use {} instead of git rebase --continue to avoid this warning",
                Blue.paint("sx sync --continue")
            );
        }
        RebaseStatus::Conflict => {
            msg_rebase_result(&status);
            return Ok(SyncResult {
                status,
                continuation: Some(continuation),
                branch,
            });
        }
        _ => msg_rebase_result(&status),
    }

    if continuation.new_trunk.is_empty() {
        // Record the observed parent tip exactly as the single-shot path
        // would have, so resumed and uninterrupted syncs are indistinguishable.
        if !continuation.parent_commit.is_empty() {
            record_parent_head(ctx, &mut branch, &continuation.parent_commit)?;
        }
    } else {
        branch = reparent(ctx, branch, &continuation.new_trunk)?;
    }

    Ok(SyncResult {
        status,
        continuation: None,
        branch,
    })
}

/// Re-attaches a branch whose parent was merged: the branch becomes a stack
/// root based on `new_trunk`, and the old parent forgets it. Both writes are
/// idempotent under replay, so a crash between them heals on the next run.
fn reparent(ctx: &SxContext<'_>, mut branch: BranchMeta, new_trunk: &str) -> SxResult<BranchMeta> {
    let old_parent = ctx.store.read_branch(&branch.parent.name)?;

    branch.parent = ctx.store.branch_state(ctx.repository, new_trunk, true)?;
    eprintln!(
        "  - this branch is now a stack root based on trunk branch {}",
        Blue.paint(&branch.parent.name)
    );
    ctx.store.write_branch(&branch)?;

    if old_parent.is_tracked() && old_parent.children.contains(&branch.name) {
        let mut old_parent = old_parent;
        old_parent.children.remove(&branch.name);
        ctx.store.write_branch(&old_parent)?;
    }

    Ok(branch)
}

/// Persists the observed parent tip after a non-conflict rebase. Skips the
/// write when nothing changed, so repeated syncs leave the record byte-equal.
fn record_parent_head(ctx: &SxContext<'_>, branch: &mut BranchMeta, head: &str) -> SxResult<()> {
    if branch.parent.head != head {
        branch.parent.head = head.to_string();
        ctx.store.write_branch(branch)?;
    }
    Ok(())
}

fn msg_rebase_result(status: &RebaseStatus) {
    match status {
        RebaseStatus::AlreadyUpToDate => eprintln!("  - already up-to-date"),
        RebaseStatus::Updated => eprintln!("  - branch synchronized"),
        RebaseStatus::Conflict => {
            eprintln!(
                "  - {} this branch has conflicts with its parent",
                Yellow.paint("WARNING:")
            );
            eprintln!(
                "      - resolve the conflicts and run {} to continue",
                Blue.paint("sx sync --continue")
            );
        }
        RebaseStatus::NotInProgress => {}
    }
}
