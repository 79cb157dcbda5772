//! Pull-request reconciliation.
//!
//! After a successful per-branch rebase, the rewritten branch is pushed and
//! its pull request retargeted so the PR base always matches the branch's
//! parent in the stack. Before a sync, the PR's remote state is refreshed so
//! a merge performed on the remote freezes the branch locally.

use super::body::{self, StackMetadata};
use crate::{
    ctx::SxContext,
    errors::SxResult,
    git::{
        remote::{push, ForcePolicy, PushOpts},
        RepositoryExt,
    },
    meta::{BranchMeta, PullRequestMeta, RepoMeta},
};
use nu_ansi_term::Color::{Blue, Yellow};
use octocrab::{models::pulls::PullRequest, models::IssueState, Octocrab};

/// Result of refreshing a branch's pull-request state from the remote.
pub(crate) struct PullRefresh {
    /// The branch record, possibly updated.
    pub branch: BranchMeta,
    /// The fetched pull request, for reuse by the post-sync update.
    pub pull: Option<PullRequest>,
}

/// Refreshes a branch's pull-request state: records the PR's node id the
/// first time it is observed, and freezes the branch at its merge commit when
/// the remote reports the PR merged.
pub(crate) async fn refresh_pull_request(
    ctx: &SxContext<'_>,
    client: &Octocrab,
    mut branch: BranchMeta,
) -> SxResult<PullRefresh> {
    let Some(pr_meta) = branch.pull_request.clone() else {
        eprintln!("  - this branch does not have an open pull request");
        return Ok(PullRefresh { branch, pull: None });
    };

    let (owner, repo) = ctx.owner_and_repository()?;
    let pull = client.pulls(owner, repo).get(pr_meta.number).await?;

    let mut changed = false;
    if let Some(node_id) = &pull.node_id {
        if pr_meta.id != *node_id {
            branch.pull_request = Some(PullRequestMeta {
                id: node_id.clone(),
                number: pr_meta.number,
            });
            changed = true;
        }
    }
    if branch.merge_commit.is_empty() && pull.merged_at.is_some() {
        if let Some(sha) = &pull.merge_commit_sha {
            eprintln!(
                "  - pull request {} was merged in {}",
                Blue.paint(format!("#{}", pr_meta.number)),
                Blue.paint(crate::git::short_sha(sha))
            );
            branch.merge_commit = sha.clone();
            changed = true;
        }
    }
    if changed {
        ctx.store.write_branch(&branch)?;
    }

    Ok(PullRefresh {
        branch,
        pull: Some(pull),
    })
}

/// Pushes a rewritten branch and updates its pull request's base ref and
/// stack-metadata body block. Skips gracefully when the PR is closed or
/// merged.
pub(crate) async fn push_and_update_pull_request(
    ctx: &SxContext<'_>,
    client: &Octocrab,
    repo_meta: &RepoMeta,
    branch: &BranchMeta,
    pull: Option<PullRequest>,
) -> SxResult<()> {
    let Some(pr_meta) = &branch.pull_request else {
        return Ok(());
    };

    let (owner, repo) = ctx.owner_and_repository()?;
    let pulls = client.pulls(owner, repo);
    let pull = match pull {
        Some(pull) => pull,
        None => pulls.get(pr_meta.number).await?,
    };

    let merged = pull.merged_at.is_some();
    let closed = matches!(pull.state, Some(IssueState::Closed));
    if merged || closed {
        eprintln!(
            "  - {} pull request {} is {}, skipping push",
            Yellow.paint("WARNING:"),
            Blue.paint(format!("#{}", pr_meta.number)),
            if merged { "merged" } else { "closed" },
        );
        eprintln!("      - re-open the pull request (or create a new one) to push changes");
        return Ok(());
    }

    // A base change can re-request reviews; converting to draft for the
    // duration avoids that. Honor the explicit setting, otherwise enable the
    // dance only when the repository enforces code ownership.
    let mut rebase_with_draft = false;
    let base_ref = pull.base.ref_field.clone();
    if base_ref != branch.parent.name {
        eprintln!(
            "  - updating pull request base branch to {}",
            Blue.paint(&branch.parent.name)
        );
        rebase_with_draft = match repo_meta.pull_request.rebase_with_draft {
            Some(explicit) => explicit,
            None => {
                let has_codeowners = ctx.repository.has_codeowners();
                if has_codeowners {
                    eprintln!(
                        "  - converting pull request to draft for rebase since this repo has CODEOWNERS"
                    );
                    eprintln!(
                        "      - set {} in the repository record to control this behavior explicitly",
                        Blue.paint("pull-request.rebase-with-draft")
                    );
                }
                has_codeowners
            }
        };
    }

    if rebase_with_draft {
        convert_to_draft(client, &pr_meta.id).await?;
    }

    push(
        ctx.repository,
        &PushOpts {
            remote: repo_meta.remote.clone(),
            branch: branch.name.clone(),
            force: ForcePolicy::ForceWithLease,
            skip_if_upstream_not_set: true,
            skip_if_upstream_matches: true,
        },
    )?;

    let metadata = StackMetadata {
        parent: branch.parent.name.clone(),
        parent_head: branch.parent.head.clone(),
        trunk: repo_meta.trunk.clone(),
    };
    let current_body = pull.body.as_deref().unwrap_or("");
    if base_ref == branch.parent.name
        && body::read_stack_metadata(current_body).as_ref() == Some(&metadata)
    {
        // Base and embedded stack position already match; skip the API write.
        tracing::debug!(branch = %branch.name, "pull request already up to date");
        return Ok(());
    }
    let new_body = body::with_stack_metadata(current_body, &metadata);
    pulls
        .update(pr_meta.number)
        .base(branch.parent.name.clone())
        .body(new_body)
        .send()
        .await?;

    if rebase_with_draft {
        mark_ready_for_review(client, &pr_meta.id).await?;
    }

    Ok(())
}

/// Converts a pull request to draft. REST has no endpoint for this; both
/// draft mutations exist only in the GraphQL API.
async fn convert_to_draft(client: &Octocrab, node_id: &str) -> SxResult<()> {
    if node_id.is_empty() {
        tracing::warn!("pull request node id unknown; skipping draft conversion");
        return Ok(());
    }
    let _: serde_json::Value = client
        .graphql(&serde_json::json!({
            "query": "mutation($id: ID!) { convertPullRequestToDraft(input: {pullRequestId: $id}) { clientMutationId } }",
            "variables": { "id": node_id },
        }))
        .await?;
    Ok(())
}

async fn mark_ready_for_review(client: &Octocrab, node_id: &str) -> SxResult<()> {
    if node_id.is_empty() {
        return Ok(());
    }
    let _: serde_json::Value = client
        .graphql(&serde_json::json!({
            "query": "mutation($id: ID!) { markPullRequestReadyForReview(input: {pullRequestId: $id}) { clientMutationId } }",
            "variables": { "id": node_id },
        }))
        .await?;
    Ok(())
}
