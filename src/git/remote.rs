//! Fetch and push plumbing for the sync engine.

use super::{
    run::{run_git, run_git_checked},
    RepositoryExt,
};
use crate::errors::{SxError, SxResult};
use git2::Repository;

/// Fetches a ref (branch name or raw commit id) from a remote.
pub(crate) fn fetch(repository: &Repository, remote: &str, refspec: &str) -> SxResult<()> {
    run_git_checked(repository, &["fetch", remote, refspec])?;
    Ok(())
}

/// How force is applied on push.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum ForcePolicy {
    /// Plain push; rejected on non-fast-forward.
    #[default]
    NoForce,
    /// Force only if the remote ref still matches its last-known position.
    ForceWithLease,
    /// Unconditional force.
    Force,
}

/// Options for pushing a rewritten branch.
#[derive(Debug, Clone, Default)]
pub struct PushOpts {
    pub remote: String,
    pub branch: String,
    pub force: ForcePolicy,
    /// Skip (rather than fail) when the branch has no configured upstream.
    pub skip_if_upstream_not_set: bool,
    /// Skip when local and upstream refs already point at the same commit.
    pub skip_if_upstream_matches: bool,
}

/// Outcome of a push.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum PushResult {
    Pushed,
    SkippedNoUpstream,
    SkippedUpToDate,
}

/// Pushes `opts.branch` to `opts.remote`, honoring the skip rules.
pub(crate) fn push(repository: &Repository, opts: &PushOpts) -> SxResult<PushResult> {
    let upstream = repository.upstream_of(&opts.branch);
    if upstream.is_none() && opts.skip_if_upstream_not_set {
        tracing::debug!(branch = %opts.branch, "skipping push: no upstream configured");
        return Ok(PushResult::SkippedNoUpstream);
    }
    if opts.skip_if_upstream_matches {
        if let Some(upstream) = &upstream {
            let local = repository.resolve(&opts.branch)?;
            if &local == upstream {
                tracing::debug!(branch = %opts.branch, "skipping push: upstream already matches");
                return Ok(PushResult::SkippedUpToDate);
            }
        }
    }

    let mut args = vec!["push"];
    match opts.force {
        ForcePolicy::NoForce => {}
        ForcePolicy::ForceWithLease => args.push("--force-with-lease"),
        ForcePolicy::Force => args.push("--force"),
    }
    args.push(&opts.remote);
    args.push(&opts.branch);

    let output = run_git(repository, &args)?;
    if !output.success() {
        return Err(SxError::Backend {
            command: args.join(" "),
            status: output.status,
            output: output.combined(),
        });
    }
    Ok(PushResult::Pushed)
}
