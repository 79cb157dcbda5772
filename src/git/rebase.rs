//! Rebase invocation and status parsing.
//!
//! The engine relies on the backend's closed replay-set definition: a rebase
//! replays exactly the commits reachable from `branch` but not from
//! `upstream`, placing them on `onto` (or on `upstream` when no `onto` is
//! given).

use super::run::{run_git, GitOutput};
use crate::errors::{SxError, SxResult};
use git2::Repository;

/// Parameters for a rebase started by the engine.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RebaseOpts {
    /// The branch to rewrite.
    pub branch: String,
    /// Exclusive lower bound of the replayed range.
    pub upstream: String,
    /// Destination commit for the replayed range. [None] places the replay on
    /// `upstream` itself.
    pub onto: Option<String>,
}

/// Closed set of outcomes the backend reports for a rebase.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RebaseStatus {
    /// Nothing needed to be replayed.
    AlreadyUpToDate,
    /// The branch was rewritten onto the new base.
    Updated,
    /// The replay stopped on conflicting hunks; the working tree holds the
    /// conflict markers.
    Conflict,
    /// A continue or abort was requested with no rebase running.
    NotInProgress,
}

/// Starts a rebase of `opts.branch`.
pub(crate) fn rebase(repository: &Repository, opts: &RebaseOpts) -> SxResult<RebaseStatus> {
    let mut args = vec!["rebase"];
    if let Some(onto) = &opts.onto {
        args.push("--onto");
        args.push(onto);
    }
    args.push(&opts.upstream);
    args.push(&opts.branch);

    let output = run_git(repository, &args)?;
    parse_status(&args.join(" "), &output)
}

/// Continues a conflicted rebase after the user has resolved and staged.
pub(crate) fn rebase_continue(repository: &Repository) -> SxResult<RebaseStatus> {
    let output = run_git(repository, &["rebase", "--continue"])?;
    parse_status("rebase --continue", &output)
}

/// Aborts an in-progress rebase, restoring the pre-rebase branch tip.
pub(crate) fn rebase_abort(repository: &Repository) -> SxResult<()> {
    let output = run_git(repository, &["rebase", "--abort"])?;
    if !output.success() {
        return Err(SxError::Backend {
            command: "rebase --abort".to_string(),
            status: output.status,
            output: output.combined(),
        });
    }
    Ok(())
}

/// Whether the repository has a rebase in progress.
pub(crate) fn rebase_in_progress(repository: &Repository) -> bool {
    let git_dir = repository.path();
    git_dir.join("rebase-merge").exists() || git_dir.join("rebase-apply").exists()
}

/// Classifies backend output into [RebaseStatus]. Output outside the
/// recognized set is an error, never a guess.
fn parse_status(command: &str, output: &GitOutput) -> SxResult<RebaseStatus> {
    let combined = output.combined();

    if output.success() {
        if combined.contains("is up to date") {
            return Ok(RebaseStatus::AlreadyUpToDate);
        }
        return Ok(RebaseStatus::Updated);
    }

    let lowered = combined.to_lowercase();
    if lowered.contains("no rebase in progress") {
        return Ok(RebaseStatus::NotInProgress);
    }
    if combined.contains("CONFLICT")
        || lowered.contains("could not apply")
        || lowered.contains("unmerged files")
        || lowered.contains("resolve all conflicts")
    {
        return Ok(RebaseStatus::Conflict);
    }

    Err(SxError::UnrecognizedRebaseOutput {
        command: command.to_string(),
        output: combined,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn out(status: i32, stdout: &str, stderr: &str) -> GitOutput {
        GitOutput {
            status,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn parses_up_to_date() {
        let output = out(0, "Current branch stack-1 is up to date.\n", "");
        assert_eq!(
            parse_status("rebase main stack-1", &output).unwrap(),
            RebaseStatus::AlreadyUpToDate
        );
    }

    #[test]
    fn parses_updated() {
        let output = out(0, "", "Successfully rebased and updated refs/heads/stack-1.\n");
        assert_eq!(
            parse_status("rebase main stack-1", &output).unwrap(),
            RebaseStatus::Updated
        );
    }

    #[test]
    fn parses_conflict() {
        let output = out(
            1,
            "CONFLICT (content): Merge conflict in my-file\n",
            "error: could not apply deadbeef... Commit 2a\n",
        );
        assert_eq!(
            parse_status("rebase main stack-1", &output).unwrap(),
            RebaseStatus::Conflict
        );
    }

    #[test]
    fn parses_unmerged_files_as_conflict() {
        let output = out(
            1,
            "",
            "error: Committing is not possible because you have unmerged files.\n",
        );
        assert_eq!(
            parse_status("rebase --continue", &output).unwrap(),
            RebaseStatus::Conflict
        );
    }

    #[test]
    fn parses_not_in_progress() {
        let output = out(128, "", "fatal: No rebase in progress?\n");
        assert_eq!(
            parse_status("rebase --continue", &output).unwrap(),
            RebaseStatus::NotInProgress
        );
    }

    #[test]
    fn rejects_unrecognized_output() {
        let output = out(128, "", "fatal: bad revision 'nonsense'\n");
        assert!(matches!(
            parse_status("rebase nonsense stack-1", &output),
            Err(SxError::UnrecognizedRebaseOutput { .. })
        ));
    }
}
