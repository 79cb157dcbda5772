//! Child-process invocation of the `git` binary.
//!
//! History rewriting goes through the real `git` client; `git2` does not
//! support interactive rebasing.

use crate::errors::{SxError, SxResult};
use git2::Repository;
use std::process::{Command, Stdio};

/// Captured output of a `git` invocation.
#[derive(Debug, Clone)]
pub(crate) struct GitOutput {
    /// Process exit status (`-1` if terminated by a signal).
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    /// Whether the process exited zero.
    pub(crate) fn success(&self) -> bool {
        self.status == 0
    }

    /// Stdout and stderr joined, for pattern matching and error reporting.
    pub(crate) fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }
}

/// Runs `git` with the given arguments in the repository's working directory
/// and captures its output. A non-zero exit is *not* an error here; callers
/// that require success use [run_git_checked].
pub(crate) fn run_git(repository: &Repository, args: &[&str]) -> SxResult<GitOutput> {
    let workdir = repository.workdir().ok_or(SxError::NotAGitRepository)?;

    let out = Command::new("git")
        .args(args)
        .current_dir(workdir)
        // Never drop into an editor from a child process.
        .env("GIT_EDITOR", "true")
        .stdin(Stdio::null())
        .output()?;

    let output = GitOutput {
        status: out.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
    };
    tracing::debug!(
        command = %format!("git {}", args.join(" ")),
        status = output.status,
        output = %output.combined(),
        "backend exited"
    );

    Ok(output)
}

/// Runs `git`, mapping a non-zero exit to [SxError::Backend].
pub(crate) fn run_git_checked(repository: &Repository, args: &[&str]) -> SxResult<GitOutput> {
    let output = run_git(repository, args)?;
    if !output.success() {
        return Err(SxError::Backend {
            command: args.join(" "),
            status: output.status,
            output: output.combined(),
        });
    }
    Ok(output)
}
