//! Error types for the `sx` application.

use nu_ansi_term::Color;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias for fallible `sx` operations.
pub type SxResult<T> = Result<T, SxError>;

#[derive(Error, Debug)]
pub enum SxError {
    /// Not within a git repository.
    #[error("Not within a git repository.")]
    NotAGitRepository,
    /// The repository has no `sx` metadata.
    #[error("Repository is not set up with `{}`.", Color::Blue.paint("sx"))]
    RepositoryNotInitialized,
    /// The branch is not tracked with `sx`.
    #[error("Branch `{}` is not tracked with `{}`.", Color::Blue.paint(.0), Color::Blue.paint("sx"))]
    BranchNotTracked(String),
    /// A suspended sync already exists on disk.
    #[error(
        "A sync is already in progress. Continue it with `{}` or abandon it with `{}`.",
        Color::Blue.paint("sx sync --continue"),
        Color::Blue.paint("sx sync --abort")
    )]
    SyncAlreadyInProgress,
    /// `sync --continue` or `sync --abort` was invoked with no suspended sync.
    #[error("No sync in progress.")]
    NoSyncInProgress,
    /// A rebase the engine expected to be running was aborted outside the tool.
    #[error(
        "The rebase of `{}` is no longer in progress and the branch tip is unchanged; \
         it was likely aborted. Run `{}` to abandon the sync.",
        Color::Blue.paint(.0),
        Color::Blue.paint("sx sync --abort")
    )]
    RebaseAbortedExternally(String),
    /// A `git` invocation exited non-zero in a way the gateway cannot classify.
    #[error("`git {command}` exited with status {status}:\n{output}")]
    Backend {
        command: String,
        status: i32,
        output: String,
    },
    /// The backend produced rebase output outside the recognized set.
    #[error("Unrecognized output from `git {command}`:\n{output}")]
    UnrecognizedRebaseOutput { command: String, output: String },
    /// A persisted record failed to parse.
    #[error("Failed to parse `{}`: {source}", .path.display())]
    MetadataCorrupt {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// The tracked parent/children relation contains a cycle.
    #[error("Branch `{}` is its own ancestor in the tracked stack; metadata is corrupt.", Color::Blue.paint(.0))]
    StackCycle(String),
    /// A branch record lists itself as its parent.
    #[error("Branch `{}` lists itself as its parent; metadata is corrupt.", Color::Blue.paint(.0))]
    SelfParent(String),
    /// The remote URL could not be parsed into an owner/repository pair.
    #[error("Could not determine the GitHub owner and repository from remote `{}`.", Color::Blue.paint(.0))]
    MalformedRemoteUrl(String),
    /// A per-branch sync failed; carries the branch and the stage that failed.
    #[error("Sync of `{}` failed while {stage}: {source}", Color::Blue.paint(.branch))]
    Sync {
        branch: String,
        stage: &'static str,
        source: Box<SxError>,
    },
    /// A [git2::Error] occurred.
    #[error("libgit2 error: {}", .0)]
    Git2(#[from] git2::Error),
    /// An I/O error occurred.
    #[error("io error: {}", .0)]
    Io(#[from] std::io::Error),
    /// A formatting error occurred while rendering output.
    #[error("format error: {}", .0)]
    Fmt(#[from] std::fmt::Error),
    /// An [octocrab::Error] occurred.
    #[error("GitHub API error: {}", .0)]
    GitHub(#[from] octocrab::Error),
    /// Metadata failed to serialize.
    #[error("Failed to serialize metadata: {}", .0)]
    TomlSer(#[from] toml::ser::Error),
    /// An [inquire::InquireError] occurred.
    #[error("inquire error: {}", .0)]
    Inquire(#[from] inquire::InquireError),
    /// Exit with the given code, printing nothing further.
    #[error("<exit silently>")]
    SilentExit(i32),
}

impl SxError {
    /// Wraps an error with the branch and stage of the sync that produced it.
    pub(crate) fn during<'a>(branch: &'a str, stage: &'static str) -> impl FnOnce(SxError) -> SxError + 'a {
        move |source| SxError::Sync {
            branch: branch.to_string(),
            stage,
            source: Box::new(source),
        }
    }
}
