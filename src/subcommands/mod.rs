//! The subcommands for the `sx` application.

use crate::{ctx::SxContext, errors::SxResult};
use clap::Subcommand;
use log::LogCmd;
use sync::SyncCmd;

mod log;
mod sync;

#[derive(Debug, Clone, Eq, PartialEq, Subcommand)]
pub enum Subcommands {
    /// Synchronize the current stack: rebase every branch onto its parent,
    /// push, and retarget pull requests.
    #[clap(visible_alias = "s")]
    Sync(SyncCmd),
    /// Print a tree of all tracked stacks.
    #[clap(visible_aliases = ["l", "ls"])]
    Log(LogCmd),
}

impl Subcommands {
    /// Run the subcommand with the given context.
    pub async fn run(self, ctx: SxContext<'_>) -> SxResult<()> {
        match self {
            Self::Sync(args) => args.run(ctx).await,
            Self::Log(args) => args.run(ctx),
        }
    }
}
