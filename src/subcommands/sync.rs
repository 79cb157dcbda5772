//! `sync` subcommand.

use crate::{
    constants::EXIT_SUSPENDED,
    ctx::SxContext,
    errors::{SxError, SxResult},
    sync::{self, CancelToken, StackSyncOpts, StackSyncOutcome},
};
use clap::Args;
use nu_ansi_term::Color::Blue;

/// CLI arguments for the `sync` subcommand.
#[derive(Debug, Clone, Eq, PartialEq, Args)]
pub struct SyncCmd {
    /// Also rebase stack roots onto the latest trunk commit.
    #[clap(long = "trunk")]
    to_trunk: bool,
    /// Resume a sync suspended on a merge conflict.
    #[clap(long = "continue", conflicts_with = "abort")]
    cont: bool,
    /// Abandon a suspended sync, aborting any in-progress rebase.
    #[clap(long)]
    abort: bool,
    /// Skip fetching from the remote and refreshing pull-request state.
    #[clap(long)]
    no_fetch: bool,
    /// Skip pushing rewritten branches and updating pull requests.
    #[clap(long)]
    no_push: bool,
}

impl SyncCmd {
    /// Run the `sync` subcommand.
    pub async fn run(self, ctx: SxContext<'_>) -> SxResult<()> {
        if self.abort {
            let confirm = inquire::Confirm::new(
                "Abandon the suspended sync? Branches already synchronized keep their new bases.",
            )
            .with_default(false)
            .prompt()?;
            if !confirm {
                return Ok(());
            }
            sync::abort_stack(&ctx)?;
            println!("Sync abandoned.");
            return Ok(());
        }

        let cancel = CancelToken::new();
        {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("received ctrl-c, stopping after the current branch");
                    cancel.cancel();
                }
            });
        }

        // Remote reconciliation needs a client; a missing token degrades to a
        // purely local restack.
        let client = if self.no_fetch && self.no_push {
            None
        } else {
            let client = ctx.github_client()?;
            if client.is_none() {
                eprintln!(
                    "  - no GitHub token configured; skipping pull-request refresh and push"
                );
            }
            client
        };

        let opts = StackSyncOpts {
            to_trunk: self.to_trunk,
            no_fetch: self.no_fetch,
            no_push: self.no_push,
            cont: self.cont,
        };
        match sync::sync_stack(&ctx, client.as_ref(), &opts, &cancel).await? {
            StackSyncOutcome::Completed { synced } => {
                println!(
                    "Stack synchronized ({} {}).",
                    Blue.paint(synced.to_string()),
                    if synced == 1 { "branch" } else { "branches" }
                );
                Ok(())
            }
            // Guidance was already printed next to the conflict; exit
            // distinctly but silently so scripts can detect the suspension.
            StackSyncOutcome::Suspended => Err(SxError::SilentExit(EXIT_SUSPENDED)),
            StackSyncOutcome::Cancelled => Ok(()),
        }
    }
}
