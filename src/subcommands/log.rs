//! `log` subcommand.

use crate::{ctx::SxContext, errors::SxResult};
use clap::Args;

/// CLI arguments for the `log` subcommand.
#[derive(Debug, Clone, Eq, PartialEq, Args)]
pub struct LogCmd;

impl LogCmd {
    /// Run the `log` subcommand.
    pub fn run(self, ctx: SxContext<'_>) -> SxResult<()> {
        let mut buf = String::new();
        ctx.write_tree(&mut buf)?;
        print!("{}", buf);
        Ok(())
    }
}
