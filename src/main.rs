#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use clap::Parser;

mod cli;
mod config;
mod constants;
mod ctx;
mod errors;
mod git;
mod meta;
mod subcommands;
mod sync;

#[tokio::main]
async fn main() {
    match cli::Cli::parse().run().await {
        Ok(()) => {}
        // A suspended sync exits non-zero without extra output so shells and
        // scripts can detect "user action required".
        Err(errors::SxError::SilentExit(code)) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}
