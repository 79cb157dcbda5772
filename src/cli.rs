//! The CLI for `sx`.

use crate::{
    config::{SxConfig, DEFAULT_CONFIG_PRETTY},
    ctx::SxContext,
    errors::{SxError, SxResult},
    subcommands::Subcommands,
};
use clap::{
    builder::styling::{AnsiColor, Color, Style},
    ArgAction, Parser,
};
use nu_ansi_term::Color::Blue;
use tracing_subscriber::EnvFilter;

const ABOUT: &str =
    "sx is a CLI application for keeping stacks of dependent branches in sync, locally and on GitHub.";

/// The CLI application for `sx`.
#[derive(Parser, Debug, Clone, Eq, PartialEq)]
#[command(about = ABOUT, version, styles = cli_styles(), arg_required_else_help(true))]
pub struct Cli {
    /// Verbosity level (0-4)
    #[arg(short, global = true, action = ArgAction::Count)]
    pub v: u8,
    /// The subcommand to run
    #[clap(subcommand)]
    pub subcommand: Subcommands,
}

impl Cli {
    /// Run the CLI application with the given arguments.
    pub async fn run(self) -> SxResult<()> {
        self.init_tracing();

        // Load the active repository.
        let repo = crate::git::active_repository().ok_or(SxError::NotAGitRepository)?;
        let config = Self::load_cfg_or_initialize()?;
        if config == SxConfig::default() {
            println!("Warning: Configuration is not initialized.");
        }
        let ctx =
            SxContext::try_load(config, &repo)?.ok_or(SxError::RepositoryNotInitialized)?;

        self.subcommand.run(ctx).await
    }

    /// Loads the [SxConfig]. If the config does not exist, prompts the user to
    /// set up `sx` for the first time.
    ///
    /// ## Returns
    /// - `Result<SxConfig>` - The global `sx` config.
    pub(crate) fn load_cfg_or_initialize() -> SxResult<SxConfig> {
        match SxConfig::try_load()? {
            Some(config) => Ok(config),
            None => Self::prompt_for_configuration(""),
        }
    }

    /// Prompts the user to set up the global configuration for `sx`.
    ///
    /// ## Returns
    /// - `Result<SxConfig>` - The newly created global `sx` config.
    pub fn prompt_for_configuration(existing_config: &str) -> SxResult<SxConfig> {
        let setup_text = if existing_config.is_empty() {
            format!(
                "No configuration found for `{}`. Set up the environment.",
                Blue.paint("sx")
            )
        } else {
            format!(
                "Existing configuration found for `{}`. Set up the environment.",
                Blue.paint("sx")
            )
        };

        // Use the provided predefined text or fall back to the default.
        let text_to_use = if existing_config.is_empty() {
            DEFAULT_CONFIG_PRETTY
        } else {
            existing_config
        };

        let ser_cfg = inquire::Editor::new(&setup_text)
            .with_file_extension(".toml")
            .with_predefined_text(text_to_use)
            .prompt()?;
        let config: SxConfig = toml::from_str(&ser_cfg).map_err(|source| {
            SxError::MetadataCorrupt {
                path: "<editor input>".into(),
                source,
            }
        })?;
        config.save()?;
        Ok(config)
    }

    /// Installs the tracing subscriber, honoring `RUST_LOG` over the `-v`
    /// count. Backend (`git`) output is echoed at the debug level.
    fn init_tracing(&self) {
        let level = match self.v {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("sx={level}")));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .compact()
            .try_init();
    }
}

/// Styles for the CLI application.
const fn cli_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .usage(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Yellow))),
        )
        .header(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Yellow))),
        )
        .literal(Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green))))
        .invalid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .valid(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::White))))
}
