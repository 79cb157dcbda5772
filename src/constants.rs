//! Constants for the `sx` application.

use nu_ansi_term::Color;

/// Directory under the repository's git dir holding all `sx` metadata.
pub(crate) const SX_DIR: &str = "sx";

/// Subdirectory of [SX_DIR] holding one record per tracked branch.
pub(crate) const BRANCHES_DIR: &str = "branches";

/// File name of the repository-level record within [SX_DIR].
pub(crate) const REPO_FILE: &str = "repo.toml";

/// File name of the suspended-sync record within [SX_DIR].
pub(crate) const SYNC_FILE: &str = "sync.toml";

/// Exit code used when a sync suspends awaiting conflict resolution.
///
/// `2` belongs to clap usage errors.
pub(crate) const EXIT_SUSPENDED: i32 = 3;

pub(crate) const COLORS: [Color; 6] = [
    Color::Blue,
    Color::Cyan,
    Color::Green,
    Color::Red,
    Color::Yellow,
    Color::Purple,
];

pub(crate) const FILLED_CIRCLE: char = '●';
pub(crate) const EMPTY_CIRCLE: char = '○';
pub(crate) const BOTTOM_LEFT_BOX: char = '└';
pub(crate) const LEFT_FORK_BOX: char = '├';
pub(crate) const VERTICAL_BOX: char = '│';
pub(crate) const HORIZONTAL_BOX: char = '─';
