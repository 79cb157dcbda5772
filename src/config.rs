//! Global configuration for the `sx` application.

use crate::errors::{SxError, SxResult};
use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf};

/// Default configuration, pretty-printed for the first-run editor prompt.
pub const DEFAULT_CONFIG_PRETTY: &str = r#"# GitHub personal access token, used to look up and retarget pull requests.
github-token = ""
"#;

/// The global configuration for `sx`.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SxConfig {
    /// GitHub personal access token.
    #[serde(default)]
    pub github_token: String,
}

impl SxConfig {
    /// Loads the configuration from disk, if it exists.
    ///
    /// ## Returns
    /// - `Ok(Some(config))` - The configuration on disk.
    /// - `Ok(None)` - No configuration file exists yet.
    pub fn try_load() -> SxResult<Option<Self>> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&path)?;
        let config =
            toml::from_str(&raw).map_err(|source| SxError::MetadataCorrupt { path, source })?;
        Ok(Some(config))
    }

    /// Persists the configuration to disk.
    pub fn save(&self) -> SxResult<()> {
        let path = config_path().ok_or_else(|| {
            SxError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no configuration directory (set XDG_CONFIG_HOME or HOME)",
            ))
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Returns the path of the global configuration file, respecting
/// `XDG_CONFIG_HOME` and falling back to `~/.config`.
fn config_path() -> Option<PathBuf> {
    let config_dir = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(config_dir.join("sx").join("config.toml"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config_parses() {
        let config: SxConfig = toml::from_str(DEFAULT_CONFIG_PRETTY).unwrap();
        assert_eq!(config, SxConfig::default());
    }

    #[test]
    fn round_trips() {
        let config = SxConfig {
            github_token: "ghp_notarealtoken".to_string(),
        };
        let ser = toml::to_string_pretty(&config).unwrap();
        assert_eq!(toml::from_str::<SxConfig>(&ser).unwrap(), config);
    }
}
