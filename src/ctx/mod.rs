//! The in-memory context of the `sx` application.

use crate::{
    config::SxConfig,
    errors::{SxError, SxResult},
    meta::MetaStore,
};
use git2::Repository;
use octocrab::Octocrab;

mod fmt;

/// The in-memory context of the `sx` application.
pub struct SxContext<'a> {
    /// Global configuration.
    pub cfg: SxConfig,
    /// The repository associated with the store.
    pub repository: &'a Repository,
    /// The durable branch-metadata store for the repository.
    pub store: MetaStore,
}

impl<'a> SxContext<'a> {
    /// Loads the [SxContext] for the given [Repository].
    ///
    /// ## Returns
    /// - `Ok(Some(ctx))` - The repository is set up with `sx`.
    /// - `Ok(None)` - The repository has no `sx` metadata.
    pub fn try_load(cfg: SxConfig, repository: &'a Repository) -> SxResult<Option<Self>> {
        let Some(store) = MetaStore::open(repository)? else {
            return Ok(None);
        };
        Ok(Some(Self {
            cfg,
            repository,
            store,
        }))
    }

    /// Builds a GitHub client from the configured token.
    ///
    /// ## Returns
    /// - `Ok(Some(client))` - A client authenticated with the configured token.
    /// - `Ok(None)` - No token is configured; remote reconciliation is skipped.
    pub fn github_client(&self) -> SxResult<Option<Octocrab>> {
        if self.cfg.github_token.is_empty() {
            return Ok(None);
        }
        let client = Octocrab::builder()
            .personal_token(self.cfg.github_token.clone())
            .build()?;
        Ok(Some(client))
    }

    /// Determines the GitHub owner and repository name from the configured
    /// remote's URL.
    pub fn owner_and_repository(&self) -> SxResult<(String, String)> {
        let repo_meta = self.store.read_repo()?;
        let remote = self.repository.find_remote(&repo_meta.remote)?;
        let url = remote.url().unwrap_or_default();
        parse_remote_url(url).ok_or_else(|| SxError::MalformedRemoteUrl(url.to_string()))
    }
}

/// Extracts `(owner, repository)` from an HTTPS or SSH remote URL.
fn parse_remote_url(url: &str) -> Option<(String, String)> {
    let trimmed = url.trim_end_matches('/').trim_end_matches(".git");
    let path = if let Some((_, rest)) = trimmed.split_once("://") {
        // e.g. https://github.com/owner/repo
        rest.split_once('/')?.1
    } else {
        // e.g. git@github.com:owner/repo
        trimmed.split_once(':')?.1
    };
    let mut segments = path.rsplit('/');
    let repo = segments.next()?;
    let owner = segments.next()?;
    (!owner.is_empty() && !repo.is_empty()).then(|| (owner.to_string(), repo.to_string()))
}

#[cfg(test)]
mod test {
    use super::parse_remote_url;

    #[test]
    fn parses_https_urls() {
        assert_eq!(
            parse_remote_url("https://github.com/sx-cli/sx.git"),
            Some(("sx-cli".to_string(), "sx".to_string()))
        );
        assert_eq!(
            parse_remote_url("https://github.com/sx-cli/sx"),
            Some(("sx-cli".to_string(), "sx".to_string()))
        );
    }

    #[test]
    fn parses_ssh_urls() {
        assert_eq!(
            parse_remote_url("git@github.com:sx-cli/sx.git"),
            Some(("sx-cli".to_string(), "sx".to_string()))
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_remote_url(""), None);
        assert_eq!(parse_remote_url("not a url"), None);
    }
}
