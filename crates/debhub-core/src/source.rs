use chrono::{DateTime, Utc};
use debhub_dl::{
    error::DownloadError,
    github::Github,
    traits::{Asset, Platform, Release},
};
use tracing::{debug, warn};

use crate::package::AssetDescriptor;

/// Lists the package assets published by an owner.
pub trait ReleaseSource: Send + Sync {
    /// Returns `.deb` assets of non-draft releases, in listing order. Without `repo`, every
    /// repository of `owner` is listed.
    fn list_assets(
        &self,
        owner: &str,
        repo: Option<&str>,
    ) -> Result<Vec<AssetDescriptor>, DownloadError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GithubSource;

impl ReleaseSource for GithubSource {
    fn list_assets(
        &self,
        owner: &str,
        repo: Option<&str>,
    ) -> Result<Vec<AssetDescriptor>, DownloadError> {
        let repos = match repo {
            Some(repo) => vec![repo.to_string()],
            None => Github::fetch_projects(owner)?,
        };

        let mut assets = Vec::new();
        for repo in repos {
            let releases = Github::fetch_releases(&format!("{owner}/{repo}"))?;
            debug!(owner, repo = %repo, releases = releases.len(), "listed releases");
            assets.extend(collect_assets(&repo, &releases));
        }
        Ok(assets)
    }
}

/// Converts platform releases into asset descriptors, dropping drafts and non-`.deb` files.
pub fn collect_assets<R: Release>(repo_name: &str, releases: &[R]) -> Vec<AssetDescriptor> {
    releases
        .iter()
        .filter(|release| !release.is_draft())
        .flat_map(|release| {
            release
                .assets()
                .iter()
                .filter(|asset| asset.name().ends_with(".deb"))
                .map(move |asset| {
                    AssetDescriptor {
                        id: asset.id(),
                        url: asset.url().to_string(),
                        size: asset.size(),
                        updated_at: parse_timestamp(asset.updated_at()),
                        file_name: asset.name().to_string(),
                        repo_name: repo_name.to_string(),
                        tag_name: release.tag().to_string(),
                        prerelease: release.is_prerelease(),
                    }
                })
        })
        .collect()
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|err| {
            warn!(value, "invalid asset timestamp: {err}");
            DateTime::default()
        })
}
