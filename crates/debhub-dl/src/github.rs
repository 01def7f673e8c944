use serde::Deserialize;

use crate::{
    error::DownloadError,
    platform::fetch_paginated,
    traits::{Asset, Platform, Release},
};

pub struct Github;

#[derive(Debug, Clone, Deserialize)]
pub struct GithubRelease {
    pub tag_name: String,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub assets: Vec<GithubAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubAsset {
    pub id: u64,
    pub name: String,
    pub size: u64,
    pub browser_download_url: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GithubRepository {
    name: String,
}

impl Platform for Github {
    type Release = GithubRelease;

    const API_UPSTREAM: &'static str = "https://api.github.com";
    const TOKEN_ENV: [&str; 2] = ["GITHUB_TOKEN", "GH_TOKEN"];

    /// Fetches all releases of a GitHub repository, following pagination.
    ///
    /// # Arguments
    ///
    /// * `project` — repository identifier in the form "owner/repo".
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use debhub_dl::github::Github;
    /// use debhub_dl::traits::{Platform, Release};
    ///
    /// let releases = Github::fetch_releases("ayufan/debian-repository").unwrap();
    /// assert!(releases.iter().all(|r| !r.tag().is_empty()));
    /// ```
    fn fetch_releases(project: &str) -> Result<Vec<Self::Release>, DownloadError> {
        fetch_paginated(
            Self::API_UPSTREAM,
            &format!("/repos/{project}/releases"),
            &Self::TOKEN_ENV,
        )
    }

    fn fetch_projects(owner: &str) -> Result<Vec<String>, DownloadError> {
        let repos: Vec<GithubRepository> = fetch_paginated(
            Self::API_UPSTREAM,
            &format!("/users/{owner}/repos"),
            &Self::TOKEN_ENV,
        )?;
        Ok(repos.into_iter().map(|repo| repo.name).collect())
    }
}

impl Release for GithubRelease {
    type Asset = GithubAsset;

    fn tag(&self) -> &str {
        &self.tag_name
    }

    fn is_prerelease(&self) -> bool {
        self.prerelease
    }

    fn is_draft(&self) -> bool {
        self.draft
    }

    fn assets(&self) -> &[Self::Asset] {
        &self.assets
    }
}

impl Asset for GithubAsset {
    fn id(&self) -> u64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn url(&self) -> &str {
        &self.browser_download_url
    }

    fn updated_at(&self) -> &str {
        &self.updated_at
    }
}
