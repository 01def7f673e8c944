use crate::error::DownloadError;

pub trait Asset: Clone {
    fn id(&self) -> u64;
    fn name(&self) -> &str;
    fn size(&self) -> u64;
    fn url(&self) -> &str;
    /// Last modification time as reported by the platform (RFC 3339).
    fn updated_at(&self) -> &str;
}

pub trait Release {
    type Asset: Asset;

    fn tag(&self) -> &str;
    fn is_prerelease(&self) -> bool;
    fn is_draft(&self) -> bool;
    fn assets(&self) -> &[Self::Asset];
}

pub trait Platform {
    type Release: Release;

    const API_UPSTREAM: &'static str;
    const TOKEN_ENV: [&str; 2];

    /// Lists every release of `project` (`owner/repo`), newest first.
    fn fetch_releases(project: &str) -> Result<Vec<Self::Release>, DownloadError>;

    /// Lists the repository names owned by `owner`.
    fn fetch_projects(owner: &str) -> Result<Vec<String>, DownloadError>;
}
